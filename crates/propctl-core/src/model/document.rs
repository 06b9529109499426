use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::rule::RuleNode;

/// A rule tree as returned by the service's tree-fetch endpoint
///
/// This is also the on-disk format of a saved tree; unknown top-level keys
/// are retained so a save is verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleTreeDocument {
    #[serde(default)]
    pub account_id: String,

    #[serde(default)]
    pub contract_id: String,

    #[serde(default)]
    pub group_id: String,

    #[serde(default)]
    pub property_id: String,

    #[serde(default)]
    pub property_version: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_format: Option<String>,

    pub rules: RuleNode,

    /// Validation findings reported by the service; empty when accepted
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RuleTreeDocument {
    /// Whether the service attached validation errors
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}
