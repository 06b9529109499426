use serde::{Deserialize, Serialize};

use super::lookup::sanitize_name;

/// Deployment network a version can be activated on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Network {
    Staging,
    Production,
}

impl Network {
    /// Wire representation used by the remote service
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Staging => "STAGING",
            Network::Production => "PRODUCTION",
        }
    }

    /// Parse a network name, case-insensitively; `S`/`P` shorthands accepted
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "STAGING" | "S" => Some(Network::Staging),
            "PRODUCTION" | "PROD" | "P" => Some(Network::Production),
            _ => None,
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical identity and version pointers of one delivery configuration
///
/// Field names follow the remote service's property object so a record can
/// be deserialized straight from a list or search response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigRecord {
    /// Immutable, service-assigned id (`prp_...`)
    #[serde(rename = "propertyId")]
    pub id: String,

    /// Human-chosen name
    #[serde(rename = "propertyName", default)]
    pub name: String,

    #[serde(default)]
    pub group_id: String,

    #[serde(default)]
    pub contract_id: String,

    #[serde(default)]
    pub account_id: String,

    /// Zero means no version has been created yet
    #[serde(default)]
    pub latest_version: u32,

    #[serde(default)]
    pub staging_version: Option<u32>,

    #[serde(default)]
    pub production_version: Option<u32>,
}

impl ConfigRecord {
    /// Create a record with identity only and no versions
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        group_id: impl Into<String>,
        contract_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            group_id: group_id.into(),
            contract_id: contract_id.into(),
            account_id: String::new(),
            latest_version: 0,
            staging_version: None,
            production_version: None,
        }
    }

    /// A record that already carries everything needed to address the
    /// remote service (id, group and contract)
    pub fn is_fully_qualified(&self) -> bool {
        !self.id.is_empty() && !self.group_id.is_empty() && !self.contract_id.is_empty()
    }

    /// Whether at least one version exists
    pub fn is_versioned(&self) -> bool {
        self.latest_version >= 1
    }

    /// Name as indexed by the lookup cache
    pub fn sanitized_name(&self) -> String {
        sanitize_name(&self.name)
    }

    /// Version currently active on `network`
    pub fn active_version(&self, network: Network) -> Option<u32> {
        match network {
            Network::Staging => self.staging_version,
            Network::Production => self.production_version,
        }
    }

    /// Record a new active version (or none) for `network`
    pub fn set_active_version(&mut self, network: Network, version: Option<u32>) {
        match network {
            Network::Staging => self.staging_version = version,
            Network::Production => self.production_version = version,
        }
    }

    /// True when the latest version is live on either network and therefore
    /// cannot be edited in place
    pub fn is_latest_active(&self) -> bool {
        self.is_versioned()
            && (self.staging_version == Some(self.latest_version)
                || self.production_version == Some(self.latest_version))
    }

    /// Resolve a selector against this record's version pointers
    pub fn version_for(&self, selector: VersionSelector) -> Option<u32> {
        match selector {
            VersionSelector::Latest => self.is_versioned().then_some(self.latest_version),
            VersionSelector::Staging => self.staging_version,
            VersionSelector::Production => self.production_version,
            VersionSelector::Explicit(v) => Some(v),
        }
    }
}

/// Which version of a configuration an operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VersionSelector {
    #[default]
    Latest,
    Staging,
    Production,
    Explicit(u32),
}

impl VersionSelector {
    /// Selector for the version currently active on `network`
    pub fn active_on(network: Network) -> Self {
        match network {
            Network::Staging => VersionSelector::Staging,
            Network::Production => VersionSelector::Production,
        }
    }
}

impl std::fmt::Display for VersionSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VersionSelector::Latest => f.write_str("latest"),
            VersionSelector::Staging => f.write_str("staging"),
            VersionSelector::Production => f.write_str("production"),
            VersionSelector::Explicit(v) => write!(f, "v{}", v),
        }
    }
}
