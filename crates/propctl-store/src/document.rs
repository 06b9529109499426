//! Rule-tree documents on disk
//!
//! Documents are UTF-8 JSON, written with 2-space indentation. The saved
//! form is the document exactly as the service returned it.

#![allow(clippy::result_large_err)]

use std::path::Path;

use propctl_core::errors::{ExError, ExErrorKind};
use propctl_core::RuleTreeDocument;
use serde::Serialize;

use crate::errors::{serialization_error, Result};
use crate::fs_store::RuleTreeStore;

/// Serialize `document` and write it through `store`
///
/// # Errors
///
/// `Serialization` if the value cannot be encoded, otherwise whatever the
/// store reports.
pub fn save_document<T: Serialize + ?Sized>(
    store: &dyn RuleTreeStore,
    path: &Path,
    document: &T,
) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(document)
        .map_err(|e| serialization_error("save_document", path, e))?;
    store.write(path, &bytes)
}

/// Read the raw JSON document at `path`
///
/// # Errors
///
/// `InvalidInput` if the bytes are not UTF-8, `Serialization` if they are
/// not JSON, otherwise whatever the store reports.
pub fn load_value(store: &dyn RuleTreeStore, path: &Path) -> Result<serde_json::Value> {
    let bytes = store.read(path)?;
    let text = std::str::from_utf8(&bytes).map_err(|e| {
        ExError::new(ExErrorKind::InvalidInput)
            .with_op("load_document")
            .with_message(format!("{}: not UTF-8: {}", path.display(), e))
    })?;
    serde_json::from_str(text).map_err(|e| serialization_error("load_document", path, e))
}

/// Read and decode the rule-tree document at `path`
///
/// # Errors
///
/// See [`load_value`]; also `Serialization` if the JSON is not a rule-tree
/// document.
pub fn load_document(store: &dyn RuleTreeStore, path: &Path) -> Result<RuleTreeDocument> {
    let value = load_value(store, path)?;
    serde_json::from_value(value).map_err(|e| serialization_error("load_document", path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs_store::MemoryRuleTreeStore;
    use serde_json::json;

    #[test]
    fn test_saved_json_uses_two_space_indent() {
        let store = MemoryRuleTreeStore::new();
        let path = Path::new("tree.json");

        save_document(&store, path, &json!({"rules": {"name": "default"}})).unwrap();

        let text = String::from_utf8(store.get(path).unwrap()).unwrap();
        assert!(text.contains("\n  \"rules\": {\n    \"name\": \"default\""));
    }

    #[test]
    fn test_non_utf8_is_invalid_input() {
        let store = MemoryRuleTreeStore::new();
        store.insert("bad.json", vec![0xff, 0xfe]);

        let err = load_value(&store, Path::new("bad.json")).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::InvalidInput);
    }
}
