#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::Path;

use propctl_core::ExErrorKind;
use propctl_store::{load_document, load_value, save_document, FsRuleTreeStore};
use serde_json::json;
use tempfile::TempDir;

fn fetched_tree() -> serde_json::Value {
    json!({
        "accountId": "act_1",
        "contractId": "ctr_1",
        "groupId": "grp_1",
        "propertyId": "prp_1",
        "propertyVersion": 3,
        "etag": "a1b2c3",
        "ruleFormat": "latest",
        "rules": {
            "name": "default",
            "uuid": "default",
            "options": {"is_secure": true},
            "children": [{
                "name": "Offload",
                "uuid": "rule-1",
                "children": [],
                "behaviors": [{
                    "name": "advanced",
                    "uuid": "beh-1",
                    "options": {"xml": "<edge:x/>"}
                }],
                "criteria": []
            }],
            "behaviors": [{"name": "cpCode", "options": {"value": {"id": 42}}}]
        },
        "errors": []
    })
}

#[test]
fn test_saved_file_is_verbatim_and_loadable() {
    let temp_dir = TempDir::new().unwrap();
    let store = FsRuleTreeStore::with_root(temp_dir.path());
    let path = Path::new("prp_1_v3.json");
    let original = fetched_tree();

    save_document(&store, path, &original).unwrap();

    let raw = std::fs::read_to_string(temp_dir.path().join(path)).unwrap();
    assert!(raw.starts_with("{\n  \"accountId\": \"act_1\""));
    assert_eq!(load_value(&store, path).unwrap(), original);

    let doc = load_document(&store, path).unwrap();
    assert_eq!(doc.property_id, "prp_1");
    assert_eq!(doc.property_version, 3);
    assert_eq!(doc.etag.as_deref(), Some("a1b2c3"));
    assert_eq!(doc.rules.children[0].uuid.as_deref(), Some("rule-1"));
    assert_eq!(
        doc.rules.children[0].behaviors[0].uuid.as_deref(),
        Some("beh-1")
    );
}

#[test]
fn test_document_roundtrip_keeps_unknown_fields() {
    let temp_dir = TempDir::new().unwrap();
    let store = FsRuleTreeStore::with_root(temp_dir.path());
    let mut original = fetched_tree();
    original["rules"]["customOverride"] = json!({"overrideId": "cbo_1"});
    store_and_reload(&store, &original);
}

fn store_and_reload(store: &FsRuleTreeStore, original: &serde_json::Value) {
    let first = Path::new("first.json");
    save_document(store, first, original).unwrap();
    let doc = load_document(store, first).unwrap();

    let second = Path::new("second.json");
    save_document(store, second, &doc).unwrap();
    let reloaded = load_value(store, second).unwrap();

    assert_eq!(
        reloaded["rules"]["customOverride"]["overrideId"],
        json!("cbo_1")
    );
    assert_eq!(reloaded["rules"]["options"]["is_secure"], json!(true));
}

#[test]
fn test_malformed_json_is_serialization_error() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join("broken.json"), "{\"rules\": ").unwrap();
    let store = FsRuleTreeStore::with_root(temp_dir.path());

    let err = load_document(&store, Path::new("broken.json")).unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::Serialization);
    assert_eq!(err.op(), Some("load_document"));
}
