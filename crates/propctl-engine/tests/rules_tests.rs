#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::path::Path;

use common::{engine_with, shop_record, ScriptedTransport};
use propctl_core::errors::ExErrorKind;
use propctl_core::{RuleNode, VersionSelector};
use propctl_engine::Method;
use serde_json::{json, Value};

const RULES_V3: &str = "/papi/v1/properties/prp_1/versions/3/rules";
const RULES_V4: &str = "/papi/v1/properties/prp_1/versions/4/rules";
const VERSIONS: &str = "/papi/v1/properties/prp_1/versions";

fn remote_tree(version: u32) -> Value {
    json!({
        "accountId": "act_1",
        "contractId": "ctr_1",
        "groupId": "grp_1",
        "propertyId": "prp_1",
        "propertyVersion": version,
        "etag": "e-1",
        "ruleFormat": "v2023-01-05",
        "rules": {
            "name": "default",
            "uuid": "default",
            "behaviors": [{"name": "origin", "options": {"hostname": "origin.example.com"}}],
            "children": [{
                "name": "Performance",
                "uuid": "u-perf",
                "behaviors": [{"name": "advanced", "uuid": "d-1", "options": {"xml": "<edge:cache/>"}}],
                "children": []
            }]
        }
    })
}

/// The same tree as an operator would edit it: no identities below the root
/// and an extra plain rule
fn edited_tree(xml: &str) -> RuleNode {
    serde_json::from_value(json!({
        "name": "default",
        "uuid": "default",
        "behaviors": [{"name": "origin", "options": {"hostname": "origin-2.example.com"}}],
        "children": [
            {
                "name": "Performance",
                "behaviors": [{"name": "advanced", "options": {"xml": xml}}],
                "children": []
            },
            {"name": "Offload", "behaviors": [{"name": "caching", "options": {"ttl": "1d"}}], "children": []}
        ]
    }))
    .unwrap()
}

fn accepted_echo(body: &Value, version: u32) -> Value {
    let mut echo = remote_tree(version);
    echo["rules"] = body["rules"].clone();
    echo
}

#[tokio::test]
async fn test_push_restores_advanced_identities() {
    let transport = ScriptedTransport::new();
    let edited = edited_tree("<edge:cache/>");
    let expected_put = json!({"rules": serde_json::to_value(&edited).unwrap()});
    transport
        .reply(Method::Get, RULES_V3, 200, remote_tree(3))
        .reply(Method::Put, RULES_V3, 200, accepted_echo(&expected_put, 3));
    let engine = engine_with(&transport, vec![shop_record()]);

    let doc = engine
        .push_rules("shop", VersionSelector::Latest, edited)
        .await
        .unwrap();
    assert_eq!(doc.property_version, 3);

    let put = &transport.requests_to(Method::Put, RULES_V3)[0];
    let rules = &put.body.as_ref().unwrap()["rules"];
    assert_eq!(rules["uuid"], "default");
    assert_eq!(rules["children"][0]["uuid"], "u-perf");
    assert_eq!(rules["children"][0]["behaviors"][0]["uuid"], "d-1");
    assert_eq!(rules["behaviors"][0]["options"]["hostname"], "origin-2.example.com");
    assert!(rules["children"][1].get("uuid").is_none());
    assert!(put.path.contains("groupId=grp_1"));
}

#[tokio::test]
async fn test_unmatched_payload_is_never_submitted() {
    let transport = ScriptedTransport::new();
    transport.reply(Method::Get, RULES_V3, 200, remote_tree(3));
    let engine = engine_with(&transport, vec![shop_record()]);

    let err = engine
        .push_rules("shop", VersionSelector::Latest, edited_tree("<edge:other/>"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::UnmatchedAdvancedMetadata);
    assert!(err.message().contains("<edge:other/>"));
    assert_eq!(err.property_id(), Some("prp_1"));
    assert!(transport.requests_to(Method::Put, RULES_V3).is_empty());
}

#[tokio::test]
async fn test_validation_errors_surface_as_rejection() {
    let transport = ScriptedTransport::new();
    let mut answer = remote_tree(3);
    answer["errors"] = json!([{
        "type": "https://problems.example.net/papi/v0/validation/attribute_required",
        "detail": "The origin hostname is required"
    }]);
    transport
        .reply(Method::Get, RULES_V3, 200, remote_tree(3))
        .reply(Method::Put, RULES_V3, 200, answer);
    let engine = engine_with(&transport, vec![shop_record()]);

    let err = engine
        .push_rules("shop", VersionSelector::Latest, edited_tree("<edge:cache/>"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::RemoteRejected);
    assert!(err.message().contains("The origin hostname is required"));
    assert!(err.payload().unwrap().get("errors").is_some());
}

#[tokio::test]
async fn test_update_creates_version_when_latest_is_live() {
    let transport = ScriptedTransport::new();
    let put_echo = remote_tree(4);
    transport
        .reply(
            Method::Post,
            VERSIONS,
            201,
            json!({"versionLink": "/papi/v1/properties/prp_1/versions/4?contractId=ctr_1&groupId=grp_1"}),
        )
        .reply(Method::Get, RULES_V4, 200, remote_tree(4))
        .reply(Method::Put, RULES_V4, 200, put_echo);
    let mut record = shop_record();
    record.production_version = Some(3);
    let engine = engine_with(&transport, vec![record]);

    let doc = engine
        .update_rules("shop", edited_tree("<edge:cache/>"))
        .await
        .unwrap();

    assert_eq!(doc.property_version, 4);
    let created = &transport.requests_to(Method::Post, VERSIONS)[0];
    assert_eq!(created.body, Some(json!({"createFromVersion": 3})));
    assert_eq!(engine.cached("prp_1").unwrap().unwrap().latest_version, 4);
    assert!(transport.requests_to(Method::Put, RULES_V3).is_empty());
}

#[tokio::test]
async fn test_update_edits_inactive_latest_in_place() {
    let transport = ScriptedTransport::new();
    transport
        .reply(Method::Get, RULES_V3, 200, remote_tree(3))
        .reply(Method::Put, RULES_V3, 200, remote_tree(3));
    let mut record = shop_record();
    record.production_version = Some(2);
    let engine = engine_with(&transport, vec![record]);

    engine
        .update_rules("shop", edited_tree("<edge:cache/>"))
        .await
        .unwrap();

    assert!(transport.requests_to(Method::Post, VERSIONS).is_empty());
    assert_eq!(transport.remaining(), 0);
}

#[tokio::test]
async fn test_saved_tree_is_verbatim_and_loads_back() {
    let transport = ScriptedTransport::new();
    let mut tree = remote_tree(2);
    tree["comments"] = json!("kept as-is");
    transport.reply(
        Method::Get,
        "/papi/v1/properties/prp_1/versions/2/rules",
        200,
        tree.clone(),
    );
    let mut record = shop_record();
    record.staging_version = Some(2);
    let engine = engine_with(&transport, vec![record]);
    let path = Path::new("trees/shop.json");

    let saved = engine
        .save_rules("shop", VersionSelector::Staging, path)
        .await
        .unwrap();

    let bytes = engine.store().read(path).unwrap();
    let on_disk: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(on_disk, tree);

    let loaded = engine.load_rules(path).unwrap();
    assert_eq!(loaded, saved);
    assert_eq!(loaded.extra.get("comments"), Some(&json!("kept as-is")));
}

#[tokio::test]
async fn test_production_selector_without_active_version_is_not_found() {
    let transport = ScriptedTransport::new();
    let engine = engine_with(&transport, vec![shop_record()]);

    let err = engine
        .get_rules("shop", VersionSelector::Production)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::NotFound);
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_get_rules_for_explicit_version() {
    let transport = ScriptedTransport::new();
    transport.reply(
        Method::Get,
        "/papi/v1/properties/prp_1/versions/1/rules",
        200,
        remote_tree(1),
    );
    let engine = engine_with(&transport, vec![shop_record()]);

    let doc = engine
        .get_rules("prp_1", VersionSelector::Explicit(1))
        .await
        .unwrap();

    assert_eq!(doc.property_version, 1);
    assert_eq!(doc.rules.children[0].uuid.as_deref(), Some("u-perf"));
}
