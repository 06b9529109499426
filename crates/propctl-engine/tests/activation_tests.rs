#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{engine_with, engine_with_config, shop_record, ScriptedTransport};
use propctl_core::errors::ExErrorKind;
use propctl_core::logging_facility::test_capture::init_test_capture;
use propctl_core::propctl_core_types::schema::{EVENT_END, EVENT_START};
use propctl_core::{ActivationOutcome, ActivationStatus, ActivationType, ConfigRecord, Network};
use propctl_engine::{ActivationRequest, EngineConfig, Method};
use serde_json::{json, Value};

const ACTIVATIONS: &str = "/papi/v1/properties/prp_1/activations";
const ACTIVATION: &str = "/papi/v1/properties/prp_1/activations/atv_1";

fn accepted() -> Value {
    json!({"activationLink": "/papi/v1/properties/prp_1/activations/atv_1?contractId=ctr_1&groupId=grp_1"})
}

fn status(s: &str) -> Value {
    json!({"activations": {"items": [{"activationId": "atv_1", "status": s}]}})
}

fn warnings(ids: &[&str]) -> Value {
    let items: Vec<Value> = ids.iter().map(|id| json!({"messageId": id})).collect();
    json!({
        "type": "https://problems.example.net/papi/v0/activation-warnings-not-acknowledged",
        "title": "Activation Warnings Not Acknowledged",
        "warnings": items
    })
}

fn acknowledged_in(body: &Option<Value>) -> Vec<String> {
    body.as_ref()
        .and_then(|b| b.get("acknowledgeWarnings"))
        .and_then(Value::as_array)
        .map(|ids| ids.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

#[tokio::test(start_paused = true)]
async fn test_activation_polls_until_active() {
    let transport = ScriptedTransport::new();
    transport
        .reply(Method::Post, ACTIVATIONS, 201, accepted())
        .reply(Method::Get, ACTIVATION, 200, status("PENDING"))
        .reply(Method::Get, ACTIVATION, 200, status("ZONE_1"))
        .reply(Method::Get, ACTIVATION, 200, status("ACTIVE"));
    let engine = engine_with(&transport, vec![shop_record()]);
    let started = tokio::time::Instant::now();

    let outcome = engine
        .activate("shop", ActivationRequest::new(Network::Staging))
        .await
        .unwrap();

    let ActivationOutcome::Completed(job) = outcome else {
        panic!("expected completion, got {:?}", outcome);
    };
    assert_eq!(job.activation_id, "atv_1");
    assert_eq!(job.version, 3);
    assert_eq!(job.status, ActivationStatus::Active);
    assert_eq!(job.polls, 3);
    assert!(started.elapsed() >= std::time::Duration::from_secs(90));

    let cached = engine.cached("prp_1").unwrap().unwrap();
    assert_eq!(cached.staging_version, Some(3));
    assert_eq!(cached.production_version, None);

    let submitted = &transport.requests_to(Method::Post, ACTIVATIONS)[0];
    let body = submitted.body.as_ref().unwrap();
    assert_eq!(body["propertyVersion"], 3);
    assert_eq!(body["network"], "STAGING");
    assert_eq!(body["activationType"], "ACTIVATE");
    assert_eq!(body["note"], "Activated by propctl");
    assert!(submitted.path.contains("contractId=ctr_1"));
}

#[tokio::test(start_paused = true)]
async fn test_server_error_while_polling_counts_as_pending() {
    let transport = ScriptedTransport::new();
    transport
        .reply(Method::Post, ACTIVATIONS, 201, accepted())
        .reply(Method::Get, ACTIVATION, 500, json!({"title": "Internal Server Error"}))
        .reply(Method::Get, ACTIVATION, 200, status("ACTIVE"));
    let engine = engine_with(&transport, vec![shop_record()]);

    let outcome = engine
        .activate("shop", ActivationRequest::new(Network::Production))
        .await
        .unwrap();

    assert_eq!(outcome.job().unwrap().polls, 2);
    assert_eq!(
        engine.cached("prp_1").unwrap().unwrap().production_version,
        Some(3)
    );
}

#[tokio::test(start_paused = true)]
async fn test_warnings_acknowledged_once_then_accepted() {
    let transport = ScriptedTransport::new();
    transport
        .reply(Method::Post, ACTIVATIONS, 400, warnings(&["msg_a", "msg_b"]))
        .reply(Method::Post, ACTIVATIONS, 201, accepted());
    let engine = engine_with(&transport, vec![shop_record()]);

    let outcome = engine
        .activate("shop", ActivationRequest::new(Network::Staging).no_wait())
        .await
        .unwrap();

    let ActivationOutcome::Submitted(job) = outcome else {
        panic!("expected submission, got {:?}", outcome);
    };
    assert_eq!(job.warnings_pending_ack, vec!["msg_a", "msg_b"]);

    let posts = transport.requests_to(Method::Post, ACTIVATIONS);
    assert_eq!(posts.len(), 2);
    assert!(acknowledged_in(&posts[0].body).is_empty());
    assert_eq!(acknowledged_in(&posts[1].body), vec!["msg_a", "msg_b"]);
    assert!(transport.requests_to(Method::Get, ACTIVATION).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_new_warnings_after_acknowledgement_fail() {
    let transport = ScriptedTransport::new();
    transport
        .reply(Method::Post, ACTIVATIONS, 400, warnings(&["msg_a"]))
        .reply(Method::Post, ACTIVATIONS, 400, warnings(&["msg_a", "msg_c", "msg_d"]));
    let engine = engine_with(&transport, vec![shop_record()]);

    let err = engine
        .activate("shop", ActivationRequest::new(Network::Staging))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::WarningsNotAcknowledged);
    assert_eq!(
        err.warnings().unwrap(),
        &["msg_a".to_string(), "msg_c".to_string(), "msg_d".to_string()]
    );
    assert!(err.payload().is_some());
    assert_eq!(err.property_id(), Some("prp_1"));
    assert_eq!(err.network(), Some("STAGING"));
    assert_eq!(transport.requests_to(Method::Post, ACTIVATIONS).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_zero_ack_ceiling_fails_on_first_warnings() {
    let transport = ScriptedTransport::new();
    transport.reply(Method::Post, ACTIVATIONS, 400, warnings(&["msg_a"]));
    let config = EngineConfig {
        max_warning_ack_retries: 0,
        ..EngineConfig::default()
    };
    let engine = engine_with_config(&transport, vec![shop_record()], config);

    let err = engine
        .activate("shop", ActivationRequest::new(Network::Staging))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::WarningsNotAcknowledged);
    assert_eq!(transport.requests().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_terminal_failure_carries_payload() {
    let transport = ScriptedTransport::new();
    transport
        .reply(Method::Post, ACTIVATIONS, 201, accepted())
        .reply(Method::Get, ACTIVATION, 200, status("PENDING"))
        .reply(Method::Get, ACTIVATION, 200, status("FAILED"));
    let engine = engine_with(&transport, vec![shop_record()]);

    let err = engine
        .activate("shop", ActivationRequest::new(Network::Staging))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::ActivationFailed);
    assert_eq!(
        err.payload().unwrap().pointer("/activations/items/0/status"),
        Some(&json!("FAILED"))
    );
    assert_eq!(err.version(), Some(3));
    assert_eq!(engine.cached("prp_1").unwrap().unwrap().staging_version, None);
}

#[tokio::test(start_paused = true)]
async fn test_deactivating_inactive_version_succeeds() {
    let transport = ScriptedTransport::new();
    transport.reply(
        Method::Post,
        ACTIVATIONS,
        422,
        json!({
            "type": "https://problems.example.net/papi/v0/activation-invalid",
            "errors": [{"type": "/papi/v1/errors/property_version_not_active"}]
        }),
    );
    let mut record = shop_record();
    record.production_version = Some(2);
    let engine = engine_with(&transport, vec![record]);

    let outcome = engine
        .deactivate("shop", ActivationRequest::new(Network::Production))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        ActivationOutcome::AlreadyInactive {
            network: Network::Production,
            version: 2
        }
    );
    assert!(outcome.is_settled());
    assert!(transport.requests_to(Method::Get, ACTIVATION).is_empty());
    assert_eq!(
        engine.cached("prp_1").unwrap().unwrap().production_version,
        None
    );
}

#[tokio::test(start_paused = true)]
async fn test_deactivation_clears_active_pointer() {
    let transport = ScriptedTransport::new();
    transport
        .reply(Method::Post, ACTIVATIONS, 201, accepted())
        .reply(Method::Get, ACTIVATION, 200, status("ACTIVE"));
    let mut record = shop_record();
    record.staging_version = Some(3);
    let engine = engine_with(&transport, vec![record]);

    let outcome = engine
        .deactivate("shop", ActivationRequest::new(Network::Staging))
        .await
        .unwrap();

    let job = outcome.job().unwrap();
    assert_eq!(job.activation_type, ActivationType::Deactivate);
    assert_eq!(job.version, 3);
    let body = transport.requests_to(Method::Post, ACTIVATIONS)[0].body.clone().unwrap();
    assert_eq!(body["activationType"], "DEACTIVATE");
    assert_eq!(engine.cached("prp_1").unwrap().unwrap().staging_version, None);
}

#[tokio::test(start_paused = true)]
async fn test_submitted_job_can_be_awaited_later() {
    let transport = ScriptedTransport::new();
    transport
        .reply(Method::Post, ACTIVATIONS, 201, accepted())
        .reply(Method::Get, ACTIVATION, 200, status("ACTIVE"));
    let engine = engine_with(&transport, vec![shop_record()]);

    let outcome = engine
        .activate(
            "prp_1",
            ActivationRequest::new(Network::Staging).with_note("release 42"),
        )
        .await
        .unwrap();
    assert!(!outcome.is_settled());
    assert_eq!(engine.cached("prp_1").unwrap().unwrap().staging_version, None);

    let job = outcome.job().unwrap().clone();
    let done = engine.wait_for_activation("prp_1", job).await.unwrap();

    assert!(done.is_complete());
    assert_eq!(engine.cached("prp_1").unwrap().unwrap().staging_version, Some(3));
    let body = transport.requests_to(Method::Post, ACTIVATIONS)[0].body.clone().unwrap();
    assert_eq!(body["note"], "release 42");
}

#[tokio::test(start_paused = true)]
async fn test_activation_logs_one_start_and_one_end() {
    let capture = init_test_capture();
    let transport = ScriptedTransport::new();
    transport
        .reply(Method::Post, "/papi/v1/properties/prp_log/activations", 201, json!({
            "activationLink": "/papi/v1/properties/prp_log/activations/atv_9"
        }))
        .reply(
            Method::Get,
            "/papi/v1/properties/prp_log/activations/atv_9",
            200,
            status("ACTIVE"),
        );
    let engine = engine_with(&transport, vec![]);
    let mut record = ConfigRecord::new("prp_log", "logged", "grp_1", "ctr_1");
    record.latest_version = 2;

    engine
        .activate(record, ActivationRequest::new(Network::Staging))
        .await
        .unwrap();

    let starts = capture.events_where("activate", "subject", "record:prp_log");
    assert_eq!(starts.len(), 1);
    assert_eq!(starts[0].event.as_deref(), Some(EVENT_START));
    let request_id = starts[0].field("request_id").unwrap().to_string();

    let bracket = capture.count_events(|e| {
        e.op.as_deref() == Some("activate") && e.field("request_id") == Some(request_id.as_str())
    });
    assert_eq!(bracket, 2);
    let ends = capture.count_events(|e| {
        e.op.as_deref() == Some("activate")
            && e.event.as_deref() == Some(EVENT_END)
            && e.field("request_id") == Some(request_id.as_str())
    });
    assert_eq!(ends, 1);
}
