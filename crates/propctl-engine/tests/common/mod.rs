#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use propctl_core::errors::{ExError, ExErrorKind};
use propctl_core::ConfigRecord;
use propctl_engine::{ApiRequest, ApiResponse, Engine, EngineConfig, LookupCache, Method, SignedTransport};
use propctl_store::MemoryRuleTreeStore;
use serde_json::Value;

struct Scripted {
    method: Method,
    route: String,
    reply: Result<ApiResponse, ExError>,
}

/// Fake signed transport answering from a script
///
/// Each request consumes the first scripted reply with the same method and
/// route (path without query). Every request is recorded.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply(&self, method: Method, route: &str, status: u16, body: Value) -> &Self {
        self.push(method, route, Ok(ApiResponse::new(status, body)))
    }

    pub fn no_response(&self, method: Method, route: &str) -> &Self {
        self.push(
            method,
            route,
            Err(ExError::new(ExErrorKind::TransientNetwork).with_message("connection reset")),
        )
    }

    fn push(&self, method: Method, route: &str, reply: Result<ApiResponse, ExError>) -> &Self {
        self.script.lock().unwrap().push_back(Scripted {
            method,
            route: route.to_string(),
            reply,
        });
        self
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, method: Method, route: &str) -> Vec<ApiRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.route() == route)
            .collect()
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap().len()
    }
}

#[async_trait]
impl SignedTransport for ScriptedTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ExError> {
        self.requests.lock().unwrap().push(request.clone());
        let mut script = self.script.lock().unwrap();
        let position = script
            .iter()
            .position(|s| s.method == request.method && s.route == request.route());
        match position.and_then(|i| script.remove(i)) {
            Some(scripted) => scripted.reply,
            None => Err(ExError::new(ExErrorKind::Internal)
                .with_message(format!("unscripted request {} {}", request.method, request.path))),
        }
    }
}

/// prp_1 "shop" in grp_1/ctr_1 with three versions, nothing active
pub fn shop_record() -> ConfigRecord {
    let mut record = ConfigRecord::new("prp_1", "shop", "grp_1", "ctr_1");
    record.account_id = "act_1".to_string();
    record.latest_version = 3;
    record
}

/// An engine over `transport` with an in-memory store and an initialized
/// cache holding `records`
pub fn engine_with(transport: &Arc<ScriptedTransport>, records: Vec<ConfigRecord>) -> Engine {
    engine_with_config(transport, records, EngineConfig::default())
}

pub fn engine_with_config(
    transport: &Arc<ScriptedTransport>,
    records: Vec<ConfigRecord>,
    config: EngineConfig,
) -> Engine {
    let mut cache = LookupCache::new();
    for record in records {
        cache.upsert(record);
    }
    cache.mark_initialized();
    Engine::new(config, transport.clone(), Arc::new(MemoryRuleTreeStore::new())).with_cache(cache)
}

/// An engine with an empty, uninitialized cache
pub fn cold_engine(transport: &Arc<ScriptedTransport>) -> Engine {
    Engine::new(
        EngineConfig::default(),
        transport.clone(),
        Arc::new(MemoryRuleTreeStore::new()),
    )
}
