//! The engine object and the plumbing shared by every command

#![allow(clippy::result_large_err)]

use std::sync::{Arc, RwLock};
use std::time::Instant;

use propctl_core::errors::{ExError, ExErrorKind};
use propctl_core::{log_op_end, log_op_error, log_op_start};
use propctl_core::{ConfigRecord, Network};
use propctl_core_types::{RequestContext, RequestId};
use propctl_store::errors::Result;
use propctl_store::RuleTreeStore;
use serde_json::Value;

use crate::cache::LookupCache;
use crate::config::EngineConfig;
use crate::paths::ApiPath;
use crate::transport::{expect_success, ApiRequest, ApiResponse, SignedTransport};

/// Rule-tree synchronization and activation engine
///
/// Owns the lookup cache and the injected collaborators. Commands are
/// `async` methods defined in [`crate::commands`]. No lock is held across
/// an `.await`; callers must still serialize mutating commands per
/// configuration.
pub struct Engine {
    config: EngineConfig,
    transport: Arc<dyn SignedTransport>,
    store: Arc<dyn RuleTreeStore>,
    cache: RwLock<LookupCache>,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        transport: Arc<dyn SignedTransport>,
        store: Arc<dyn RuleTreeStore>,
    ) -> Self {
        Self {
            config,
            transport,
            store,
            cache: RwLock::new(LookupCache::new()),
        }
    }

    /// Start from a pre-populated cache
    pub fn with_cache(mut self, cache: LookupCache) -> Self {
        self.cache = RwLock::new(cache);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn RuleTreeStore {
        self.store.as_ref()
    }

    /// The cached record for `id`, without any remote call
    ///
    /// # Errors
    ///
    /// `Concurrency` if the cache lock is poisoned.
    pub fn cached(&self, id: &str) -> Result<Option<ConfigRecord>> {
        self.read_cache(|cache| cache.get(id).cloned())
    }

    /// Number of cached records
    ///
    /// # Errors
    ///
    /// `Concurrency` if the cache lock is poisoned.
    pub fn cache_len(&self) -> Result<usize> {
        self.read_cache(LookupCache::len)
    }

    /// Forget everything; the next resolve re-enumerates
    ///
    /// # Errors
    ///
    /// `Concurrency` if the cache lock is poisoned.
    pub fn clear_cache(&self) -> Result<()> {
        self.write_cache(LookupCache::clear)
    }

    /// Associate a hostname with a cached configuration
    ///
    /// # Errors
    ///
    /// `Concurrency` if the cache lock is poisoned.
    pub fn index_hostname(&self, hostname: &str, network: Network, id: &str) -> Result<()> {
        self.write_cache(|cache| cache.index_hostname(hostname, network, id))
    }

    pub(crate) fn read_cache<R>(&self, f: impl FnOnce(&LookupCache) -> R) -> Result<R> {
        let cache = self.cache.read().map_err(|_| poisoned())?;
        Ok(f(&cache))
    }

    pub(crate) fn write_cache<R>(&self, f: impl FnOnce(&mut LookupCache) -> R) -> Result<R> {
        let mut cache = self.cache.write().map_err(|_| poisoned())?;
        Ok(f(&mut cache))
    }

    pub(crate) fn url(&self, path: ApiPath) -> String {
        path.build(self.config.account_switch_key.as_deref())
    }

    /// Send once and return the raw response, whatever its status
    pub(crate) async fn send(&self, op: &str, request: ApiRequest) -> Result<ApiResponse> {
        tracing::debug!(op, method = %request.method, route = request.route(), "sending request");
        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| tag_op(e, op))?;
        tracing::debug!(op, status = response.status, "response received");
        Ok(response)
    }

    /// Send once and return the body of a 2xx response
    pub(crate) async fn send_ok(&self, op: &str, request: ApiRequest) -> Result<Value> {
        let response = self.send(op, request).await?;
        expect_success(op, response)
    }

    /// Like [`Engine::send_ok`], retrying transient failures up to
    /// `list_retry_attempts` extra times
    pub(crate) async fn send_listing(&self, op: &str, request: ApiRequest) -> Result<Value> {
        let max_attempts = self.config.list_retry_attempts.saturating_add(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.send(op, request.clone()).await {
                Err(e) if e.kind() == ExErrorKind::TransientNetwork && attempt < max_attempts => {
                    tracing::warn!(op, attempt, "no response to list call, retrying");
                }
                Err(e) => return Err(e),
                Ok(response) => return expect_success(op, response),
            }
        }
    }
}

/// Start/end bracketing for one public command
pub(crate) struct OpSpan {
    op: &'static str,
    request_id: RequestId,
    start: Instant,
}

impl OpSpan {
    pub(crate) fn begin(op: &'static str, subject: &str) -> Self {
        let ctx = RequestContext::new();
        log_op_start!(op, request_id = %ctx.request_id, subject = subject);
        Self {
            op,
            request_id: ctx.request_id,
            start: Instant::now(),
        }
    }

    pub(crate) fn finish<T>(self, result: Result<T>) -> Result<T> {
        let duration_ms = self.start.elapsed().as_millis() as u64;
        match result {
            Ok(value) => {
                log_op_end!(
                    self.op,
                    duration_ms = duration_ms,
                    request_id = %self.request_id
                );
                Ok(value)
            }
            Err(e) => {
                let e = e.with_request_id(self.request_id.clone());
                log_op_error!(
                    self.op,
                    e.clone(),
                    duration_ms = duration_ms,
                    request_id = %self.request_id
                );
                Err(e)
            }
        }
    }
}

fn tag_op(err: ExError, op: &str) -> ExError {
    if err.op().is_some() {
        err
    } else {
        err.with_op(op)
    }
}

fn poisoned() -> ExError {
    ExError::new(ExErrorKind::Concurrency)
        .with_op("lookup_cache")
        .with_message("lookup cache lock poisoned")
}
