//! Resolution of lookup keys to configuration records
//!
//! ## Cascade
//! 1. A fully-qualified record is returned unchanged, with no side effects
//! 2. The cache is enumerated on first use, and again while it holds no
//!    records
//! 3. Local lookup: id, sanitized name, hostname table of the network
//! 4. Remote search, for ids (id lookup, name search, hostname search) and
//!    explicit hostnames (hostname search); the first non-empty answer is
//!    cached
//! 5. Otherwise `NotFound`

#![allow(clippy::result_large_err)]

use propctl_core::errors::{ExError, ExErrorKind};
use propctl_core::{ConfigRecord, LookupKey, Network};
use propctl_store::errors::Result;
use serde_json::{Map, Value};

use crate::commands::catalog::{SearchBy, SearchHit};
use crate::engine::{Engine, OpSpan};
use crate::paths::{self, ApiPath};
use crate::transport::ApiRequest;

impl Engine {
    /// Resolve `key` to a configuration record
    ///
    /// `network` selects the hostname table consulted for hostname keys.
    ///
    /// # Errors
    ///
    /// - `NotFound` when no step of the cascade matches
    /// - Enumeration or search failures other than per-group authorization
    ///   failures
    pub async fn resolve(&self, key: impl Into<LookupKey>, network: Network) -> Result<ConfigRecord> {
        let key = key.into();
        if let LookupKey::Resolved(record) = &key {
            if record.is_fully_qualified() {
                return Ok(record.clone());
            }
        }

        let span = OpSpan::begin("resolve", &key.to_string());
        let result = self.resolve_impl(key, network).await;
        span.finish(result)
    }

    /// Enumerate every reachable group/contract pair into the cache
    ///
    /// No-op once an enumeration has cached at least one record; an empty
    /// cache is enumerated again. Pairs the credentials may not read are
    /// skipped. Returns the number of cached records.
    ///
    /// # Errors
    ///
    /// Failures listing groups, or listing a pair for any reason other
    /// than authorization.
    pub async fn initialize(&self) -> Result<usize> {
        if !self.read_cache(|c| c.needs_enumeration())? {
            return self.cache_len();
        }
        let span = OpSpan::begin("initialize", "all");
        let result = self.initialize_impl().await;
        span.finish(result)
    }

    async fn resolve_impl(&self, key: LookupKey, network: Network) -> Result<ConfigRecord> {
        let raw = match &key {
            LookupKey::Resolved(record) if !record.id.is_empty() => record.id.clone(),
            LookupKey::Resolved(record) => record.name.clone(),
            LookupKey::ById(s) | LookupKey::ByName(s) | LookupKey::ByHostname(s) => s.clone(),
        };
        if raw.is_empty() {
            return Err(ExError::new(ExErrorKind::InvalidInput)
                .with_op("resolve")
                .with_message("empty lookup key"));
        }

        self.initialize().await?;

        if let Some(record) = self.read_cache(|c| c.lookup(&raw, network).cloned())? {
            tracing::debug!(key = %raw, id = %record.id, "resolved from cache");
            return Ok(record);
        }

        let remote = match &key {
            LookupKey::ById(id) => self.remote_lookup_id(id, network).await?,
            LookupKey::Resolved(record) if !record.id.is_empty() => {
                self.remote_lookup_id(&record.id, network).await?
            }
            LookupKey::ByHostname(host) => self.remote_lookup_hostname(host, network).await?,
            _ => None,
        };

        remote.ok_or_else(|| {
            ExError::new(ExErrorKind::NotFound)
                .with_op("resolve")
                .with_message(format!("no configuration matches '{}'", raw))
        })
    }

    async fn initialize_impl(&self) -> Result<usize> {
        let groups = self.list_groups_raw().await?;

        let mut records = Vec::new();
        let mut skipped = 0usize;
        for group in &groups {
            for contract_id in &group.contract_ids {
                let path = ApiPath::new("/papi/v1/properties")
                    .param("contractId", contract_id.clone())
                    .param("groupId", group.group_id.clone());
                let body = match self
                    .send_listing("list_properties", ApiRequest::get(self.url(path)))
                    .await
                {
                    Ok(body) => body,
                    Err(e) if e.kind() == ExErrorKind::Unauthorized => {
                        tracing::warn!(
                            group_id = %group.group_id,
                            contract_id = %contract_id,
                            "access denied, skipping group"
                        );
                        skipped += 1;
                        continue;
                    }
                    Err(e) => return Err(e),
                };
                for mut record in property_items(&body, "properties")? {
                    if record.group_id.is_empty() {
                        record.group_id = group.group_id.clone();
                    }
                    if record.contract_id.is_empty() {
                        record.contract_id = contract_id.clone();
                    }
                    records.push(record);
                }
            }
        }

        let count = self.write_cache(|cache| {
            for record in records {
                cache.upsert(record);
            }
            cache.mark_initialized();
            cache.len()
        })?;
        tracing::info!(records = count, skipped, "lookup cache initialized");
        Ok(count)
    }

    /// id lookup, then name search, then hostname search
    async fn remote_lookup_id(&self, id: &str, network: Network) -> Result<Option<ConfigRecord>> {
        let path = paths::property(id);
        match self.send_ok("get_property", ApiRequest::get(self.url(path))).await {
            Ok(body) => {
                if let Some(record) = property_items(&body, "properties")?.into_iter().next() {
                    return Ok(Some(self.remember(record)?));
                }
            }
            Err(e) if matches!(e.kind(), ExErrorKind::NotFound | ExErrorKind::Unauthorized) => {
                tracing::debug!(id, code = e.code(), "direct id lookup failed, searching");
            }
            Err(e) => return Err(e),
        }

        for by in [SearchBy::PropertyName, SearchBy::Hostname] {
            let hits = self.search_raw(by, id).await?;
            if let Some(record) = self.adopt_hits(&hits, by, id, network)? {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    async fn remote_lookup_hostname(
        &self,
        hostname: &str,
        network: Network,
    ) -> Result<Option<ConfigRecord>> {
        let hits = self.search_raw(SearchBy::Hostname, hostname).await?;
        self.adopt_hits(&hits, SearchBy::Hostname, hostname, network)
    }

    /// Cache the configuration found by a search, indexing the searched
    /// hostname on the networks where the matching version is live
    pub(crate) fn adopt_hits(
        &self,
        hits: &[SearchHit],
        by: SearchBy,
        value: &str,
        network: Network,
    ) -> Result<Option<ConfigRecord>> {
        let Some(record) = record_from_hits(hits) else {
            return Ok(None);
        };
        let record = self.remember(record)?;
        if by == SearchBy::Hostname {
            self.write_cache(|cache| {
                let mut indexed = false;
                for hit in hits.iter().filter(|h| h.property_id == record.id) {
                    for net in hit.active_networks() {
                        cache.index_hostname(value, net, &record.id);
                        indexed |= net == network;
                    }
                }
                if !indexed {
                    cache.index_hostname(value, network, &record.id);
                }
            })?;
        }
        Ok(Some(record))
    }

    /// Upsert into the cache, keeping version pointers the cache already
    /// knows when the incoming record lacks them
    pub(crate) fn remember(&self, mut record: ConfigRecord) -> Result<ConfigRecord> {
        self.write_cache(|cache| {
            if let Some(known) = cache.get(&record.id) {
                record.latest_version = record.latest_version.max(known.latest_version);
                if record.account_id.is_empty() {
                    record.account_id = known.account_id.clone();
                }
            }
            cache.upsert(record.clone());
            record
        })
    }

    pub(crate) async fn search_raw(&self, by: SearchBy, value: &str) -> Result<Vec<SearchHit>> {
        let path = ApiPath::new("/papi/v1/search/find-by-value");
        let mut body = Map::new();
        body.insert(by.field().to_string(), Value::String(value.to_string()));
        let response = self
            .send_listing("search", ApiRequest::post(self.url(path), Value::Object(body)))
            .await?;
        let items = response
            .pointer("/versions/items")
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new()));
        Ok(serde_json::from_value(items)?)
    }
}

/// Decode `{<collection>: {items: [...]}}` into records
pub(crate) fn property_items(body: &Value, collection: &str) -> Result<Vec<ConfigRecord>> {
    let Some(items) = body.get(collection).and_then(|c| c.get("items")) else {
        return Ok(Vec::new());
    };
    Ok(serde_json::from_value(items.clone())?)
}

/// Fold the version rows of one configuration into a record
fn record_from_hits(hits: &[SearchHit]) -> Option<ConfigRecord> {
    let first = hits.first()?;
    let mut record = ConfigRecord::new(
        first.property_id.clone(),
        first.property_name.clone(),
        first.group_id.clone(),
        first.contract_id.clone(),
    );
    record.account_id = first.account_id.clone();
    for hit in hits.iter().filter(|h| h.property_id == first.property_id) {
        record.latest_version = record.latest_version.max(hit.property_version);
        for net in hit.active_networks() {
            record.set_active_version(net, Some(hit.property_version));
        }
    }
    Some(record)
}
