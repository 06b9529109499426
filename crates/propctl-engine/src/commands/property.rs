//! Configuration create, clone and delete
//!
//! ## Create / clone steps
//! 1. `ResolveSource` (clone only): resolve the source and pick its version
//! 2. `Create`: submit the new configuration, read its id from the link
//! 3. `Fetch`: read the created record back
//! 4. `Index`: cache the record
//!
//! Delete removes the remote configuration, then evicts it from the cache.

#![allow(clippy::result_large_err)]

use propctl_core::errors::{ExError, ExErrorKind};
use propctl_core::{ConfigRecord, LookupKey, Network, VersionSelector};
use propctl_store::errors::Result;
use serde_json::{json, Map, Value};

use crate::commands::lookup::property_items;
use crate::commands::version::{network_for, select_version};
use crate::engine::{Engine, OpSpan};
use crate::paths::{self, link_segment, ApiPath};
use crate::transport::ApiRequest;

/// Parameters of a new configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProperty {
    pub name: String,
    pub product_id: String,
    /// Required for create; a clone defaults to the source's group
    pub group_id: Option<String>,
    /// Required for create; a clone defaults to the source's contract
    pub contract_id: Option<String>,
    pub rule_format: Option<String>,
}

impl NewProperty {
    pub fn new(name: impl Into<String>, product_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            product_id: product_id.into(),
            group_id: None,
            contract_id: None,
            rule_format: None,
        }
    }

    pub fn in_group(mut self, group_id: impl Into<String>, contract_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self.contract_id = Some(contract_id.into());
        self
    }

    pub fn with_rule_format(mut self, rule_format: impl Into<String>) -> Self {
        self.rule_format = Some(rule_format.into());
        self
    }
}

/// Named steps of create and clone, as they appear in logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyStep {
    ResolveSource,
    Create,
    Fetch,
    Index,
}

impl PropertyStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyStep::ResolveSource => "resolve_source",
            PropertyStep::Create => "create",
            PropertyStep::Fetch => "fetch",
            PropertyStep::Index => "index",
        }
    }
}

impl std::fmt::Display for PropertyStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source of a clone, after resolution
struct CloneSource {
    record: ConfigRecord,
    version: u32,
}

impl Engine {
    /// Create an empty configuration
    ///
    /// # Errors
    ///
    /// `InvalidInput` when the group or contract is missing, remote
    /// failures otherwise.
    pub async fn create_property(&self, request: NewProperty) -> Result<ConfigRecord> {
        let span = OpSpan::begin("create_property", &request.name);
        let result = self.create_property_impl(request, None).await;
        span.finish(result)
    }

    /// Create a configuration as a copy of another one's version
    ///
    /// # Errors
    ///
    /// Resolution and version selection failures for the source, remote
    /// failures otherwise.
    pub async fn clone_property(
        &self,
        source: impl Into<LookupKey>,
        from: VersionSelector,
        request: NewProperty,
    ) -> Result<ConfigRecord> {
        let source = source.into();
        let span = OpSpan::begin("clone_property", &source.to_string());
        let result: Result<ConfigRecord> = async {
            tracing::debug!(step = %PropertyStep::ResolveSource, source = %source);
            let record = self.resolve(source, network_for(from)).await?;
            let version = select_version(&record, from, "clone_property")?;
            self.create_property_impl(request, Some(CloneSource { record, version }))
                .await
        }
        .await;
        span.finish(result)
    }

    /// Delete a configuration and evict it from the cache
    ///
    /// Returns the record as it was resolved.
    ///
    /// # Errors
    ///
    /// Resolution failures; remote failures such as deleting a
    /// configuration that is still active.
    pub async fn delete_property(&self, key: impl Into<LookupKey>) -> Result<ConfigRecord> {
        let key = key.into();
        let span = OpSpan::begin("delete_property", &key.to_string());
        let result: Result<ConfigRecord> = async {
            let record = self.resolve(key, Network::Staging).await?;
            let path = paths::property(&record.id).scoped(&record);
            self.send_ok("delete_property", ApiRequest::delete(self.url(path)))
                .await
                .map_err(|e| e.with_property_id(&record.id))?;
            self.write_cache(|cache| cache.evict(&record.id))?;
            tracing::info!(property_id = %record.id, "configuration deleted");
            Ok(record)
        }
        .await;
        span.finish(result)
    }

    async fn create_property_impl(
        &self,
        request: NewProperty,
        source: Option<CloneSource>,
    ) -> Result<ConfigRecord> {
        let group_id = request
            .group_id
            .clone()
            .or_else(|| source.as_ref().map(|s| s.record.group_id.clone()))
            .ok_or_else(|| missing_scope("group"))?;
        let contract_id = request
            .contract_id
            .clone()
            .or_else(|| source.as_ref().map(|s| s.record.contract_id.clone()))
            .ok_or_else(|| missing_scope("contract"))?;
        if request.name.trim().is_empty() {
            return Err(ExError::new(ExErrorKind::InvalidInput)
                .with_op("create_property")
                .with_message("configuration name must not be empty"));
        }

        tracing::debug!(step = %PropertyStep::Create, name = %request.name);
        let mut body = Map::new();
        body.insert("productId".into(), json!(request.product_id));
        body.insert("propertyName".into(), json!(request.name));
        if let Some(format) = &request.rule_format {
            body.insert("ruleFormat".into(), json!(format));
        }
        if let Some(source) = &source {
            body.insert(
                "cloneFrom".into(),
                json!({
                    "propertyId": source.record.id,
                    "version": source.version,
                }),
            );
        }
        let path = ApiPath::new("/papi/v1/properties")
            .param("contractId", contract_id.clone())
            .param("groupId", group_id.clone());
        let created = self
            .send_ok("create_property", ApiRequest::post(self.url(path), Value::Object(body)))
            .await?;
        let link = created
            .get("propertyLink")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let id = link_segment(link, "properties").ok_or_else(|| {
            ExError::new(ExErrorKind::ExternalService)
                .with_op("create_property")
                .with_message(format!("unexpected propertyLink '{}'", link))
                .with_payload(created.clone())
        })?;

        tracing::debug!(step = %PropertyStep::Fetch, property_id = id);
        let mut scope = ConfigRecord::new(id, request.name.clone(), group_id, contract_id);
        let path = paths::property(id).scoped(&scope);
        let fetched = self.send_ok("get_property", ApiRequest::get(self.url(path))).await?;
        if let Some(mut record) = property_items(&fetched, "properties")?.into_iter().next() {
            if record.group_id.is_empty() {
                record.group_id = scope.group_id.clone();
            }
            if record.contract_id.is_empty() {
                record.contract_id = scope.contract_id.clone();
            }
            scope = record;
        }

        tracing::debug!(step = %PropertyStep::Index, property_id = %scope.id);
        let record = self.remember(scope)?;
        tracing::info!(property_id = %record.id, name = %record.name, "configuration created");
        Ok(record)
    }
}

fn missing_scope(what: &str) -> ExError {
    ExError::new(ExErrorKind::InvalidInput)
        .with_op("create_property")
        .with_message(format!("a {} id is required to create a configuration", what))
}
