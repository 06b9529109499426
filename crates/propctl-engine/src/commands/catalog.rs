//! Read-only pass-throughs: groups, products, rule formats, hostnames and
//! search

#![allow(clippy::result_large_err)]

use propctl_core::{LookupKey, Network, VersionSelector};
use propctl_store::errors::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::commands::version::select_version;
use crate::engine::{Engine, OpSpan};
use crate::paths::{self, ApiPath};
use crate::transport::ApiRequest;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub group_id: String,
    #[serde(default)]
    pub group_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_group_id: Option<String>,
    #[serde(default)]
    pub contract_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub product_id: String,
    #[serde(default)]
    pub product_name: String,
}

/// A hostname served by a configuration version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeHostname {
    pub cname_from: String,
    #[serde(default)]
    pub cname_to: String,
    #[serde(default)]
    pub cname_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge_hostname_id: Option<String>,
}

/// What a search-by-value call matches on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchBy {
    PropertyName,
    Hostname,
    EdgeHostname,
}

impl SearchBy {
    /// Request body key
    pub fn field(&self) -> &'static str {
        match self {
            SearchBy::PropertyName => "propertyName",
            SearchBy::Hostname => "hostname",
            SearchBy::EdgeHostname => "edgeHostname",
        }
    }
}

/// One configuration version matched by a search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub property_id: String,
    #[serde(default)]
    pub property_name: String,
    #[serde(default)]
    pub property_version: u32,
    #[serde(default)]
    pub group_id: String,
    #[serde(default)]
    pub contract_id: String,
    #[serde(default)]
    pub account_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staging_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub production_status: Option<String>,
}

impl SearchHit {
    /// Networks on which this version is live
    pub fn active_networks(&self) -> Vec<Network> {
        let mut networks = Vec::new();
        if self.staging_status.as_deref() == Some("ACTIVE") {
            networks.push(Network::Staging);
        }
        if self.production_status.as_deref() == Some("ACTIVE") {
            networks.push(Network::Production);
        }
        networks
    }
}

impl Engine {
    /// # Errors
    ///
    /// Remote failures, after the list retry policy.
    pub async fn list_groups(&self) -> Result<Vec<Group>> {
        let span = OpSpan::begin("list_groups", "all");
        let result = self.list_groups_raw().await;
        span.finish(result)
    }

    /// # Errors
    ///
    /// Remote failures, after the list retry policy.
    pub async fn list_rule_formats(&self) -> Result<Vec<String>> {
        let span = OpSpan::begin("list_rule_formats", "all");
        let result: Result<Vec<String>> = async {
            let path = ApiPath::new("/papi/v1/rule-formats");
            let body = self
                .send_listing("list_rule_formats", ApiRequest::get(self.url(path)))
                .await?;
            items(&body, "ruleFormats")
        }
        .await;
        span.finish(result)
    }

    /// # Errors
    ///
    /// Remote failures, after the list retry policy.
    pub async fn list_products(&self, contract_id: &str) -> Result<Vec<Product>> {
        let span = OpSpan::begin("list_products", contract_id);
        let result: Result<Vec<Product>> = async {
            let path = ApiPath::new("/papi/v1/products").param("contractId", contract_id);
            let body = self
                .send_listing("list_products", ApiRequest::get(self.url(path)))
                .await?;
            items(&body, "products")
        }
        .await;
        span.finish(result)
    }

    /// Hostnames of one version; indexed in the cache for every network
    /// the version is live on
    ///
    /// # Errors
    ///
    /// Resolution failures, a selector naming no version, remote failures.
    pub async fn list_hostnames(
        &self,
        key: impl Into<LookupKey>,
        selector: VersionSelector,
    ) -> Result<Vec<EdgeHostname>> {
        let key = key.into();
        let span = OpSpan::begin("list_hostnames", &key.to_string());
        let result: Result<Vec<EdgeHostname>> = async {
            let record = self.resolve(key, Network::Staging).await?;
            let version = select_version(&record, selector, "list_hostnames")?;
            let path = paths::hostnames(&record.id, version).scoped(&record);
            let body = self
                .send_listing("list_hostnames", ApiRequest::get(self.url(path)))
                .await?;
            let hostnames: Vec<EdgeHostname> = items(&body, "hostnames")?;

            let live: Vec<Network> = [Network::Staging, Network::Production]
                .into_iter()
                .filter(|n| record.active_version(*n) == Some(version))
                .collect();
            self.write_cache(|cache| {
                for host in &hostnames {
                    for network in &live {
                        cache.index_hostname(&host.cname_from, *network, &record.id);
                    }
                }
            })?;
            Ok(hostnames)
        }
        .await;
        span.finish(result)
    }

    /// Search configurations by name or hostname
    ///
    /// Hostname hits are learned into the cache's hostname tables.
    ///
    /// # Errors
    ///
    /// Remote failures, after the list retry policy.
    pub async fn search(&self, by: SearchBy, value: &str) -> Result<Vec<SearchHit>> {
        let span = OpSpan::begin("search", value);
        let result: Result<Vec<SearchHit>> = async {
            let hits = self.search_raw(by, value).await?;
            if by == SearchBy::Hostname {
                self.write_cache(|cache| {
                    for hit in &hits {
                        for network in hit.active_networks() {
                            cache.index_hostname(value, network, &hit.property_id);
                        }
                    }
                })?;
            }
            Ok(hits)
        }
        .await;
        span.finish(result)
    }

    pub(crate) async fn list_groups_raw(&self) -> Result<Vec<Group>> {
        let path = ApiPath::new("/papi/v1/groups");
        let body = self
            .send_listing("list_groups", ApiRequest::get(self.url(path)))
            .await?;
        items(&body, "groups")
    }
}

/// Decode `{<collection>: {items: [...]}}`
fn items<T: serde::de::DeserializeOwned>(body: &Value, collection: &str) -> Result<Vec<T>> {
    match body.get(collection).and_then(|c| c.get("items")) {
        Some(items) => Ok(serde_json::from_value(items.clone())?),
        None => Ok(Vec::new()),
    }
}
