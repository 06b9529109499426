//! Rule-tree read, save, load and push
//!
//! ## Push pipeline
//! 1. Resolve the record and pick the target version
//! 2. Fetch the current remote tree of that version
//! 3. Reconcile advanced metadata (old = remote tree, new = caller's tree)
//! 4. Submit the reconciled tree
//! 5. Service-side validation errors surface as `RemoteRejected`

#![allow(clippy::result_large_err)]

use std::path::Path;

use propctl_core::errors::{ExError, ExErrorKind};
use propctl_core::reconcile::reconcile_counted;
use propctl_core::{ConfigRecord, LookupKey, Network, RuleNode, RuleTreeDocument, VersionSelector};
use propctl_store::errors::Result;
use propctl_store::{load_document, save_document};
use serde_json::{json, Value};

use crate::commands::version::{network_for, select_version};
use crate::engine::{Engine, OpSpan};
use crate::paths;
use crate::transport::ApiRequest;

impl Engine {
    /// Fetch the rule tree of one version
    ///
    /// # Errors
    ///
    /// Resolution failures, a selector naming no version, remote failures,
    /// `Serialization` if the answer is not a rule-tree document.
    pub async fn get_rules(
        &self,
        key: impl Into<LookupKey>,
        selector: VersionSelector,
    ) -> Result<RuleTreeDocument> {
        let key = key.into();
        let span = OpSpan::begin("get_rules", &key.to_string());
        let result: Result<RuleTreeDocument> = async {
            let record = self.resolve(key, network_for(selector)).await?;
            let version = select_version(&record, selector, "get_rules")?;
            let raw = self.fetch_rules(&record, version).await?;
            Ok(serde_json::from_value(raw)?)
        }
        .await;
        span.finish(result)
    }

    /// Fetch the rule tree of one version and write it, verbatim, to `path`
    ///
    /// # Errors
    ///
    /// As [`Engine::get_rules`], plus store failures.
    pub async fn save_rules(
        &self,
        key: impl Into<LookupKey>,
        selector: VersionSelector,
        path: &Path,
    ) -> Result<RuleTreeDocument> {
        let key = key.into();
        let span = OpSpan::begin("save_rules", &key.to_string());
        let result: Result<RuleTreeDocument> = async {
            let record = self.resolve(key, network_for(selector)).await?;
            let version = select_version(&record, selector, "save_rules")?;
            let raw = self.fetch_rules(&record, version).await?;
            save_document(self.store(), path, &raw)?;
            tracing::info!(property_id = %record.id, version, path = %path.display(), "rule tree saved");
            Ok(serde_json::from_value(raw)?)
        }
        .await;
        span.finish(result)
    }

    /// Read a previously saved rule-tree document
    ///
    /// # Errors
    ///
    /// Store failures, `Serialization` for malformed documents.
    pub fn load_rules(&self, path: &Path) -> Result<RuleTreeDocument> {
        let span = OpSpan::begin("load_rules", &path.display().to_string());
        let result = load_document(self.store(), path);
        span.finish(result)
    }

    /// Replace the rule tree of one version, restoring advanced-metadata
    /// identities from the tree currently stored remotely
    ///
    /// Returns the document the service answered with.
    ///
    /// # Errors
    ///
    /// - `UnmatchedAdvancedMetadata` when reconciliation cannot tie an
    ///   advanced payload to the current tree (nothing is submitted)
    /// - `RemoteRejected` when the service reports validation errors
    /// - Resolution and other remote failures
    pub async fn push_rules(
        &self,
        key: impl Into<LookupKey>,
        selector: VersionSelector,
        rules: RuleNode,
    ) -> Result<RuleTreeDocument> {
        let key = key.into();
        let span = OpSpan::begin("push_rules", &key.to_string());
        let result: Result<RuleTreeDocument> = async {
            let record = self.resolve(key, network_for(selector)).await?;
            let version = select_version(&record, selector, "push_rules")?;
            self.push_rules_to(&record, version, rules).await
        }
        .await;
        span.finish(result)
    }

    /// Push a tree to the latest version, creating a new version first when
    /// the latest one is live on either network
    ///
    /// # Errors
    ///
    /// As [`Engine::create_version`] and [`Engine::push_rules`].
    pub async fn update_rules(
        &self,
        key: impl Into<LookupKey>,
        rules: RuleNode,
    ) -> Result<RuleTreeDocument> {
        let key = key.into();
        let span = OpSpan::begin("update_rules", &key.to_string());
        let result: Result<RuleTreeDocument> = async {
            let mut record = self.resolve(key, Network::Staging).await?;
            let version = if record.is_latest_active() {
                tracing::info!(
                    property_id = %record.id,
                    latest = record.latest_version,
                    "latest version is live, creating a new one"
                );
                let created = self
                    .create_version(LookupKey::Resolved(record.clone()), VersionSelector::Latest)
                    .await?;
                record.latest_version = created;
                created
            } else {
                select_version(&record, VersionSelector::Latest, "update_rules")?
            };
            self.push_rules_to(&record, version, rules).await
        }
        .await;
        span.finish(result)
    }

    async fn push_rules_to(
        &self,
        record: &ConfigRecord,
        version: u32,
        rules: RuleNode,
    ) -> Result<RuleTreeDocument> {
        let current: RuleTreeDocument =
            serde_json::from_value(self.fetch_rules(record, version).await?)?;

        let (reconciled, matched) = reconcile_counted(&current.rules, rules).map_err(|e| {
            ExError::from(e)
                .with_property_id(&record.id)
                .with_version(version)
        })?;
        tracing::debug!(property_id = %record.id, version, matched, "tree reconciled");

        let path = paths::rules(&record.id, version).scoped(record);
        let body = self
            .send_ok(
                "push_rules",
                ApiRequest::put(self.url(path), json!({ "rules": reconciled })),
            )
            .await
            .map_err(|e| e.with_property_id(&record.id).with_version(version))?;

        let document: RuleTreeDocument = serde_json::from_value(body.clone())?;
        if document.has_errors() {
            return Err(ExError::new(ExErrorKind::RemoteRejected)
                .with_op("push_rules")
                .with_property_id(&record.id)
                .with_version(version)
                .with_message(format!(
                    "service reported {} validation error(s): {}",
                    document.errors.len(),
                    error_summary(&document.errors)
                ))
                .with_payload(body));
        }
        Ok(document)
    }

    async fn fetch_rules(&self, record: &ConfigRecord, version: u32) -> Result<Value> {
        let path = paths::rules(&record.id, version).scoped(record);
        self.send_ok("fetch_rules", ApiRequest::get(self.url(path)))
            .await
            .map_err(|e| e.with_property_id(&record.id).with_version(version))
    }
}

fn error_summary(errors: &[Value]) -> String {
    errors
        .iter()
        .map(|e| {
            e.get("detail")
                .or_else(|| e.get("title"))
                .or_else(|| e.get("type"))
                .and_then(Value::as_str)
                .unwrap_or("unspecified")
                .to_string()
        })
        .collect::<Vec<_>>()
        .join("; ")
}
