//! Version creation

#![allow(clippy::result_large_err)]

use propctl_core::errors::{ExError, ExErrorKind};
use propctl_core::{ConfigRecord, LookupKey, Network, VersionSelector};
use propctl_store::errors::Result;
use serde_json::json;

use crate::cache::VersionUpdate;
use crate::engine::{Engine, OpSpan};
use crate::paths::{self, link_segment};
use crate::transport::ApiRequest;

impl Engine {
    /// Copy the version picked by `from` into a new version
    ///
    /// The cached record's `latest_version` is updated. Returns the new
    /// version number.
    ///
    /// # Errors
    ///
    /// - Resolution failures
    /// - `InvalidInput`/`NotFound` when `from` names no version
    /// - Remote failures (not retried)
    pub async fn create_version(
        &self,
        key: impl Into<LookupKey>,
        from: VersionSelector,
    ) -> Result<u32> {
        let key = key.into();
        let span = OpSpan::begin("create_version", &key.to_string());
        let result = self.create_version_impl(key, from).await;
        span.finish(result)
    }

    async fn create_version_impl(&self, key: LookupKey, from: VersionSelector) -> Result<u32> {
        let record = self.resolve(key, network_for(from)).await?;
        let base = select_version(&record, from, "create_version")?;

        let path = paths::versions(&record.id).scoped(&record);
        let body = self
            .send_ok(
                "create_version",
                ApiRequest::post(self.url(path), json!({ "createFromVersion": base })),
            )
            .await
            .map_err(|e| e.with_property_id(&record.id).with_version(base))?;

        let link = body
            .get("versionLink")
            .and_then(|l| l.as_str())
            .unwrap_or_default();
        let version: u32 = link_segment(link, "versions")
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| {
                ExError::new(ExErrorKind::ExternalService)
                    .with_op("create_version")
                    .with_property_id(&record.id)
                    .with_message(format!("unexpected versionLink '{}'", link))
                    .with_payload(body.clone())
            })?;

        self.note_version_created(&record, version)?;
        tracing::info!(property_id = %record.id, from = base, version, "version created");
        Ok(version)
    }

    pub(crate) fn note_version_created(&self, record: &ConfigRecord, version: u32) -> Result<()> {
        self.write_cache(|cache| {
            if cache.update_versions(&record.id, VersionUpdate::Created(version)).is_none() {
                let mut updated = record.clone();
                updated.latest_version = updated.latest_version.max(version);
                cache.upsert(updated);
            }
        })
    }
}

/// Network whose hostname table a selector's lookup should consult
pub(crate) fn network_for(selector: VersionSelector) -> Network {
    match selector {
        VersionSelector::Production => Network::Production,
        _ => Network::Staging,
    }
}

/// The concrete version `selector` names on `record`
///
/// # Errors
///
/// `InvalidInput` for `Latest` on an unversioned record, `NotFound` when
/// nothing is active on the selected network.
pub(crate) fn select_version(
    record: &ConfigRecord,
    selector: VersionSelector,
    op: &str,
) -> Result<u32> {
    record.version_for(selector).ok_or_else(|| {
        let kind = match selector {
            VersionSelector::Latest => ExErrorKind::InvalidInput,
            _ => ExErrorKind::NotFound,
        };
        ExError::new(kind)
            .with_op(op)
            .with_property_id(&record.id)
            .with_message(format!("no {} version of '{}'", selector, record.name))
    })
}
