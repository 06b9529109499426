//! Activation and deactivation state machine
//!
//! ## Steps
//! 1. Resolve the record
//! 2. Select the target version
//! 3. Submit the request; on "warnings not acknowledged", resubmit the same
//!    request acknowledging every reported warning, at most
//!    `max_warning_ack_retries` times and never twice for the same set
//! 4. Record the job (activation id taken from the activation link)
//! 5. Poll every `poll_interval_secs` until all items are `ACTIVE`; a 5xx
//!    answer counts as still pending, any other terminal status fails
//! 6. Write the new active version through to the lookup cache
//!
//! Deactivation follows the same steps without the warning loop. A service
//! answer saying the version is not active on the network is success.

#![allow(clippy::result_large_err)]

use std::collections::BTreeSet;

use propctl_core::errors::{ExError, ExErrorKind};
use propctl_core::{
    ActivationJob, ActivationOutcome, ActivationStatus, ActivationType, ConfigRecord, LookupKey,
    Network, VersionSelector,
};
use propctl_store::errors::Result;
use serde_json::{json, Value};

use crate::cache::VersionUpdate;
use crate::commands::version::select_version;
use crate::engine::{Engine, OpSpan};
use crate::paths::{self, link_segment};
use crate::transport::{expect_success, status_error, ApiRequest};

const WARNINGS_NOT_ACKNOWLEDGED: &str = "warnings-not-acknowledged";
const VERSION_NOT_ACTIVE: &str = "property_version_not_active";

/// Parameters of an activation or deactivation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationRequest {
    pub network: Network,
    /// Defaults to the latest version for activation and to the version
    /// active on `network` for deactivation
    pub version: Option<VersionSelector>,
    /// Defaults to the configured note
    pub note: Option<String>,
    /// Defaults to the configured addresses
    pub notify_emails: Option<Vec<String>>,
    /// Poll until the request settles
    pub wait: bool,
}

impl ActivationRequest {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            version: None,
            note: None,
            notify_emails: None,
            wait: true,
        }
    }

    pub fn with_version(mut self, selector: VersionSelector) -> Self {
        self.version = Some(selector);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_notify_emails(mut self, emails: Vec<String>) -> Self {
        self.notify_emails = Some(emails);
        self
    }

    /// Return as soon as the service accepts the request
    pub fn no_wait(mut self) -> Self {
        self.wait = false;
        self
    }
}

/// Named steps of an activation, as they appear in logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationStep {
    Resolve,
    SelectVersion,
    Submit,
    AcknowledgeWarnings,
    RecordJob,
    Poll,
    UpdateCache,
}

impl ActivationStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivationStep::Resolve => "resolve",
            ActivationStep::SelectVersion => "select_version",
            ActivationStep::Submit => "submit",
            ActivationStep::AcknowledgeWarnings => "acknowledge_warnings",
            ActivationStep::RecordJob => "record_job",
            ActivationStep::Poll => "poll",
            ActivationStep::UpdateCache => "update_cache",
        }
    }
}

impl std::fmt::Display for ActivationStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

enum Submission {
    Accepted(ActivationJob),
    NotActive,
}

impl Engine {
    /// Activate a version on a network
    ///
    /// Resolves to `Completed` once every activation item is `ACTIVE`, or to
    /// `Submitted` right after acceptance when the request opted out of
    /// waiting.
    ///
    /// # Errors
    ///
    /// - `WarningsNotAcknowledged` with the full warning list when warnings
    ///   persist past the acknowledgement ceiling
    /// - `ActivationFailed` with the raw activation payload when polling
    ///   reaches a terminal status other than `ACTIVE`
    /// - Resolution, version selection and remote failures
    pub async fn activate(
        &self,
        key: impl Into<LookupKey>,
        request: ActivationRequest,
    ) -> Result<ActivationOutcome> {
        let key = key.into();
        let span = OpSpan::begin("activate", &key.to_string());
        let result = self.activate_impl(key, request).await;
        span.finish(result)
    }

    /// Deactivate a version on a network
    ///
    /// Deactivating a version that is not active resolves to
    /// `AlreadyInactive`.
    ///
    /// # Errors
    ///
    /// - `ActivationFailed` as for [`Engine::activate`]
    /// - `NotFound` when no version is given and none exists
    /// - Resolution and remote failures
    pub async fn deactivate(
        &self,
        key: impl Into<LookupKey>,
        request: ActivationRequest,
    ) -> Result<ActivationOutcome> {
        let key = key.into();
        let span = OpSpan::begin("deactivate", &key.to_string());
        let result = self.deactivate_impl(key, request).await;
        span.finish(result)
    }

    /// Poll a previously submitted job until it settles
    ///
    /// # Errors
    ///
    /// As the polling step of [`Engine::activate`].
    pub async fn wait_for_activation(
        &self,
        key: impl Into<LookupKey>,
        job: ActivationJob,
    ) -> Result<ActivationJob> {
        let key = key.into();
        let span = OpSpan::begin("wait_for_activation", &job.activation_id);
        let result: Result<ActivationJob> = async {
            let record = self.resolve(key, job.network).await?;
            let job = self.poll_until_settled(&record, job).await?;
            self.settle_cache(&record, &job)?;
            Ok(job)
        }
        .await;
        span.finish(result)
    }

    async fn activate_impl(
        &self,
        key: LookupKey,
        request: ActivationRequest,
    ) -> Result<ActivationOutcome> {
        let network = request.network;
        tracing::debug!(step = %ActivationStep::Resolve, %network);
        let record = self.resolve(key, network).await?;

        let selector = request.version.unwrap_or_default();
        tracing::debug!(step = %ActivationStep::SelectVersion, %selector);
        let version = select_version(&record, selector, "activate")?;

        let job = match self
            .submit(&record, version, &request, ActivationType::Activate)
            .await?
        {
            Submission::Accepted(job) => job,
            Submission::NotActive => {
                return Err(ExError::new(ExErrorKind::Internal)
                    .with_op("activate")
                    .with_message("activation answered with a deactivation outcome"));
            }
        };
        self.finish_job(&record, job, request.wait).await
    }

    async fn deactivate_impl(
        &self,
        key: LookupKey,
        request: ActivationRequest,
    ) -> Result<ActivationOutcome> {
        let network = request.network;
        tracing::debug!(step = %ActivationStep::Resolve, %network);
        let record = self.resolve(key, network).await?;

        tracing::debug!(step = %ActivationStep::SelectVersion, %network);
        let version = match request.version {
            Some(selector) => select_version(&record, selector, "deactivate")?,
            None => match record.active_version(network) {
                Some(v) => v,
                None => select_version(&record, VersionSelector::Latest, "deactivate")?,
            },
        };

        match self
            .submit(&record, version, &request, ActivationType::Deactivate)
            .await?
        {
            Submission::NotActive => {
                tracing::info!(
                    property_id = %record.id,
                    version,
                    %network,
                    "version already inactive"
                );
                self.clear_active_if(&record, network, version)?;
                Ok(ActivationOutcome::AlreadyInactive { network, version })
            }
            Submission::Accepted(job) => self.finish_job(&record, job, request.wait).await,
        }
    }

    async fn finish_job(
        &self,
        record: &ConfigRecord,
        job: ActivationJob,
        wait: bool,
    ) -> Result<ActivationOutcome> {
        tracing::info!(
            step = %ActivationStep::RecordJob,
            property_id = %job.property_id,
            activation_id = %job.activation_id,
            network = %job.network,
            version = job.version,
            "request accepted"
        );
        if !wait {
            return Ok(ActivationOutcome::Submitted(job));
        }
        let job = self.poll_until_settled(record, job).await?;
        self.settle_cache(record, &job)?;
        Ok(ActivationOutcome::Completed(job))
    }

    async fn submit(
        &self,
        record: &ConfigRecord,
        version: u32,
        request: &ActivationRequest,
        activation_type: ActivationType,
    ) -> Result<Submission> {
        let op = op_name(activation_type);
        let network = request.network;
        let context = |e: ExError| {
            e.with_property_id(&record.id)
                .with_version(version)
                .with_network(network.as_str())
        };

        let mut acknowledged: Vec<String> = Vec::new();
        let mut seen: Vec<BTreeSet<String>> = Vec::new();
        loop {
            tracing::debug!(
                step = %ActivationStep::Submit,
                ack_attempt = seen.len(),
                acknowledged = acknowledged.len()
            );
            let body = self.activation_body(version, request, activation_type, &acknowledged);
            let path = paths::activations(&record.id).scoped(record);
            let response = self
                .send(op, ApiRequest::post(self.url(path), body))
                .await
                .map_err(context)?;

            if response.is_success() {
                let activation_id = activation_id(&response.body).map_err(context)?;
                let mut job = ActivationJob::new(
                    record.id.clone(),
                    network,
                    version,
                    activation_id,
                    activation_type,
                );
                job.warnings_pending_ack = acknowledged;
                return Ok(Submission::Accepted(job));
            }

            if activation_type == ActivationType::Deactivate
                && mentions(&response.body, VERSION_NOT_ACTIVE)
            {
                return Ok(Submission::NotActive);
            }

            if activation_type == ActivationType::Activate {
                if let Some(warnings) = unacknowledged_warnings(&response.body) {
                    let set: BTreeSet<String> = warnings.iter().cloned().collect();
                    let ceiling = self.config().max_warning_ack_retries as usize;
                    if warnings.is_empty() || seen.len() >= ceiling || seen.contains(&set) {
                        return Err(context(
                            ExError::new(ExErrorKind::WarningsNotAcknowledged)
                                .with_op(op)
                                .with_message(format!(
                                    "{} warning(s) still unacknowledged after {} resubmission(s)",
                                    warnings.len(),
                                    seen.len()
                                ))
                                .with_warnings(warnings)
                                .with_payload(response.body),
                        ));
                    }

                    tracing::info!(
                        step = %ActivationStep::AcknowledgeWarnings,
                        count = warnings.len(),
                        "acknowledging warnings and resubmitting"
                    );
                    seen.push(set);
                    for warning in warnings {
                        if !acknowledged.contains(&warning) {
                            acknowledged.push(warning);
                        }
                    }
                    continue;
                }
            }

            return Err(context(status_error(op, &response)));
        }
    }

    fn activation_body(
        &self,
        version: u32,
        request: &ActivationRequest,
        activation_type: ActivationType,
        acknowledged: &[String],
    ) -> Value {
        let note = request
            .note
            .clone()
            .unwrap_or_else(|| self.config().default_note.clone());
        let emails = request
            .notify_emails
            .clone()
            .unwrap_or_else(|| self.config().notify_emails.clone());
        json!({
            "propertyVersion": version,
            "network": request.network.as_str(),
            "note": note,
            "notifyEmails": emails,
            "acknowledgeWarnings": acknowledged,
            "activationType": activation_type.as_str(),
        })
    }

    async fn poll_until_settled(
        &self,
        record: &ConfigRecord,
        mut job: ActivationJob,
    ) -> Result<ActivationJob> {
        let interval = self.config().poll_interval();
        let path = self.url(paths::activation(&record.id, &job.activation_id).scoped(record));
        let context = |e: ExError, job: &ActivationJob| {
            e.with_property_id(&job.property_id)
                .with_version(job.version)
                .with_network(job.network.as_str())
        };

        loop {
            tokio::time::sleep(interval).await;
            job.polls += 1;

            let response = self
                .send("poll_activation", ApiRequest::get(path.clone()))
                .await
                .map_err(|e| context(e, &job))?;
            if response.is_server_error() {
                tracing::debug!(
                    step = %ActivationStep::Poll,
                    poll_attempt = job.polls,
                    status = response.status,
                    "server error while polling, treating as pending"
                );
                continue;
            }
            let body = expect_success("poll_activation", response).map_err(|e| context(e, &job))?;

            let status = aggregate_status(&body);
            tracing::debug!(
                step = %ActivationStep::Poll,
                poll_attempt = job.polls,
                activation_id = %job.activation_id,
                status = %status
            );
            job.apply_status(status.clone());
            match status {
                ActivationStatus::Active => return Ok(job),
                ActivationStatus::Pending => continue,
                terminal => {
                    return Err(context(
                        ExError::new(ExErrorKind::ActivationFailed)
                            .with_op("poll_activation")
                            .with_message(format!(
                                "activation {} ended with status {}",
                                job.activation_id, terminal
                            ))
                            .with_payload(body),
                        &job,
                    ));
                }
            }
        }
    }

    fn settle_cache(&self, record: &ConfigRecord, job: &ActivationJob) -> Result<()> {
        tracing::debug!(step = %ActivationStep::UpdateCache, activation_id = %job.activation_id);
        match job.activation_type {
            ActivationType::Activate => {
                self.set_active(record, job.network, Some(job.version))
            }
            ActivationType::Deactivate => self.clear_active_if(record, job.network, job.version),
        }
    }

    fn clear_active_if(&self, record: &ConfigRecord, network: Network, version: u32) -> Result<()> {
        let current = self
            .cached(&record.id)?
            .unwrap_or_else(|| record.clone())
            .active_version(network);
        if current == Some(version) {
            self.set_active(record, network, None)?;
        }
        Ok(())
    }

    fn set_active(&self, record: &ConfigRecord, network: Network, version: Option<u32>) -> Result<()> {
        self.write_cache(|cache| {
            let update = VersionUpdate::Active { network, version };
            if cache.update_versions(&record.id, update).is_none() {
                let mut updated = record.clone();
                updated.set_active_version(network, version);
                cache.upsert(updated);
            }
        })
    }
}

fn op_name(activation_type: ActivationType) -> &'static str {
    match activation_type {
        ActivationType::Activate => "activate",
        ActivationType::Deactivate => "deactivate",
    }
}

fn activation_id(body: &Value) -> Result<String> {
    let link = body
        .get("activationLink")
        .and_then(Value::as_str)
        .unwrap_or_default();
    link_segment(link, "activations")
        .map(str::to_string)
        .ok_or_else(|| {
            ExError::new(ExErrorKind::ExternalService)
                .with_op("submit_activation")
                .with_message(format!("unexpected activationLink '{}'", link))
                .with_payload(body.clone())
        })
}

/// Warning ids of a "warnings not acknowledged" answer, in service order
fn unacknowledged_warnings(body: &Value) -> Option<Vec<String>> {
    let kind = body.get("type").and_then(Value::as_str).unwrap_or_default();
    if !kind.contains(WARNINGS_NOT_ACKNOWLEDGED) {
        return None;
    }
    let warnings = body
        .get("warnings")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|w| w.get("messageId").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    Some(warnings)
}

fn mentions(body: &Value, needle: &str) -> bool {
    match body {
        Value::String(s) => s.contains(needle),
        Value::Array(items) => items.iter().any(|v| mentions(v, needle)),
        Value::Object(map) => map.values().any(|v| mentions(v, needle)),
        _ => false,
    }
}

/// Combined status of every activation item in a poll answer
fn aggregate_status(body: &Value) -> ActivationStatus {
    let statuses: Vec<ActivationStatus> = body
        .pointer("/activations/items")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| {
                    ActivationStatus::from_remote(
                        item.get("status").and_then(Value::as_str).unwrap_or_default(),
                    )
                })
                .collect()
        })
        .unwrap_or_default();

    if statuses.is_empty() {
        return ActivationStatus::Pending;
    }
    if let Some(failed) = statuses
        .iter()
        .find(|s| s.is_terminal() && **s != ActivationStatus::Active)
    {
        return failed.clone();
    }
    if statuses.iter().all(|s| *s == ActivationStatus::Active) {
        ActivationStatus::Active
    } else {
        ActivationStatus::Pending
    }
}
