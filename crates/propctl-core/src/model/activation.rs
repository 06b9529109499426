use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::record::Network;

/// Remote statuses that mean "still in progress"
const IN_PROGRESS_STATUSES: &[&str] = &[
    "PENDING",
    "NEW",
    "ZONE_1",
    "ZONE_2",
    "ZONE_3",
    "PENDING_DEACTIVATION",
    "PENDING_CANCELLATION",
];

/// Whether a request turns a version on or off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActivationType {
    Activate,
    Deactivate,
}

impl ActivationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivationType::Activate => "ACTIVATE",
            ActivationType::Deactivate => "DEACTIVATE",
        }
    }
}

/// Progress of one activation or deactivation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationStatus {
    Pending,
    Active,
    Failed,
    Aborted,
    /// Any other terminal value reported by the service (e.g. `INACTIVE`)
    Terminated(String),
}

impl ActivationStatus {
    /// Classify a remote status string
    ///
    /// Unrecognized values are treated as still pending.
    pub fn from_remote(status: &str) -> Self {
        match status {
            "ACTIVE" => ActivationStatus::Active,
            "FAILED" => ActivationStatus::Failed,
            "ABORTED" => ActivationStatus::Aborted,
            "INACTIVE" | "DEACTIVATED" => ActivationStatus::Terminated(status.to_string()),
            s => {
                if !IN_PROGRESS_STATUSES.contains(&s) {
                    tracing::warn!(status = s, "unrecognized activation status, treating as pending");
                }
                ActivationStatus::Pending
            }
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ActivationStatus::Pending)
    }

    pub fn as_str(&self) -> &str {
        match self {
            ActivationStatus::Pending => "PENDING",
            ActivationStatus::Active => "ACTIVE",
            ActivationStatus::Failed => "FAILED",
            ActivationStatus::Aborted => "ABORTED",
            ActivationStatus::Terminated(s) => s,
        }
    }
}

impl std::fmt::Display for ActivationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An activation or deactivation submitted to one network
#[derive(Debug, Clone, PartialEq)]
pub struct ActivationJob {
    pub property_id: String,
    pub network: Network,
    pub version: u32,
    pub activation_id: String,
    pub activation_type: ActivationType,
    pub status: ActivationStatus,
    /// Warning ids that were acknowledged on the accepted submission
    pub warnings_pending_ack: Vec<String>,
    pub submitted_at: DateTime<Utc>,
    /// Number of status polls performed so far
    pub polls: u32,
}

impl ActivationJob {
    /// A freshly accepted request in `Pending` state
    pub fn new(
        property_id: impl Into<String>,
        network: Network,
        version: u32,
        activation_id: impl Into<String>,
        activation_type: ActivationType,
    ) -> Self {
        Self {
            property_id: property_id.into(),
            network,
            version,
            activation_id: activation_id.into(),
            activation_type,
            status: ActivationStatus::Pending,
            warnings_pending_ack: Vec::new(),
            submitted_at: Utc::now(),
            polls: 0,
        }
    }

    /// Apply a polled status
    ///
    /// Terminal states are sticky; returns whether the status changed.
    pub fn apply_status(&mut self, status: ActivationStatus) -> bool {
        if self.status.is_terminal() || self.status == status {
            return false;
        }
        self.status = status;
        true
    }

    pub fn is_complete(&self) -> bool {
        self.status == ActivationStatus::Active
    }
}

/// What an activation or deactivation call produced
#[derive(Debug, Clone, PartialEq)]
pub enum ActivationOutcome {
    /// Accepted by the service; the caller opted out of waiting
    Submitted(ActivationJob),
    /// Polled until every item reported `ACTIVE`
    Completed(ActivationJob),
    /// Deactivation of a version that was not active on the network
    AlreadyInactive { network: Network, version: u32 },
}

impl ActivationOutcome {
    /// The job, when one was created
    pub fn job(&self) -> Option<&ActivationJob> {
        match self {
            ActivationOutcome::Submitted(job) | ActivationOutcome::Completed(job) => Some(job),
            ActivationOutcome::AlreadyInactive { .. } => None,
        }
    }

    /// True when nothing further is pending on the network
    pub fn is_settled(&self) -> bool {
        !matches!(self, ActivationOutcome::Submitted(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(ActivationStatus::from_remote("ZONE_2"), ActivationStatus::Pending);
        assert_eq!(ActivationStatus::from_remote("ACTIVE"), ActivationStatus::Active);
        assert_eq!(
            ActivationStatus::from_remote("INACTIVE"),
            ActivationStatus::Terminated("INACTIVE".to_string())
        );
        assert!(ActivationStatus::from_remote("ABORTED").is_terminal());
        assert!(!ActivationStatus::from_remote("SOMETHING_NEW").is_terminal());
    }

    #[test]
    fn test_terminal_status_is_sticky() {
        let mut job = ActivationJob::new(
            "prp_1",
            Network::Staging,
            2,
            "atv_1",
            ActivationType::Activate,
        );
        assert!(job.apply_status(ActivationStatus::Failed));
        assert!(!job.apply_status(ActivationStatus::Active));
        assert_eq!(job.status, ActivationStatus::Failed);
    }

    #[test]
    fn test_outcome_settled() {
        let job = ActivationJob::new("prp_1", Network::Production, 1, "atv_2", ActivationType::Activate);
        assert!(!ActivationOutcome::Submitted(job.clone()).is_settled());
        assert!(ActivationOutcome::Completed(job).is_settled());
        assert!(ActivationOutcome::AlreadyInactive {
            network: Network::Production,
            version: 1
        }
        .is_settled());
    }
}
