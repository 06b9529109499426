use propctl_core_types::{RequestId, TraceId};
use thiserror::Error;

/// Result type alias using RuleTreeError
pub type Result<T> = std::result::Result<T, RuleTreeError>;

// ========== Error Facility ==========

/// Failure classes surfaced by every propctl crate
///
/// Callers branch on the kind or its stable [`code`](ExErrorKind::code),
/// never on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExErrorKind {
    /// No configuration, version or file matched
    NotFound,
    /// Caller-supplied data was unusable
    InvalidInput,
    /// An advanced payload of a replacement tree could not be tied to an
    /// identity of the previous tree
    UnmatchedAdvancedMetadata,
    InvalidRuleTree,
    /// 4xx other than 401, 403 and 404
    RemoteRejected,
    /// The request produced no response at all
    TransientNetwork,
    /// 401 or 403
    Unauthorized,
    /// 5xx, or an answer of unexpected shape
    ExternalService,
    /// Warnings still reported after the acknowledgement ceiling
    WarningsNotAcknowledged,
    /// Polling ended in a terminal status other than `ACTIVE`
    ActivationFailed,
    Io,
    Serialization,
    Concurrency,
    Internal,
}

impl ExErrorKind {
    pub fn code(&self) -> &'static str {
        use ExErrorKind::*;
        match self {
            NotFound => "ERR_NOT_FOUND",
            InvalidInput => "ERR_INVALID_INPUT",
            UnmatchedAdvancedMetadata => "ERR_UNMATCHED_ADVANCED_METADATA",
            InvalidRuleTree => "ERR_INVALID_RULE_TREE",
            RemoteRejected => "ERR_REMOTE_REJECTED",
            TransientNetwork => "ERR_TRANSIENT_NETWORK",
            Unauthorized => "ERR_UNAUTHORIZED",
            ExternalService => "ERR_EXTERNAL_SERVICE",
            WarningsNotAcknowledged => "ERR_WARNINGS_NOT_ACKNOWLEDGED",
            ActivationFailed => "ERR_ACTIVATION_FAILED",
            Io => "ERR_IO",
            Serialization => "ERR_SERIALIZATION",
            Concurrency => "ERR_CONCURRENCY",
            Internal => "ERR_INTERNAL",
        }
    }
}

/// Which configuration version and network a failure concerns
#[derive(Debug, Clone, Default)]
struct Target {
    property_id: Option<String>,
    version: Option<u32>,
    network: Option<String>,
}

/// What the remote service said, kept verbatim for the operator
#[derive(Debug, Clone, Default)]
struct RemoteDetail {
    payload: Option<serde_json::Value>,
    /// Complete list, in service order
    warnings: Option<Vec<String>>,
}

/// Structured error returned by every fallible propctl operation
///
/// Built with `ExError::new(kind)` and the `with_*` methods. `Display`
/// renders the code, the operation, the message and the target.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    message: String,
    target: Target,
    remote: RemoteDetail,
    request_id: Option<RequestId>,
    trace_id: Option<TraceId>,
    source: Option<Box<ExError>>,
}

impl ExError {
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            message: String::new(),
            target: Target::default(),
            remote: RemoteDetail::default(),
            request_id: None,
            trace_id: None,
            source: None,
        }
    }

    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_property_id(mut self, id: impl Into<String>) -> Self {
        self.target.property_id = Some(id.into());
        self
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.target.version = Some(version);
        self
    }

    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.target.network = Some(network.into());
        self
    }

    /// Attach the raw body the service answered with
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.remote.payload = Some(payload);
        self
    }

    /// Attach every warning id the service reported
    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.remote.warnings = Some(warnings);
        self
    }

    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    pub fn with_trace_id(mut self, trace_id: TraceId) -> Self {
        self.trace_id = Some(trace_id);
        self
    }

    /// Chain the failure that caused this one
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn property_id(&self) -> Option<&str> {
        self.target.property_id.as_deref()
    }

    pub fn version(&self) -> Option<u32> {
        self.target.version
    }

    pub fn network(&self) -> Option<&str> {
        self.target.network.as_deref()
    }

    pub fn payload(&self) -> Option<&serde_json::Value> {
        self.remote.payload.as_ref()
    }

    pub fn warnings(&self) -> Option<&[String]> {
        self.remote.warnings.as_deref()
    }

    pub fn request_id(&self) -> Option<&RequestId> {
        self.request_id.as_ref()
    }

    pub fn trace_id(&self) -> Option<&TraceId> {
        self.trace_id.as_ref()
    }

    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " {}", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        let Target {
            property_id,
            version,
            network,
        } = &self.target;
        if let Some(id) = property_id {
            write!(f, " (property {}", id)?;
            if let Some(v) = version {
                write!(f, " v{}", v)?;
            }
            if let Some(n) = network {
                write!(f, " on {}", n)?;
            }
            f.write_str(")")?;
        }
        if let Some(warnings) = &self.remote.warnings {
            write!(f, " (warnings: {})", warnings.join(", "))?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|s| s as &(dyn std::error::Error + 'static))
    }
}

impl From<serde_json::Error> for ExError {
    fn from(err: serde_json::Error) -> Self {
        ExError::new(ExErrorKind::Serialization).with_message(err.to_string())
    }
}

// ========== End Error Facility ==========

/// Errors raised by the pure rule-tree code (model helpers and reconciliation)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuleTreeError {
    /// An advanced directive in the replacement tree has no counterpart with
    /// the same payload at the same depth in the previous tree
    #[error("Unmatched advanced metadata at depth {depth} (hash {content_hash}): {payload}")]
    UnmatchedAdvancedMetadata {
        content_hash: String,
        payload: String,
        depth: usize,
    },

    /// Matches disagree on identity: one replacement node would receive two
    /// uuids, or one uuid would land on two replacement nodes
    #[error("Conflicting advanced metadata at rule '{rule_name}': {detail}")]
    ConflictingAdvancedMetadata { rule_name: String, detail: String },

    /// Attempt to rename the root rule
    #[error("The root rule uuid is immutable (attempted: {attempted})")]
    RootUuidImmutable { attempted: String },

    /// A rule path does not address a node of the tree
    #[error("Rule path {path} does not exist")]
    PathNotFound { path: String },

    /// Serialization error (JSON encoding/decoding)
    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

/// Conversion from RuleTreeError to ExError
impl From<RuleTreeError> for ExError {
    fn from(err: RuleTreeError) -> Self {
        match err {
            RuleTreeError::UnmatchedAdvancedMetadata {
                content_hash,
                payload,
                depth,
            } => ExError::new(ExErrorKind::UnmatchedAdvancedMetadata)
                .with_op("reconcile")
                .with_message(format!(
                    "No advanced metadata with hash {} at depth {} in the previous tree; offending payload: {}",
                    content_hash, depth, payload
                )),
            RuleTreeError::ConflictingAdvancedMetadata { rule_name, detail } => {
                ExError::new(ExErrorKind::UnmatchedAdvancedMetadata)
                    .with_op("reconcile")
                    .with_message(format!("Rule '{}': {}", rule_name, detail))
            }
            RuleTreeError::RootUuidImmutable { attempted } => {
                ExError::new(ExErrorKind::InvalidRuleTree)
                    .with_message(format!("Root rule cannot be renamed to {}", attempted))
            }
            RuleTreeError::PathNotFound { path } => ExError::new(ExErrorKind::InvalidRuleTree)
                .with_message(format!("Rule path {} does not exist", path)),
            RuleTreeError::Serialization { message } => {
                ExError::new(ExErrorKind::Serialization).with_message(message)
            }
        }
    }
}

/// Conversion from serde_json::Error to RuleTreeError
impl From<serde_json::Error> for RuleTreeError {
    fn from(err: serde_json::Error) -> Self {
        RuleTreeError::Serialization {
            message: err.to_string(),
        }
    }
}
