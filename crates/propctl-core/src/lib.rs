//! propctl Core - rule-tree model and synchronization kernel
//!
//! This crate holds everything about delivery configurations that does not
//! need the network:
//! - Configuration records, lookup keys and name sanitization
//! - The rule-tree document model with ordered, structure-preserving helpers
//! - Depth-first traversal (`walk`) yielding each node with its ancestry
//! - Advanced-metadata reconciliation between an old and a new rule tree
//! - Activation job and status model
//! - The error and logging facilities shared by the other crates

pub use propctl_core_types;

pub mod errors;
pub mod logging_facility;
pub mod model;
pub mod reconcile;
pub mod traversal;

// Re-export commonly used types
pub use errors::{ExError, ExErrorKind, Result, RuleTreeError};
pub use model::{
    ActivationJob, ActivationOutcome, ActivationStatus, ActivationType, ConfigRecord,
    CriteriaMustSatisfy, Directive, LookupKey, Network, RuleNode, RulePath, RuleTreeDocument,
    VersionSelector,
};
pub use reconcile::reconcile;
pub use traversal::walk;
