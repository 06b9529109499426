//! propctl Engine - orchestration layer
//!
//! Coordinates the lookup cache, the rule-tree kernel in `propctl-core` and
//! the two injected collaborators:
//! - [`SignedTransport`] for signed calls to the configuration service
//! - [`RuleTreeStore`](propctl_store::RuleTreeStore) for saved rule trees
//!
//! Every public command on [`Engine`] logs one start event and exactly one
//! end or end_error event.

pub mod cache;
pub mod commands;
pub mod config;
pub mod engine;
pub mod paths;
pub mod transport;

pub use cache::{LookupCache, VersionUpdate};
pub use commands::activation::{ActivationRequest, ActivationStep};
pub use commands::catalog::{EdgeHostname, Group, Product, SearchBy, SearchHit};
pub use commands::property::{NewProperty, PropertyStep};
pub use config::EngineConfig;
pub use engine::Engine;
pub use transport::{ApiRequest, ApiResponse, Method, SignedTransport};
