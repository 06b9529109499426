//! Command layer
//!
//! Each submodule adds `async` commands to [`Engine`](crate::Engine).
//!
//! ## Logging Ownership
//!
//! Public commands own lifecycle logging through `OpSpan`:
//! - `log_op_start!` at entry
//! - `log_op_end!` on success
//! - `log_op_error!` on failure
//!
//! Helpers below them use only `tracing::debug!`/`warn!` for details.

pub mod activation;
pub mod catalog;
pub mod lookup;
pub mod property;
pub mod rules;
pub mod version;
