//! Structured logging for propctl
//!
//! Binaries call [`init`] once with a [`Profile`]. Library code never
//! installs a subscriber; it only emits events, either through `tracing`
//! directly or through the operation boundary macros
//! ([`log_op_start!`](crate::log_op_start), [`log_op_end!`](crate::log_op_end),
//! [`log_op_error!`](crate::log_op_error)).
//!
//! Tests collect events with [`init_test_capture`].
//!
//! ```rust
//! use propctl_core::logging_facility::{init, Profile};
//!
//! init(Profile::Development);
//! ```

pub mod init;
pub mod macros;
pub mod test_capture;

pub use init::{init, Profile};
pub use test_capture::{init_test_capture, CapturedEvent, TestCapture};
