//! Operation boundary macros
//!
//! Every engine command emits one `start` event and then exactly one `end`
//! or `end_error` event. All three carry `component` (the calling module)
//! and `op`; extra `tracing` fields may follow the required arguments.
//! Callers need `tracing` as a direct dependency.

/// Log the start of an operation
///
/// ```
/// # use propctl_core::log_op_start;
/// log_op_start!("activate");
/// log_op_start!("activate", property_id = "prp_1");
/// ```
#[macro_export]
macro_rules! log_op_start {
    ($op:expr $(, $($field:tt)+)?) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::propctl_core_types::schema::EVENT_START
            $(, $($field)+)?
        )
    };
}

/// Log the successful end of an operation
///
/// ```
/// # use propctl_core::log_op_end;
/// log_op_end!("activate", duration_ms = 42);
/// log_op_end!("activate", duration_ms = 42, polls = 3);
/// ```
#[macro_export]
macro_rules! log_op_end {
    ($op:expr, duration_ms = $duration:expr $(, $($field:tt)+)?) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::propctl_core_types::schema::EVENT_END,
            duration_ms = $duration
            $(, $($field)+)?
        )
    };
}

/// Log the failed end of an operation at `ERROR`
///
/// `$err` is anything convertible into `ExError`; its kind and stable code
/// are logged as `err.kind` and `err.code`.
///
/// ```
/// # use propctl_core::log_op_error;
/// # use propctl_core::errors::{ExError, ExErrorKind};
/// let err = ExError::new(ExErrorKind::NotFound);
/// log_op_error!("resolve", err, duration_ms = 10);
/// ```
#[macro_export]
macro_rules! log_op_error {
    ($op:expr, $err:expr, duration_ms = $duration:expr $(, $($field:tt)+)?) => {{
        let failure: $crate::errors::ExError = $err.into();
        tracing::error!(
            component = module_path!(),
            op = $op,
            event = $crate::propctl_core_types::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err.kind = ?failure.kind(),
            err.code = failure.code()
            $(, $($field)+)?
        )
    }};
}
