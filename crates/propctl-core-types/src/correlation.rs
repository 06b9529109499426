//! Correlation ids
//!
//! One [`RequestContext`] is opened per engine command. Its request id is
//! stamped on the command's start and end events and on any error the
//! command returns, so retries and poll iterations can be grouped after the
//! fact.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! correlation_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Fresh time-ordered id (UUIDv7)
            pub fn new() -> Self {
                Self(Uuid::now_v7().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                Self(raw)
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                Self(raw.to_string())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

correlation_id!(
    /// Identifies one engine command from its start event to its end event
    RequestId
);

correlation_id!(
    /// Identifies a caller-side trace that several commands belong to
    TraceId
);

/// Correlation state of one engine command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub request_id: RequestId,
    /// Set when the caller supplied one
    pub trace_id: Option<TraceId>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            request_id: RequestId::new(),
            trace_id: None,
        }
    }

    /// Join an existing trace
    pub fn in_trace(trace_id: impl Into<TraceId>) -> Self {
        Self {
            request_id: RequestId::new(),
            trace_id: Some(trace_id.into()),
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_command_gets_its_own_id() {
        let a = RequestContext::new();
        let b = RequestContext::new();
        assert_ne!(a.request_id, b.request_id);
        assert!(a.trace_id.is_none());
    }

    #[test]
    fn test_joined_trace_keeps_caller_id() {
        let ctx = RequestContext::in_trace("trace-7");
        assert_eq!(ctx.trace_id.as_ref().map(TraceId::as_str), Some("trace-7"));
    }

    #[test]
    fn test_ids_serialize_as_plain_strings() {
        let id = RequestId::from("req-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"req-1\"");
        assert_eq!(id.to_string(), "req-1");
    }
}
