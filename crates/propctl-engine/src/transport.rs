//! Signed-HTTP collaborator seam
//!
//! The engine never signs requests or touches credentials. It hands an
//! [`ApiRequest`] to a [`SignedTransport`] and classifies the
//! [`ApiResponse`] it gets back.

#![allow(clippy::result_large_err)]

use async_trait::async_trait;
use propctl_core::errors::{ExError, ExErrorKind};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One call to the configuration service
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Service-relative path including the query string
    pub path: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            body: Some(body),
        }
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Put,
            path: path.into(),
            body: Some(body),
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            method: Method::Delete,
            path: path.into(),
            body: None,
        }
    }

    /// The path without its query string
    pub fn route(&self) -> &str {
        self.path.split('?').next().unwrap_or(&self.path)
    }
}

/// What the service answered
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    /// Decoded JSON body; `Null` when the body was empty
    pub body: Value,
}

impl ApiResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_server_error(&self) -> bool {
        self.status >= 500
    }
}

/// Sends signed requests to the configuration service
///
/// Implementations return `Ok` for every HTTP status, including errors.
/// `Err` means no response was received at all and must carry
/// `ExErrorKind::TransientNetwork`.
#[async_trait]
pub trait SignedTransport: Send + Sync {
    /// # Errors
    ///
    /// `TransientNetwork` when the request produced no response.
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ExError>;
}

/// Map a non-2xx response to the error taxonomy
///
/// The response body is attached as the payload.
pub fn status_error(op: &str, response: &ApiResponse) -> ExError {
    let kind = match response.status {
        401 | 403 => ExErrorKind::Unauthorized,
        404 => ExErrorKind::NotFound,
        400..=499 => ExErrorKind::RemoteRejected,
        500..=599 => ExErrorKind::ExternalService,
        _ => ExErrorKind::Internal,
    };
    ExError::new(kind)
        .with_op(op)
        .with_message(format!(
            "service answered {}{}",
            response.status,
            problem_detail(&response.body)
                .map(|d| format!(": {}", d))
                .unwrap_or_default()
        ))
        .with_payload(response.body.clone())
}

/// The body of a 2xx response, or the classified error
///
/// # Errors
///
/// See [`status_error`].
pub fn expect_success(op: &str, response: ApiResponse) -> Result<Value, ExError> {
    if response.is_success() {
        Ok(response.body)
    } else {
        Err(status_error(op, &response))
    }
}

// Problem+JSON bodies carry `title` and `detail`
fn problem_detail(body: &Value) -> Option<String> {
    match (body.get("title"), body.get("detail")) {
        (_, Some(Value::String(detail))) => Some(detail.clone()),
        (Some(Value::String(title)), _) => Some(title.clone()),
        _ => None,
    }
}
