//! Error types and the mapping from HTTP / PostgREST failures to
//! [`RemoteError`].

use reqwest::StatusCode;
use serde::Deserialize;
use stockflow_admin::error::{RemoteError, RemoteErrorKind};
use thiserror::Error;

/// Failures setting up the client. Request failures are reported as
/// [`RemoteError`] instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PostgrestError {
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("Timeout must be greater than zero")]
    InvalidTimeout,

    #[error("Could not build HTTP client: {0}")]
    Client(String),
}

/// PostgREST's JSON error body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
}

/// Error kind for a failed response. The PostgREST / SQLSTATE code wins over
/// the HTTP status when both are known.
pub fn classify(status: StatusCode, code: Option<&str>) -> RemoteErrorKind {
    match code {
        Some("42501") => return RemoteErrorKind::AccessDenied,
        Some("PGRST116") => return RemoteErrorKind::NotFound,
        Some("23502" | "23514" | "22P02") => return RemoteErrorKind::Validation,
        Some("23505" | "23503") => return RemoteErrorKind::Conflict,
        _ => {}
    }
    match status.as_u16() {
        401 | 403 => RemoteErrorKind::AccessDenied,
        404 | 406 => RemoteErrorKind::NotFound,
        400 | 422 => RemoteErrorKind::Validation,
        409 => RemoteErrorKind::Conflict,
        _ => RemoteErrorKind::Server,
    }
}

/// Build a [`RemoteError`] from a non-success response.
pub fn from_response(status: StatusCode, body: &str) -> RemoteError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let kind = classify(status, parsed.code.as_deref());
    let message = match parsed.message {
        Some(message) if !message.is_empty() => message,
        _ if !body.trim().is_empty() => body.trim().to_string(),
        _ => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
    };
    let error = RemoteError::new(kind, message);
    match parsed.code {
        Some(code) => error.with_code(code),
        None => error,
    }
}

/// Transport failures never reached the service.
pub fn from_transport(err: &reqwest::Error) -> RemoteError {
    if err.is_timeout() {
        RemoteError::network(format!("request timed out: {err}"))
    } else {
        RemoteError::network(err.to_string())
    }
}

/// A success response whose body did not have the expected shape.
pub fn unexpected_body(what: &str) -> RemoteError {
    RemoteError::new(RemoteErrorKind::Server, format!("unexpected response: {what}"))
}
