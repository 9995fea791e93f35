//! Error types for the IAM API client.
//!
//! # Design
//! Every failure that leaves the client core is an `ApiError`. Variants follow
//! the failure taxonomy of the pipeline: configuration mistakes, protocol
//! misuse, payload (de)serialization, service-reported statuses, business
//! codes and transport failures. Callers branch on `kind()` or `code()`
//! instead of matching message text.
//!
//! `Remote` keeps the status, reason phrase, headers and body exactly as the
//! service sent them; decoding is skipped for those responses so the original
//! diagnostic payload survives.

use std::collections::HashMap;

/// Response headers grouped by name, in the order the transport reported them.
pub type HeaderMultiMap = HashMap<String, Vec<String>>;

/// Errors returned by the client core and the typed endpoint APIs.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Invalid client or call configuration: unknown authentication scheme,
    /// incompatible strategy swap, malformed content type, bad proxy setup.
    #[error("configuration error: {0}")]
    Config(String),

    /// A body was supplied on a verb that does not accept one.
    #[error("method {method} does not support a request body")]
    BodyNotAllowed { method: String },

    /// The request payload could not be encoded for the resolved content type.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// A success response body could not be converted into the declared type.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The service answered with a redirection or error status (>= 300).
    #[error("HTTP {status} {reason}")]
    Remote {
        status: u16,
        reason: String,
        headers: HeaderMultiMap,
        body: Option<String>,
    },

    /// The service answered 2xx but its envelope carried a non-success code.
    #[error("service error {code}: {message}")]
    Service { code: i64, message: String },

    /// The request never produced a response (connect, DNS, I/O).
    #[error("transport error: {0}")]
    Transport(String),
}

/// Fieldless discriminant of [`ApiError`] for branching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Config,
    BodyNotAllowed,
    Serialization,
    Deserialization,
    Remote,
    Service,
    Transport,
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Config(_) => ErrorKind::Config,
            ApiError::BodyNotAllowed { .. } => ErrorKind::BodyNotAllowed,
            ApiError::Serialization(_) => ErrorKind::Serialization,
            ApiError::Deserialization(_) => ErrorKind::Deserialization,
            ApiError::Remote { .. } => ErrorKind::Remote,
            ApiError::Service { .. } => ErrorKind::Service,
            ApiError::Transport(_) => ErrorKind::Transport,
        }
    }

    /// HTTP status for remote errors, business code for service errors, and
    /// `0` for failures that never reached the service.
    pub fn code(&self) -> i64 {
        match self {
            ApiError::Remote { status, .. } => i64::from(*status),
            ApiError::Service { code, .. } => *code,
            _ => 0,
        }
    }

    pub fn headers(&self) -> Option<&HeaderMultiMap> {
        match self {
            ApiError::Remote { headers, .. } => Some(headers),
            _ => None,
        }
    }

    /// Raw response body of a remote error, verbatim.
    pub fn body(&self) -> Option<&str> {
        match self {
            ApiError::Remote { body, .. } => body.as_deref(),
            _ => None,
        }
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        ApiError::Config(msg.into())
    }
}
