//! Centralized error types for the relay core library.
//!
//! This module provides a unified error handling system that:
//! - Defines structured error types using `thiserror`
//! - Maps errors to appropriate HTTP status codes and client-facing codes
//! - Renders a plain status line + body for the raw HTTP wire layer

use http::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// Trait for error types that provide machine-readable error codes.
pub trait ErrorCode {
    /// Returns a machine-readable error code for API responses.
    fn code(&self) -> &'static str;
}

/// Application-wide error type for the relay server.
///
/// Variants line up with the error kinds a source or listener connection can
/// terminate with: authentication, capacity, and I/O failures each get their
/// own client-visible status and internal disposition.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum RelayError {
    /// Source credentials did not match the mount's configured password.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// A source is already attached to this mount.
    #[error("source already connected: {0}")]
    SourceConflict(String),

    /// The server-wide source limit has been reached.
    #[error("source limit reached")]
    SourceLimit,

    /// The mount's listener limit has been reached.
    #[error("listener limit reached: {0}")]
    ListenerLimit(String),

    /// No source is currently attached to the requested mount.
    #[error("no source connected: {0}")]
    NoSource(String),

    /// The requested mount does not exist.
    #[error("mount not found: {0}")]
    NotFound(String),

    /// Reading from the source connection failed or the source disconnected.
    #[error("source read error: {0}")]
    SourceRead(String),

    /// A source connection produced no data within its idle timeout.
    #[error("source timed out: {0}")]
    SourceTimeout(String),

    /// Writing to a listener connection failed.
    #[error("listener write error: {0}")]
    ListenerWrite(String),

    /// A listener connection could not keep up within its write timeout.
    #[error("listener timed out: {0}")]
    ListenerTimeout(String),

    /// Malformed request (bad headers, unsupported method, unparseable query).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Internal error unrelated to client input.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Returns a machine-readable error code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AuthFailed(_) => "auth_failed",
            Self::SourceConflict(_) => "source_conflict",
            Self::SourceLimit => "source_limit",
            Self::ListenerLimit(_) => "listener_limit",
            Self::NoSource(_) => "no_source",
            Self::NotFound(_) => "not_found",
            Self::SourceRead(_) => "source_read_error",
            Self::SourceTimeout(_) => "source_timeout",
            Self::ListenerWrite(_) => "listener_write_error",
            Self::ListenerTimeout(_) => "listener_timeout",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Maps the error to the HTTP status code returned to the client.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::AuthFailed(_) => StatusCode::UNAUTHORIZED,
            Self::SourceConflict(_) => StatusCode::FORBIDDEN,
            Self::SourceLimit | Self::ListenerLimit(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::NoSource(_) => StatusCode::CONFLICT,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::SourceRead(_)
            | Self::SourceTimeout(_)
            | Self::ListenerWrite(_)
            | Self::ListenerTimeout(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ErrorCode for RelayError {
    fn code(&self) -> &'static str {
        RelayError::code(self)
    }
}

/// Convenient Result alias for CORE operations.
pub type RelayResult<T> = Result<T, RelayError>;

/// JSON response body for error responses.
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
    status: u16,
}

impl RelayError {
    /// Renders this error as a full HTTP response (status line + headers +
    /// JSON body), ready to write directly to a raw connection. Used by the
    /// admin metadata endpoint and by the mount handshake when a request is
    /// rejected before a `SourceSession`/`ListenerSession` exists.
    #[must_use]
    pub fn to_http_response(&self) -> Vec<u8> {
        let status = self.status_code();
        let body = serde_json::to_vec(&ErrorResponse {
            error: self.code(),
            message: self.to_string(),
            status: status.as_u16(),
        })
        .unwrap_or_default();

        let mut out = Vec::with_capacity(body.len() + 128);
        out.extend_from_slice(
            format!(
                "HTTP/1.0 {} {}\r\n",
                status.as_u16(),
                status.canonical_reason().unwrap_or("")
            )
            .as_bytes(),
        );
        out.extend_from_slice(b"Content-Type: application/json\r\n");
        out.extend_from_slice(format!("Content-Length: {}\r\n", body.len()).as_bytes());
        out.extend_from_slice(b"Connection: close\r\n\r\n");
        out.extend_from_slice(&body);
        out
    }
}
