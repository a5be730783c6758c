//! Error taxonomy and HTTP/GraphQL response conversion
//!
//! One `Error` enum carries every domain failure kind named in the error
//! taxonomy: `Validation`, `Unauthenticated`, `Forbidden`, `NotFound`,
//! `Conflict`, `Gone`, `TooManyRequests`, `Dependency`, `Internal`. Services
//! never construct an HTTP status directly — they return an `Error` variant
//! and the `IntoResponse` impl here owns the status mapping, so REST and
//! GraphQL surfaces can't drift apart on what a given failure means.
//!
//! A store `PreconditionFailed` (optimistic-lock / uniqueness-lock
//! violation) is folded into `Conflict` before it reaches a handler, per
//! the note that `412` is "surfaced as 409 to clients".

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::StoreError;

pub type Result<T> = std::result::Result<T, Error>;

/// Domain error taxonomy (see spec §7).
#[derive(Debug, Error)]
pub enum Error {
    /// Bad input shape/value. `field` is a dotted path into the request
    /// body when the failure is attributable to one field.
    #[error("validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// No/invalid/expired bearer token.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// Principal valid but not permitted to perform the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Addressable entity missing.
    #[error("not found: {0}")]
    NotFound(String),

    /// Uniqueness or optimistic-version violation.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Expired single-use token (invite, password reset).
    #[error("gone: {0}")]
    Gone(String),

    /// Quota exceeded. `retry_after_secs` is surfaced to the client.
    #[error("too many requests, retry after {retry_after_secs}s")]
    TooManyRequests { retry_after_secs: u64 },

    /// An external collaborator (JWKS endpoint, mailer, payment gateway)
    /// failed after retries.
    #[error("dependency failure: {0}")]
    Dependency(String),

    /// Programmer error. Message is logged but never sent to the client.
    #[error("internal error: {0}")]
    Internal(String),

    /// Configuration failure at startup.
    #[error("configuration error: {0}")]
    Config(#[from] Box<figment::Error>),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
            field: None,
        }
    }

    pub fn validation_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Error::Validation { .. } => "VALIDATION",
            Error::Unauthenticated(_) => "UNAUTHENTICATED",
            Error::Forbidden(_) => "FORBIDDEN",
            Error::NotFound(_) => "NOT_FOUND",
            Error::Conflict(_) => "CONFLICT",
            Error::Gone(_) => "GONE",
            Error::TooManyRequests { .. } => "TOO_MANY_REQUESTS",
            Error::Dependency(_) => "DEPENDENCY_FAILURE",
            Error::Internal(_) => "INTERNAL",
            Error::Config(_) => "CONFIG_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Error::Validation { .. } => StatusCode::BAD_REQUEST,
            Error::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::Gone(_) => StatusCode::GONE,
            Error::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            Error::Dependency(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Internal(_) | Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Maps a store-layer failure onto the domain taxonomy. `NotFound` from the
/// store is NOT mapped here — callers distinguish "row absent" from
/// "operation failed" themselves, since an absent row is often a valid
/// outcome (e.g. `Get` during an availability check).
impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => Error::NotFound("resource not found".into()),
            StoreError::Conflict(msg) => Error::Conflict(msg),
            StoreError::Throttled | StoreError::Transient(_) => {
                Error::Dependency("store temporarily unavailable".into())
            }
            StoreError::Fatal(msg) => Error::Internal(msg),
        }
    }
}

/// A bind/accept failure on the listening socket — always a startup-time
/// programmer/ops error, never a per-request outcome.
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Internal(format!("io error: {e}"))
    }
}

/// `{ code, message, details? }` error envelope (spec §6).
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();

        // 5xx bodies never carry the underlying message — only a kind and a
        // correlation id that the caller can hand to support. Everything
        // below 500 is safe to echo back verbatim: it's already phrased for
        // the client (validation detail, "why you can't do this").
        let (message, details) = match &self {
            Error::Validation { message, field } => (
                message.clone(),
                field
                    .as_ref()
                    .map(|f| serde_json::json!({ "field": f })),
            ),
            Error::TooManyRequests { retry_after_secs } => (
                "rate limit exceeded".to_string(),
                Some(serde_json::json!({ "retryAfter": retry_after_secs })),
            ),
            Error::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                ("an internal error occurred".to_string(), None)
            }
            Error::Config(e) => {
                tracing::error!(error = %e, "configuration error");
                ("an internal error occurred".to_string(), None)
            }
            other => (other.to_string(), None),
        };

        let body = ErrorBody {
            code: self.code().to_string(),
            message,
            details,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precondition_failed_surfaces_as_409() {
        let err: Error = StoreError::Conflict("version mismatch".into()).into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn throttled_surfaces_as_503_dependency() {
        let err: Error = StoreError::Throttled.into();
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.code(), "DEPENDENCY_FAILURE");
    }

    #[test]
    fn internal_message_is_not_leaked_to_client() {
        let err = Error::Internal("stack trace: panicked at ...".to_string());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
