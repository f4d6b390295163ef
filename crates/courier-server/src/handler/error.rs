//! HTTP error responses.

use std::borrow::Cow;
use std::fmt;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::ErrorKind as ServiceErrorKind;

/// Tracing target for service error conversions.
const TRACING_TARGET: &str = "courier_server::handler::error";

/// Error returned by HTTP handlers, rendered as `{"error": message}`.
#[derive(Clone)]
#[must_use = "errors do nothing unless serialized"]
pub struct Error {
    status: StatusCode,
    message: Cow<'static, str>,
}

impl Error {
    /// Creates a new error with the given status and message.
    #[inline]
    pub fn new(status: StatusCode, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// 400 with a caller-facing message.
    #[inline]
    pub fn bad_request(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// 500 with a caller-facing message.
    #[inline]
    pub fn internal(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Returns the HTTP status.
    #[inline]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the message sent to the caller.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Error")
            .field("status", &self.status)
            .field("message", &self.message)
            .finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl std::error::Error for Error {}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<crate::Error> for Error {
    fn from(error: crate::Error) -> Self {
        match error.kind() {
            ServiceErrorKind::NotFound => {
                Self::new(StatusCode::NOT_FOUND, error.message().to_owned())
            }
            ServiceErrorKind::InvalidInput => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    error = %error,
                    "Invalid input"
                );
                Self::bad_request(error.message().to_owned())
            }
            ServiceErrorKind::Config => {
                tracing::error!(
                    target: TRACING_TARGET,
                    error = %error,
                    "Invalid webhook configuration"
                );
                Self::internal("Internal server error")
            }
            ServiceErrorKind::External | ServiceErrorKind::Internal => {
                tracing::error!(
                    target: TRACING_TARGET,
                    error = %error,
                    error_kind = %error.kind(),
                    "Service operation failed"
                );
                Self::internal("Internal server error")
            }
        }
    }
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(
            target: TRACING_TARGET,
            error = %rejection.body_text(),
            "Rejected request body"
        );
        Self::bad_request(rejection.body_text())
    }
}

/// A specialized [`Result`] type for HTTP handlers.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_error_status_mapping() {
        let not_found = Error::from(crate::Error::not_found("Webhook not found"));
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);
        assert_eq!(not_found.message(), "Webhook not found");

        let invalid = Error::from(crate::Error::invalid_input("bad event"));
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

        let config = Error::from(crate::Error::config("empty secret"));
        assert_eq!(config.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(config.message(), "Internal server error");

        let store = Error::from(crate::Error::external("postgres", "connection refused"));
        assert_eq!(store.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
