//! Webhook delivery response types.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum number of characters of a response body that are kept.
pub const RESPONSE_BODY_LIMIT: usize = 1024;

/// Result of one physical delivery attempt.
///
/// Exactly one of two shapes: a received HTTP response (`status_code` set,
/// `body` optionally set) or a transport failure (`error` set, no status).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookResponse {
    /// Unique identifier for this response.
    pub response_id: Uuid,
    /// Request ID this response corresponds to.
    pub request_id: Uuid,
    /// HTTP status code, when a response was received.
    pub status_code: Option<u16>,
    /// Response body, truncated to [`RESPONSE_BODY_LIMIT`] characters.
    pub body: Option<String>,
    /// Transport error message, when no response was received.
    pub error: Option<String>,
    /// Timestamp when the request was initiated.
    pub started_at: Timestamp,
    /// Timestamp when the response was received or the request failed.
    pub finished_at: Timestamp,
}

impl WebhookResponse {
    /// Creates a response for a received HTTP status.
    pub fn received(
        request_id: Uuid,
        status_code: u16,
        body: Option<String>,
        started_at: Timestamp,
    ) -> Self {
        Self {
            response_id: Uuid::now_v7(),
            request_id,
            status_code: Some(status_code),
            body: body.map(|b| truncate_body(&b)),
            error: None,
            started_at,
            finished_at: Timestamp::now(),
        }
    }

    /// Creates a response for a request that never got an HTTP response.
    pub fn failed(request_id: Uuid, error: impl Into<String>, started_at: Timestamp) -> Self {
        Self {
            response_id: Uuid::now_v7(),
            request_id,
            status_code: None,
            body: None,
            error: Some(error.into()),
            started_at,
            finished_at: Timestamp::now(),
        }
    }

    /// Returns whether an HTTP response was received.
    pub fn is_received(&self) -> bool {
        self.status_code.is_some()
    }

    /// Returns whether the delivery was successful (2xx status code).
    pub fn is_success(&self) -> bool {
        self.status_code.is_some_and(|s| (200..300).contains(&s))
    }

    /// Calculates the response time as a duration.
    pub fn duration(&self) -> jiff::SignedDuration {
        self.finished_at.duration_since(self.started_at)
    }
}

/// Truncates `body` to [`RESPONSE_BODY_LIMIT`] characters on a char boundary.
pub fn truncate_body(body: &str) -> String {
    body.chars().take(RESPONSE_BODY_LIMIT).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_received_response() {
        let request_id = Uuid::new_v4();
        let response =
            WebhookResponse::received(request_id, 200, Some("ok".into()), Timestamp::now());

        assert!(response.is_received());
        assert!(response.is_success());
        assert_eq!(response.request_id, request_id);
        assert_eq!(response.body.as_deref(), Some("ok"));
        assert!(response.error.is_none());
        assert!(!response.duration().is_negative());
    }

    #[test]
    fn test_non_2xx_is_received_but_not_success() {
        let response = WebhookResponse::received(Uuid::new_v4(), 500, None, Timestamp::now());
        assert!(response.is_received());
        assert!(!response.is_success());

        let response = WebhookResponse::received(Uuid::new_v4(), 302, None, Timestamp::now());
        assert!(!response.is_success());
    }

    #[test]
    fn test_failed_response() {
        let response = WebhookResponse::failed(Uuid::new_v4(), "Connection failed", Timestamp::now());
        assert!(!response.is_received());
        assert!(!response.is_success());
        assert_eq!(response.error.as_deref(), Some("Connection failed"));
    }

    #[test]
    fn test_body_truncation() {
        let body = "é".repeat(RESPONSE_BODY_LIMIT + 10);
        let response = WebhookResponse::received(Uuid::new_v4(), 500, Some(body), Timestamp::now());
        assert_eq!(
            response.body.unwrap().chars().count(),
            RESPONSE_BODY_LIMIT
        );
    }
}
