//! Signed webhook delivery requests.

use std::fmt;
use std::time::Duration;

use url::Url;
use uuid::Uuid;

use crate::{Result, Signature, WebhookEnvelope};

/// Header carrying the hex HMAC-SHA256 of the body.
pub const HEADER_SIGNATURE: &str = "X-Webhook-Signature";
/// Header carrying the event type.
pub const HEADER_EVENT: &str = "X-Webhook-Event";
/// Header carrying the webhook id.
pub const HEADER_WEBHOOK_ID: &str = "X-Webhook-ID";
/// Header carrying the envelope timestamp.
pub const HEADER_TIMESTAMP: &str = "X-Webhook-Timestamp";

/// A single, already signed, webhook delivery.
///
/// The body is the exact byte sequence the signature was computed over; the
/// transport must send it unchanged.
#[derive(Clone)]
pub struct WebhookRequest {
    /// Unique identifier for this physical attempt.
    pub request_id: Uuid,
    /// Webhook this request is addressed to.
    pub webhook_id: Uuid,
    /// The webhook endpoint URL.
    pub url: Url,
    /// The event type that triggered this delivery.
    pub event: String,
    /// Envelope timestamp, repeated in a header.
    pub timestamp: String,
    /// Serialized envelope.
    pub body: Vec<u8>,
    /// Signature over `body`.
    pub signature: Signature,
    /// Optional request timeout (uses client default if not set).
    pub timeout: Option<Duration>,
}

impl WebhookRequest {
    /// Serializes and signs `envelope` for delivery to `url`.
    pub fn signed(
        webhook_id: Uuid,
        url: Url,
        envelope: &WebhookEnvelope,
        secret: &[u8],
    ) -> Result<Self> {
        let (body, signature) = envelope.sign(secret)?;

        Ok(Self {
            request_id: Uuid::now_v7(),
            webhook_id,
            url,
            event: envelope.event.clone(),
            timestamp: envelope.timestamp.clone(),
            body,
            signature,
            timeout: None,
        })
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Returns the `X-Webhook-*` headers in a fixed order.
    pub fn webhook_headers(&self) -> [(&'static str, String); 4] {
        [
            (HEADER_SIGNATURE, self.signature.to_string()),
            (HEADER_EVENT, self.event.clone()),
            (HEADER_WEBHOOK_ID, self.webhook_id.to_string()),
            (HEADER_TIMESTAMP, self.timestamp.clone()),
        ]
    }

    /// Decodes the body back into an envelope.
    pub fn envelope(&self) -> Result<WebhookEnvelope> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

impl fmt::Debug for WebhookRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookRequest")
            .field("request_id", &self.request_id)
            .field("webhook_id", &self.webhook_id)
            .field("url", &self.url.as_str())
            .field("event", &self.event)
            .field("timestamp", &self.timestamp)
            .field("body_len", &self.body.len())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use jiff::Timestamp;
    use serde_json::json;

    use super::*;
    use crate::signature;

    fn envelope() -> WebhookEnvelope {
        let timestamp: Timestamp = "2024-01-01T00:00:00Z".parse().unwrap();
        WebhookEnvelope::new("ticket.created", json!({"id": "1"}), timestamp)
    }

    #[test]
    fn test_signed_request() {
        let webhook_id = Uuid::now_v7();
        let url = Url::parse("https://example.com/hooks").unwrap();
        let request = WebhookRequest::signed(webhook_id, url.clone(), &envelope(), b"testsecret")
            .unwrap()
            .with_timeout(Duration::from_secs(5));

        assert_eq!(request.url, url);
        assert_eq!(request.event, "ticket.created");
        assert_eq!(request.timestamp, "2024-01-01T00:00:00.000Z");
        assert_eq!(request.timeout, Some(Duration::from_secs(5)));
        assert!(signature::verify(
            b"testsecret",
            &request.body,
            request.signature.as_str()
        ));
        assert_eq!(request.envelope().unwrap(), envelope());
    }

    #[test]
    fn test_webhook_headers() {
        let webhook_id = Uuid::now_v7();
        let url = Url::parse("https://example.com/hooks").unwrap();
        let request = WebhookRequest::signed(webhook_id, url, &envelope(), b"testsecret").unwrap();

        let headers = request.webhook_headers();
        assert_eq!(headers[0].0, HEADER_SIGNATURE);
        assert_eq!(headers[0].1, request.signature.as_str());
        assert_eq!(headers[1].1, "ticket.created");
        assert_eq!(headers[2].1, webhook_id.to_string());
        assert_eq!(headers[3].1, "2024-01-01T00:00:00.000Z");
    }

    #[test]
    fn test_debug_omits_signature() {
        let url = Url::parse("https://example.com/hooks").unwrap();
        let request =
            WebhookRequest::signed(Uuid::now_v7(), url, &envelope(), b"testsecret").unwrap();

        let debug = format!("{request:?}");
        assert!(!debug.contains(request.signature.as_str()));
    }
}
