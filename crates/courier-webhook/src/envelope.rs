//! The JSON envelope that is signed and sent to webhook endpoints.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::signature::{self, Signature};
use crate::Result;

/// Envelope delivered to webhook endpoints.
///
/// Serializes as `{"event":…,"data":…,"timestamp":…}` in exactly that order,
/// without whitespace. Object keys inside `data` serialize in sorted order, so
/// the same envelope always produces the same bytes and the same signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEnvelope {
    /// The event type, e.g. `ticket.created`.
    pub event: String,
    /// Opaque event payload.
    pub data: serde_json::Value,
    /// Millisecond precision UTC timestamp, e.g. `2024-01-01T00:00:00.000Z`.
    pub timestamp: String,
}

impl WebhookEnvelope {
    /// Creates an envelope stamped with `timestamp`.
    pub fn new(event: impl Into<String>, data: serde_json::Value, timestamp: Timestamp) -> Self {
        Self {
            event: event.into(),
            data,
            timestamp: format_timestamp(timestamp),
        }
    }

    /// Returns the canonical body bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Returns the envelope as a JSON value, for audit storage.
    pub fn to_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Serializes and signs the envelope, returning the body and its signature.
    pub fn sign(&self, secret: &[u8]) -> Result<(Vec<u8>, Signature)> {
        let body = self.to_bytes()?;
        let signature = signature::sign(secret, &body)?;
        Ok((body, signature))
    }
}

/// Formats `timestamp` as `YYYY-MM-DDTHH:MM:SS.mmmZ` in UTC.
pub fn format_timestamp(timestamp: Timestamp) -> String {
    let millis = timestamp.subsec_millisecond().rem_euclid(1000);
    format!("{}.{millis:03}Z", timestamp.strftime("%Y-%m-%dT%H:%M:%S"))
}

/// Drops sub-millisecond precision so the stored and rendered timestamps agree.
pub fn truncate_to_millis(timestamp: Timestamp) -> Timestamp {
    Timestamp::from_millisecond(timestamp.as_millisecond()).unwrap_or(timestamp)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn timestamp(s: &str) -> Timestamp {
        s.parse().unwrap()
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(
            format_timestamp(timestamp("2024-01-01T00:00:00Z")),
            "2024-01-01T00:00:00.000Z"
        );
        assert_eq!(
            format_timestamp(timestamp("2024-06-30T23:59:58.123456789Z")),
            "2024-06-30T23:59:58.123Z"
        );
    }

    #[test]
    fn test_truncate_to_millis() {
        let truncated = truncate_to_millis(timestamp("2024-06-30T23:59:58.123456789Z"));
        assert_eq!(truncated, timestamp("2024-06-30T23:59:58.123Z"));
    }

    #[test]
    fn test_canonical_bytes() {
        let envelope = WebhookEnvelope::new(
            "ticket.created",
            json!({"id": "1"}),
            timestamp("2024-01-01T00:00:00Z"),
        );

        let body = envelope.to_bytes().unwrap();
        assert_eq!(
            String::from_utf8(body).unwrap(),
            r#"{"event":"ticket.created","data":{"id":"1"},"timestamp":"2024-01-01T00:00:00.000Z"}"#
        );
    }

    #[test]
    fn test_data_keys_are_sorted() {
        let envelope = WebhookEnvelope::new(
            "team.updated",
            json!({"zeta": 1, "alpha": {"b": 2, "a": 1}}),
            timestamp("2024-01-01T00:00:00Z"),
        );

        let body = String::from_utf8(envelope.to_bytes().unwrap()).unwrap();
        assert!(body.contains(r#""data":{"alpha":{"a":1,"b":2},"zeta":1}"#));
    }

    #[test]
    fn test_sign_matches_pinned_vector() {
        let envelope = WebhookEnvelope::new(
            "ticket.created",
            json!({"id": "1"}),
            timestamp("2024-01-01T00:00:00Z"),
        );

        let (body, signature) = envelope.sign(b"testsecret").unwrap();
        assert!(crate::signature::verify(b"testsecret", &body, signature.as_str()));
        assert_eq!(
            signature.as_str(),
            "a6184b02e0a422e4d6bf9099012c53d977d97854578afa223a5b9c827a7d1733"
        );
    }
}
