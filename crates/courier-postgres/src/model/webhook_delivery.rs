//! Webhook delivery model for PostgreSQL database operations.
//!
//! Every physical HTTP attempt produces exactly one row. Rows are append-only:
//! retries of the same logical delivery share `webhook_id`, `event_type` and
//! `event_timestamp` and differ in `attempt_count`.

use diesel::prelude::*;
use jiff_diesel::Timestamp;
use uuid::Uuid;

use crate::schema::webhook_deliveries;
use crate::types::WebhookEvent;

/// A recorded delivery attempt.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable)]
#[diesel(table_name = webhook_deliveries)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct WebhookDelivery {
    /// Unique attempt identifier.
    pub id: Uuid,
    /// Webhook the attempt was addressed to.
    pub webhook_id: Uuid,
    /// Event type of the delivered envelope.
    pub event_type: WebhookEvent,
    /// Envelope timestamp, shared by all attempts of one logical delivery.
    pub event_timestamp: Timestamp,
    /// Exact envelope that was sent.
    pub payload: serde_json::Value,
    /// HTTP status returned by the receiver, if a response arrived.
    pub response_status: Option<i32>,
    /// Response body, truncated.
    pub response_body: Option<String>,
    /// Transport failure description when no response arrived.
    pub error_message: Option<String>,
    /// 1-based attempt number within the logical delivery.
    pub attempt_count: i32,
    /// When the HTTP call was made.
    pub last_attempted_at: Timestamp,
    /// When the row was written.
    pub created_at: Timestamp,
}

/// Data structure for recording a delivery attempt.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = webhook_deliveries)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewWebhookDelivery {
    /// Webhook the attempt was addressed to.
    pub webhook_id: Uuid,
    /// Event type of the delivered envelope.
    pub event_type: WebhookEvent,
    /// Envelope timestamp.
    pub event_timestamp: Timestamp,
    /// Exact envelope that was sent.
    pub payload: serde_json::Value,
    /// HTTP status returned by the receiver.
    pub response_status: Option<i32>,
    /// Response body, truncated.
    pub response_body: Option<String>,
    /// Transport failure description.
    pub error_message: Option<String>,
    /// 1-based attempt number.
    pub attempt_count: i32,
    /// When the HTTP call was made.
    pub last_attempted_at: Timestamp,
}

impl WebhookDelivery {
    /// Returns whether the receiver answered with a 2xx status.
    pub fn is_success(&self) -> bool {
        self.response_status
            .is_some_and(|status| (200..300).contains(&status))
    }

    /// Returns whether the attempt failed before any response arrived.
    pub fn is_transport_failure(&self) -> bool {
        self.response_status.is_none()
    }

    /// Returns the envelope timestamp.
    pub fn event_timestamp(&self) -> jiff::Timestamp {
        self.event_timestamp.into()
    }

    /// Returns when the HTTP call was made.
    pub fn last_attempted_at(&self) -> jiff::Timestamp {
        self.last_attempted_at.into()
    }
}

impl NewWebhookDelivery {
    /// Creates an attempt record with no response recorded yet.
    pub fn new(
        webhook_id: Uuid,
        event_type: WebhookEvent,
        event_timestamp: jiff::Timestamp,
        payload: serde_json::Value,
        attempt_count: i32,
    ) -> Self {
        Self {
            webhook_id,
            event_type,
            event_timestamp: event_timestamp.into(),
            payload,
            response_status: None,
            response_body: None,
            error_message: None,
            attempt_count,
            last_attempted_at: jiff::Timestamp::now().into(),
        }
    }

    /// Records the status and body of a received response.
    pub fn with_response(mut self, status: u16, body: Option<String>) -> Self {
        self.response_status = Some(i32::from(status));
        self.response_body = body;
        self
    }

    /// Records a transport failure.
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    /// Overrides the attempt time.
    pub fn with_attempted_at(mut self, attempted_at: jiff::Timestamp) -> Self {
        self.last_attempted_at = attempted_at.into();
        self
    }
}
