//! Single-attempt webhook delivery.
//!
//! A [`LogicalDelivery`] is one event addressed to one webhook. Every physical
//! HTTP call for it is a [`DeliveryRequest`] carrying the same timestamp and an
//! increasing attempt number; the [`Dispatcher`] performs exactly one such call
//! and records it in the ledger.

mod dispatcher;
mod outcome;

use courier_postgres::types::WebhookEvent;
use courier_webhook::truncate_to_millis;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use self::dispatcher::Dispatcher;
pub use self::outcome::DeliveryOutcome;

/// Tracing target for delivery operations.
pub const TRACING_TARGET: &str = "courier_server::service::delivery";

/// One event addressed to one webhook, across all of its attempts.
///
/// `(webhook_id, event, timestamp)` identifies the delivery; the timestamp is
/// kept at millisecond precision so it matches the one rendered in the envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicalDelivery {
    pub webhook_id: Uuid,
    pub event: WebhookEvent,
    pub data: serde_json::Value,
    pub timestamp: Timestamp,
}

impl LogicalDelivery {
    /// Creates a logical delivery stamped with the current time.
    pub fn new(webhook_id: Uuid, event: WebhookEvent, data: serde_json::Value) -> Self {
        Self::with_timestamp(webhook_id, event, data, Timestamp::now())
    }

    /// Creates a logical delivery for an existing event timestamp.
    pub fn with_timestamp(
        webhook_id: Uuid,
        event: WebhookEvent,
        data: serde_json::Value,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            webhook_id,
            event,
            data,
            timestamp: truncate_to_millis(timestamp),
        }
    }

    /// Returns the request for the given 1-based attempt.
    pub fn attempt(&self, attempt: u32) -> DeliveryRequest {
        DeliveryRequest {
            webhook_id: self.webhook_id,
            event: self.event,
            data: self.data.clone(),
            timestamp: self.timestamp,
            attempt: attempt.max(1),
        }
    }
}

/// One physical attempt of a [`LogicalDelivery`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryRequest {
    pub webhook_id: Uuid,
    pub event: WebhookEvent,
    pub data: serde_json::Value,
    pub timestamp: Timestamp,
    /// 1-based attempt number.
    pub attempt: u32,
}

impl DeliveryRequest {
    /// Returns the attempt number as stored in the ledger.
    pub fn attempt_count(&self) -> i32 {
        i32::try_from(self.attempt).unwrap_or(i32::MAX)
    }
}
