//! Registry and ledger seams used by delivery.
//!
//! The dispatcher and scheduler only see these traits. [`PgClient`] implements
//! both on top of the Postgres repositories; [`MemoryStore`] keeps everything
//! in process for tests.
//!
//! [`PgClient`]: courier_postgres::PgClient

#[cfg(any(test, feature = "test-utils"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-utils")))]
mod memory;
mod postgres;

use courier_postgres::model::{NewWebhookDelivery, Webhook, WebhookDelivery};
use courier_postgres::types::WebhookEvent;
use jiff::Timestamp;
#[cfg(any(test, feature = "test-utils"))]
pub use memory::MemoryStore;
use uuid::Uuid;

use crate::Result;

/// Read access to registered webhooks.
#[async_trait::async_trait]
pub trait WebhookRegistry: Send + Sync {
    /// Returns the active webhooks subscribed to `event`, in no particular order.
    async fn find_active_webhooks_for_event(&self, event: WebhookEvent) -> Result<Vec<Webhook>>;

    /// Returns the webhook with `webhook_id` whatever its activation state.
    async fn find_webhook(&self, webhook_id: Uuid) -> Result<Option<Webhook>>;
}

/// Append-only record of delivery attempts.
#[async_trait::async_trait]
pub trait DeliveryLedger: Send + Sync {
    /// Appends one attempt.
    async fn record(&self, delivery: NewWebhookDelivery) -> Result<WebhookDelivery>;

    /// Lists attempts for a webhook ordered by attempt time, then attempt number.
    async fn list_attempts(
        &self,
        webhook_id: Uuid,
        event: Option<WebhookEvent>,
    ) -> Result<Vec<WebhookDelivery>>;

    /// Lists the attempts of one logical delivery in attempt order.
    async fn list_logical_attempts(
        &self,
        webhook_id: Uuid,
        event: WebhookEvent,
        event_timestamp: Timestamp,
    ) -> Result<Vec<WebhookDelivery>>;
}
