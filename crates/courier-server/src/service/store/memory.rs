//! In-process registry and ledger.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use courier_postgres::model::{NewWebhook, NewWebhookDelivery, Webhook, WebhookDelivery};
use courier_postgres::types::WebhookEvent;
use jiff::Timestamp;
use uuid::Uuid;

use super::{DeliveryLedger, WebhookRegistry};
use crate::Result;

#[derive(Default)]
struct MemoryStoreInner {
    webhooks: RwLock<HashMap<Uuid, Webhook>>,
    deliveries: RwLock<Vec<WebhookDelivery>>,
}

/// Registry and ledger kept in memory.
///
/// Locks are never held across an `.await`, so the store can also be mutated
/// from synchronous test hooks while a delivery is in flight.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryStoreInner>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("deliveries", &self.deliveries().len())
            .finish_non_exhaustive()
    }
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a webhook, applying the same validation as the database.
    pub fn insert_webhook(&self, new_webhook: NewWebhook) -> Result<Webhook> {
        new_webhook.validate()?;

        let now = Timestamp::now();
        let webhook = Webhook {
            id: new_webhook.id.unwrap_or_else(Uuid::now_v7),
            name: new_webhook.name,
            url: new_webhook.url,
            events: new_webhook.events,
            is_active: new_webhook.is_active.unwrap_or(true),
            secret: new_webhook.secret,
            created_by: new_webhook.created_by,
            created_at: now.into(),
            updated_at: now.into(),
        };

        self.inner
            .webhooks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(webhook.id, webhook.clone());

        Ok(webhook)
    }

    /// Toggles a webhook's activation state; returns `false` if it does not exist.
    pub fn set_active(&self, webhook_id: Uuid, active: bool) -> bool {
        let mut webhooks = self
            .inner
            .webhooks
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        match webhooks.get_mut(&webhook_id) {
            Some(webhook) => {
                webhook.is_active = active;
                webhook.updated_at = Timestamp::now().into();
                true
            }
            None => false,
        }
    }

    /// Removes a webhook; returns whether it existed.
    pub fn remove_webhook(&self, webhook_id: Uuid) -> bool {
        self.inner
            .webhooks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&webhook_id)
            .is_some()
    }

    /// Returns every recorded attempt in insertion order.
    pub fn deliveries(&self) -> Vec<WebhookDelivery> {
        self.inner
            .deliveries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait::async_trait]
impl WebhookRegistry for MemoryStore {
    async fn find_active_webhooks_for_event(&self, event: WebhookEvent) -> Result<Vec<Webhook>> {
        let webhooks = self
            .inner
            .webhooks
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        Ok(webhooks
            .values()
            .filter(|webhook| webhook.accepts(event))
            .cloned()
            .collect())
    }

    async fn find_webhook(&self, webhook_id: Uuid) -> Result<Option<Webhook>> {
        let webhooks = self
            .inner
            .webhooks
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        Ok(webhooks.get(&webhook_id).cloned())
    }
}

#[async_trait::async_trait]
impl DeliveryLedger for MemoryStore {
    async fn record(&self, delivery: NewWebhookDelivery) -> Result<WebhookDelivery> {
        let record = WebhookDelivery {
            id: Uuid::now_v7(),
            webhook_id: delivery.webhook_id,
            event_type: delivery.event_type,
            event_timestamp: delivery.event_timestamp,
            payload: delivery.payload,
            response_status: delivery.response_status,
            response_body: delivery.response_body,
            error_message: delivery.error_message,
            attempt_count: delivery.attempt_count,
            last_attempted_at: delivery.last_attempted_at,
            created_at: Timestamp::now().into(),
        };

        self.inner
            .deliveries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());

        Ok(record)
    }

    async fn list_attempts(
        &self,
        webhook_id: Uuid,
        event: Option<WebhookEvent>,
    ) -> Result<Vec<WebhookDelivery>> {
        let mut attempts: Vec<_> = self
            .deliveries()
            .into_iter()
            .filter(|d| d.webhook_id == webhook_id)
            .filter(|d| event.is_none_or(|event| d.event_type == event))
            .collect();

        attempts.sort_by_key(|d| (d.last_attempted_at(), d.attempt_count));
        Ok(attempts)
    }

    async fn list_logical_attempts(
        &self,
        webhook_id: Uuid,
        event: WebhookEvent,
        event_timestamp: Timestamp,
    ) -> Result<Vec<WebhookDelivery>> {
        let mut attempts: Vec<_> = self
            .deliveries()
            .into_iter()
            .filter(|d| {
                d.webhook_id == webhook_id
                    && d.event_type == event
                    && d.event_timestamp() == event_timestamp
            })
            .collect();

        attempts.sort_by_key(|d| d.attempt_count);
        Ok(attempts)
    }
}
