//! Fan-out of domain events to every subscribed webhook.

use std::sync::Arc;

use courier_postgres::types::WebhookEvent;

use crate::Result;
use crate::service::delivery::LogicalDelivery;
use crate::service::store::WebhookRegistry;
use crate::worker::RetryScheduler;

/// Tracing target for webhook event emission.
const TRACING_TARGET: &str = "courier_server::service::emitter";

/// Publishes domain events as scheduled webhook deliveries.
///
/// Emission only resolves subscribers and queues one chain per webhook; the
/// HTTP calls happen on the retry worker and never fail the producer.
#[derive(Clone)]
pub struct WebhookEmitter {
    registry: Arc<dyn WebhookRegistry>,
    scheduler: RetryScheduler,
}

impl std::fmt::Debug for WebhookEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookEmitter")
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

impl WebhookEmitter {
    /// Creates a new webhook emitter.
    pub fn new(registry: Arc<dyn WebhookRegistry>, scheduler: RetryScheduler) -> Self {
        Self {
            registry,
            scheduler,
        }
    }

    /// Schedules `event` for every active subscriber and returns how many
    /// deliveries were queued.
    ///
    /// Webhooks with an unusable endpoint are skipped with a warning.
    #[tracing::instrument(skip(self, data), fields(event = %event))]
    pub async fn emit(&self, event: WebhookEvent, data: serde_json::Value) -> Result<usize> {
        let webhooks = self.registry.find_active_webhooks_for_event(event).await?;

        if webhooks.is_empty() {
            tracing::debug!(
                target: TRACING_TARGET,
                "No webhooks subscribed to event"
            );
            return Ok(0);
        }

        let mut scheduled = 0;
        for webhook in webhooks {
            if let Err(err) = webhook.endpoint() {
                tracing::warn!(
                    target: TRACING_TARGET,
                    webhook_id = %webhook.id,
                    url = %webhook.url,
                    error = %err,
                    "Skipping webhook with invalid URL"
                );
                continue;
            }

            self.scheduler
                .schedule(LogicalDelivery::new(webhook.id, event, data.clone()))?;
            scheduled += 1;
        }

        tracing::info!(
            target: TRACING_TARGET,
            scheduled,
            "Scheduled webhook deliveries"
        );

        Ok(scheduled)
    }

    /// Emits a ticket created event.
    #[inline]
    pub async fn emit_ticket_created(&self, data: serde_json::Value) -> Result<usize> {
        self.emit(WebhookEvent::TicketCreated, data).await
    }

    /// Emits a ticket updated event.
    #[inline]
    pub async fn emit_ticket_updated(&self, data: serde_json::Value) -> Result<usize> {
        self.emit(WebhookEvent::TicketUpdated, data).await
    }

    /// Emits a ticket deleted event.
    #[inline]
    pub async fn emit_ticket_deleted(&self, data: serde_json::Value) -> Result<usize> {
        self.emit(WebhookEvent::TicketDeleted, data).await
    }

    /// Emits a ticket message created event.
    #[inline]
    pub async fn emit_ticket_message_created(&self, data: serde_json::Value) -> Result<usize> {
        self.emit(WebhookEvent::TicketMessageCreated, data).await
    }

    /// Emits a team created event.
    #[inline]
    pub async fn emit_team_created(&self, data: serde_json::Value) -> Result<usize> {
        self.emit(WebhookEvent::TeamCreated, data).await
    }

    /// Emits a team updated event.
    #[inline]
    pub async fn emit_team_updated(&self, data: serde_json::Value) -> Result<usize> {
        self.emit(WebhookEvent::TeamUpdated, data).await
    }

    /// Emits a team member added event.
    #[inline]
    pub async fn emit_team_member_added(&self, data: serde_json::Value) -> Result<usize> {
        self.emit(WebhookEvent::TeamMemberAdded, data).await
    }

    /// Emits a team member removed event.
    #[inline]
    pub async fn emit_team_member_removed(&self, data: serde_json::Value) -> Result<usize> {
        self.emit(WebhookEvent::TeamMemberRemoved, data).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use courier_postgres::model::NewWebhook;
    use courier_webhook::mock::ScriptedProvider;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::service::delivery::Dispatcher;
    use crate::service::store::MemoryStore;
    use crate::worker::RetryConfig;

    #[tokio::test]
    async fn test_emit_schedules_one_delivery_per_subscriber() {
        let store = MemoryStore::new();
        for (name, events, active) in [
            ("a", vec![WebhookEvent::TicketCreated], true),
            ("b", vec![WebhookEvent::TicketCreated, WebhookEvent::TeamCreated], true),
            ("c", vec![WebhookEvent::TeamCreated], true),
            ("d", vec![WebhookEvent::TicketCreated], false),
        ] {
            store
                .insert_webhook(
                    NewWebhook::new(name, "https://example.com/hooks", "secret", events)
                        .with_active(active),
                )
                .unwrap();
        }

        let provider = ScriptedProvider::default();
        let dispatcher = Dispatcher::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            provider.clone().into_service(),
        );
        let (scheduler, worker) = RetryScheduler::new(dispatcher, RetryConfig::default());
        let emitter = WebhookEmitter::new(Arc::new(store.clone()), scheduler);

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(worker.run(cancel.clone()));

        let scheduled = emitter
            .emit_ticket_created(json!({"ticket": "T-1"}))
            .await
            .unwrap();
        assert_eq!(scheduled, 2);

        let nothing = emitter.emit_team_member_added(json!({})).await.unwrap();
        assert_eq!(nothing, 0);

        let delivered = async {
            while store.deliveries().len() < 2 {
                tokio::task::yield_now().await;
            }
        };
        tokio::time::timeout(Duration::from_secs(5), delivered)
            .await
            .unwrap();

        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(provider.delivered(), 2);
    }
}
