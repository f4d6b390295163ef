//! Performs one signed HTTP attempt and records it.

use std::sync::Arc;

use courier_postgres::model::NewWebhookDelivery;
use courier_postgres::types::WebhookEvent;
use courier_webhook::{WebhookEnvelope, WebhookRequest, WebhookService};
use uuid::Uuid;

use super::{DeliveryOutcome, DeliveryRequest, LogicalDelivery, TRACING_TARGET};
use crate::service::store::{DeliveryLedger, WebhookRegistry};
use crate::{Error, Result};

/// Delivers single attempts to registered webhooks.
///
/// Every attempt that reaches the network writes exactly one ledger row. A
/// missing webhook, an inactive webhook and a signing failure write nothing
/// and make no HTTP call.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<dyn WebhookRegistry>,
    ledger: Arc<dyn DeliveryLedger>,
    webhook: WebhookService,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("webhook", &self.webhook)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Creates a new dispatcher.
    pub fn new(
        registry: Arc<dyn WebhookRegistry>,
        ledger: Arc<dyn DeliveryLedger>,
        webhook: WebhookService,
    ) -> Self {
        Self {
            registry,
            ledger,
            webhook,
        }
    }

    /// Makes the first attempt of a new logical delivery, stamped now.
    pub async fn deliver(
        &self,
        webhook_id: Uuid,
        event: WebhookEvent,
        data: serde_json::Value,
    ) -> Result<DeliveryOutcome> {
        let delivery = LogicalDelivery::new(webhook_id, event, data);
        self.dispatch(&delivery.attempt(1)).await
    }

    /// Makes one attempt of an existing logical delivery.
    ///
    /// # Errors
    ///
    /// Returns a `NotFound` error when the webhook does not exist and a
    /// `Config` error when its endpoint or secret cannot be used. Registry and
    /// ledger failures are returned as they are; a ledger failure means the
    /// HTTP call was made but not recorded.
    #[tracing::instrument(
        skip_all,
        fields(
            webhook_id = %request.webhook_id,
            event = %request.event,
            attempt = request.attempt,
        )
    )]
    pub async fn dispatch(&self, request: &DeliveryRequest) -> Result<DeliveryOutcome> {
        let Some(webhook) = self.registry.find_webhook(request.webhook_id).await? else {
            tracing::error!(target: TRACING_TARGET, "Webhook not found");
            return Err(Error::not_found("Webhook not found"));
        };

        if !webhook.is_active {
            tracing::debug!(target: TRACING_TARGET, "Webhook is inactive, skipping");
            return Ok(DeliveryOutcome::Inactive);
        }

        let endpoint = webhook.endpoint().map_err(|err| {
            tracing::error!(
                target: TRACING_TARGET,
                url = %webhook.url,
                error = %err,
                "Webhook has an unusable endpoint"
            );
            Error::from(err)
        })?;

        let envelope = WebhookEnvelope::new(
            request.event.as_str(),
            request.data.clone(),
            request.timestamp,
        );
        let payload = envelope.to_value()?;
        let webhook_request =
            WebhookRequest::signed(webhook.id, endpoint, &envelope, webhook.secret_bytes())
                .map_err(|err| {
                    tracing::error!(
                        target: TRACING_TARGET,
                        error = %err,
                        "Failed to sign webhook payload"
                    );
                    Error::from(err)
                })?;

        let response = self.webhook.deliver(&webhook_request).await?;
        let outcome = DeliveryOutcome::from_response(&response);

        let mut attempt = NewWebhookDelivery::new(
            webhook.id,
            request.event,
            request.timestamp,
            payload,
            request.attempt_count(),
        )
        .with_attempted_at(response.started_at);

        attempt = match (response.status_code, response.error) {
            (Some(status), _) => attempt.with_response(status, response.body),
            (None, error) => {
                attempt.with_error(error.unwrap_or_else(|| "Webhook delivery failed".to_owned()))
            }
        };

        if let Err(err) = self.ledger.record(attempt).await {
            tracing::error!(
                target: TRACING_TARGET,
                error = %err,
                status_code = ?outcome.status(),
                "Failed to record delivery attempt"
            );
            return Err(err);
        }

        tracing::info!(
            target: TRACING_TARGET,
            status_code = ?outcome.status(),
            retryable = outcome.is_retryable(),
            "Delivery attempt recorded"
        );

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use courier_postgres::model::{NewWebhook, Webhook};
    use courier_webhook::mock::{Scripted, ScriptedProvider};
    use courier_webhook::reqwest::{ReqwestClient, ReqwestConfig};
    use courier_webhook::signature;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::ErrorKind;
    use crate::service::store::MemoryStore;

    fn dispatcher(store: &MemoryStore, webhook: WebhookService) -> Dispatcher {
        Dispatcher::new(Arc::new(store.clone()), Arc::new(store.clone()), webhook)
    }

    fn register(store: &MemoryStore, url: &str) -> Webhook {
        store
            .insert_webhook(NewWebhook::new(
                "crm",
                url,
                "testsecret",
                [WebhookEvent::TicketCreated],
            ))
            .unwrap()
    }

    /// Registry that returns a fixed webhook without validating it.
    struct FixedRegistry(Webhook);

    #[async_trait::async_trait]
    impl WebhookRegistry for FixedRegistry {
        async fn find_active_webhooks_for_event(&self, _: WebhookEvent) -> Result<Vec<Webhook>> {
            Ok(vec![self.0.clone()])
        }

        async fn find_webhook(&self, _: Uuid) -> Result<Option<Webhook>> {
            Ok(Some(self.0.clone()))
        }
    }

    #[tokio::test]
    async fn test_inactive_webhook_is_skipped() {
        let store = MemoryStore::new();
        let webhook = register(&store, "https://example.com/hooks");
        store.set_active(webhook.id, false);

        let provider = ScriptedProvider::default();
        let dispatcher = dispatcher(&store, provider.clone().into_service());

        let outcome = dispatcher
            .deliver(webhook.id, WebhookEvent::TicketCreated, json!({}))
            .await
            .unwrap();

        assert_eq!(outcome, DeliveryOutcome::Inactive);
        assert_eq!(provider.delivered(), 0);
        assert!(store.deliveries().is_empty());
    }

    #[tokio::test]
    async fn test_missing_webhook_is_not_found() {
        let store = MemoryStore::new();
        let provider = ScriptedProvider::default();
        let dispatcher = dispatcher(&store, provider.clone().into_service());

        let err = dispatcher
            .deliver(Uuid::now_v7(), WebhookEvent::TicketCreated, json!({}))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.message(), "Webhook not found");
        assert_eq!(provider.delivered(), 0);
        assert!(store.deliveries().is_empty());
    }

    #[tokio::test]
    async fn test_each_attempt_writes_one_row() {
        let store = MemoryStore::new();
        let webhook = register(&store, "https://example.com/hooks");
        let provider = ScriptedProvider::new([
            Scripted::status(200),
            Scripted::Status(500, Some("internal".into())),
            Scripted::transport_error("Connection failed"),
        ]);
        let dispatcher = dispatcher(&store, provider.clone().into_service());

        let delivered = dispatcher
            .deliver(webhook.id, WebhookEvent::TicketCreated, json!({"id": 1}))
            .await
            .unwrap();
        assert_eq!(delivered, DeliveryOutcome::Delivered { status: 200 });
        assert_eq!(store.deliveries().len(), 1);

        let rejected = dispatcher
            .deliver(webhook.id, WebhookEvent::TicketCreated, json!({"id": 2}))
            .await
            .unwrap();
        assert!(rejected.success());
        assert_eq!(rejected.status(), Some(500));
        assert_eq!(store.deliveries().len(), 2);

        let failed = dispatcher
            .deliver(webhook.id, WebhookEvent::TicketCreated, json!({"id": 3}))
            .await
            .unwrap();
        assert!(!failed.success());

        let rows = store.deliveries();
        assert_eq!(rows.len(), 3);
        assert_eq!(provider.delivered(), 3);

        assert_eq!(rows[0].response_status, Some(200));
        assert_eq!(rows[1].response_status, Some(500));
        assert_eq!(rows[1].response_body.as_deref(), Some("internal"));
        assert_eq!(rows[2].response_status, None);
        assert_eq!(rows[2].error_message.as_deref(), Some("Connection failed"));
        assert!(rows.iter().all(|row| row.attempt_count == 1));
    }

    #[tokio::test]
    async fn test_retry_attempt_keeps_logical_identity() {
        let store = MemoryStore::new();
        let webhook = register(&store, "https://example.com/hooks");
        let provider = ScriptedProvider::default();
        let dispatcher = dispatcher(&store, provider.clone().into_service());

        let delivery =
            LogicalDelivery::new(webhook.id, WebhookEvent::TicketCreated, json!({"id": 7}));
        dispatcher.dispatch(&delivery.attempt(1)).await.unwrap();
        dispatcher.dispatch(&delivery.attempt(2)).await.unwrap();

        let rows = store
            .list_logical_attempts(webhook.id, WebhookEvent::TicketCreated, delivery.timestamp)
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].attempt_count, 2);

        let requests = provider.requests();
        assert_eq!(requests[0].timestamp, requests[1].timestamp);
        assert_eq!(requests[0].body, requests[1].body);

        let envelope = requests[0].envelope().unwrap();
        assert_eq!(envelope.event, "ticket.created");
        assert_eq!(envelope.data, json!({"id": 7}));
        assert_eq!(rows[0].payload, envelope.to_value().unwrap());
    }

    #[tokio::test]
    async fn test_empty_secret_is_a_configuration_error() {
        let store = MemoryStore::new();
        let mut webhook = register(&store, "https://example.com/hooks");
        webhook.secret = String::new();

        let provider = ScriptedProvider::default();
        let dispatcher = Dispatcher::new(
            Arc::new(FixedRegistry(webhook.clone())),
            Arc::new(store.clone()),
            provider.clone().into_service(),
        );

        let err = dispatcher
            .deliver(webhook.id, WebhookEvent::TicketCreated, json!({}))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Config);
        assert_eq!(provider.delivered(), 0);
        assert!(store.deliveries().is_empty());
    }

    #[tokio::test]
    async fn test_receiver_can_verify_signature() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hooks"))
            .and(header("x-webhook-event", "ticket.created"))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let store = MemoryStore::new();
        let webhook = register(&store, &format!("{}/hooks", server.uri()));
        let client = ReqwestClient::new(ReqwestConfig::default()).unwrap();
        let dispatcher = dispatcher(&store, client.into_service());

        let outcome = dispatcher
            .deliver(webhook.id, WebhookEvent::TicketCreated, json!({"ticket": "T-1"}))
            .await
            .unwrap();
        assert_eq!(outcome, DeliveryOutcome::Delivered { status: 202 });

        let received = server.received_requests().await.unwrap();
        let request = &received[0];
        let signature_header = request
            .headers
            .get("x-webhook-signature")
            .and_then(|v| v.to_str().ok())
            .unwrap();
        assert!(signature::verify(b"testsecret", &request.body, signature_header));

        let webhook_id = request
            .headers
            .get("x-webhook-id")
            .and_then(|v| v.to_str().ok())
            .unwrap();
        assert_eq!(webhook_id, webhook.id.to_string());

        let rows = store.deliveries();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].response_status, Some(202));
    }

    #[tokio::test]
    async fn test_redirect_is_a_receiver_error() {
        let server = MockServer::start().await;
        let landing = format!("{}/landing", server.uri());
        Mock::given(path("/hooks"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", landing.as_str()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(path("/landing"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let store = MemoryStore::new();
        let webhook = register(&store, &format!("{}/hooks", server.uri()));
        let client = ReqwestClient::new(ReqwestConfig::default()).unwrap();
        let dispatcher = dispatcher(&store, client.into_service());

        let outcome = dispatcher
            .deliver(webhook.id, WebhookEvent::TicketCreated, json!({}))
            .await
            .unwrap();
        assert_eq!(outcome.status(), Some(302));
        assert!(outcome.is_retryable());

        let rows = store.deliveries();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].response_status, Some(302));
    }

    #[tokio::test]
    async fn test_non_standard_status_is_recorded() {
        let store = MemoryStore::new();
        let webhook = register(&store, "https://example.com/hooks");
        let provider = ScriptedProvider::new([Scripted::Status(999, Some("denied".into()))]);
        let dispatcher = dispatcher(&store, provider.into_service());

        let outcome = dispatcher
            .deliver(webhook.id, WebhookEvent::TicketCreated, json!({}))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            DeliveryOutcome::ReceiverError {
                status: 999,
                body: Some("denied".into()),
            }
        );

        let rows = store.deliveries();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].response_status, Some(999));
    }
}
