use courier_postgres::PgClient;
use courier_postgres::model::{NewWebhookDelivery, Webhook, WebhookDelivery};
use courier_postgres::query::{WebhookDeliveryRepository, WebhookRepository};
use courier_postgres::types::WebhookEvent;
use jiff::Timestamp;
use uuid::Uuid;

use super::{DeliveryLedger, WebhookRegistry};
use crate::Result;

#[async_trait::async_trait]
impl WebhookRegistry for PgClient {
    async fn find_active_webhooks_for_event(&self, event: WebhookEvent) -> Result<Vec<Webhook>> {
        let mut conn = self.get_connection().await?;
        Ok(conn.find_active_webhooks_for_event(event).await?)
    }

    async fn find_webhook(&self, webhook_id: Uuid) -> Result<Option<Webhook>> {
        let mut conn = self.get_connection().await?;
        Ok(conn.find_webhook_by_id(webhook_id).await?)
    }
}

#[async_trait::async_trait]
impl DeliveryLedger for PgClient {
    async fn record(&self, delivery: NewWebhookDelivery) -> Result<WebhookDelivery> {
        let mut conn = self.get_connection().await?;
        Ok(conn.create_webhook_delivery(delivery).await?)
    }

    async fn list_attempts(
        &self,
        webhook_id: Uuid,
        event: Option<WebhookEvent>,
    ) -> Result<Vec<WebhookDelivery>> {
        let mut conn = self.get_connection().await?;
        Ok(conn.list_webhook_deliveries(webhook_id, event).await?)
    }

    async fn list_logical_attempts(
        &self,
        webhook_id: Uuid,
        event: WebhookEvent,
        event_timestamp: Timestamp,
    ) -> Result<Vec<WebhookDelivery>> {
        let mut conn = self.get_connection().await?;
        Ok(conn
            .list_logical_deliveries(webhook_id, event, event_timestamp)
            .await?)
    }
}
