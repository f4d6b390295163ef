//! Webhook delivery repository for the append-only delivery ledger.

use std::future::Future;

use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use uuid::Uuid;

use crate::model::{NewWebhookDelivery, WebhookDelivery};
use crate::types::WebhookEvent;
use crate::{PgConnection, PgError, PgResult, TRACING_TARGET_QUERY, schema};

/// Repository for webhook delivery attempts.
///
/// Attempts are insert-only; rows are never updated or deleted.
pub trait WebhookDeliveryRepository {
    /// Records one delivery attempt.
    fn create_webhook_delivery(
        &mut self,
        new_delivery: NewWebhookDelivery,
    ) -> impl Future<Output = PgResult<WebhookDelivery>> + Send;

    /// Lists the attempts made for a webhook, optionally narrowed to one event type.
    ///
    /// Rows are ordered by attempt time, then attempt number.
    fn list_webhook_deliveries(
        &mut self,
        webhook_id: Uuid,
        event: Option<WebhookEvent>,
    ) -> impl Future<Output = PgResult<Vec<WebhookDelivery>>> + Send;

    /// Lists the attempts of one logical delivery in attempt order.
    fn list_logical_deliveries(
        &mut self,
        webhook_id: Uuid,
        event: WebhookEvent,
        event_timestamp: jiff::Timestamp,
    ) -> impl Future<Output = PgResult<Vec<WebhookDelivery>>> + Send;
}

impl WebhookDeliveryRepository for PgConnection {
    #[tracing::instrument(
        skip_all,
        target = TRACING_TARGET_QUERY,
        fields(
            webhook_id = %new_delivery.webhook_id,
            attempt = new_delivery.attempt_count,
        )
    )]
    async fn create_webhook_delivery(
        &mut self,
        new_delivery: NewWebhookDelivery,
    ) -> PgResult<WebhookDelivery> {
        use schema::webhook_deliveries;

        let delivery = diesel::insert_into(webhook_deliveries::table)
            .values(&new_delivery)
            .returning(WebhookDelivery::as_returning())
            .get_result(self)
            .await
            .map_err(PgError::from)?;

        tracing::debug!(
            target: TRACING_TARGET_QUERY,
            delivery_id = %delivery.id,
            "Delivery attempt recorded"
        );

        Ok(delivery)
    }

    async fn list_webhook_deliveries(
        &mut self,
        hook_id: Uuid,
        event: Option<WebhookEvent>,
    ) -> PgResult<Vec<WebhookDelivery>> {
        use schema::webhook_deliveries::dsl::*;

        let mut query = webhook_deliveries
            .filter(webhook_id.eq(hook_id))
            .select(WebhookDelivery::as_select())
            .into_boxed();

        if let Some(event) = event {
            query = query.filter(event_type.eq(event));
        }

        let deliveries = query
            .order((last_attempted_at.asc(), attempt_count.asc()))
            .load(self)
            .await
            .map_err(PgError::from)?;

        Ok(deliveries)
    }

    async fn list_logical_deliveries(
        &mut self,
        hook_id: Uuid,
        event: WebhookEvent,
        timestamp: jiff::Timestamp,
    ) -> PgResult<Vec<WebhookDelivery>> {
        use schema::webhook_deliveries::dsl::*;

        let deliveries = webhook_deliveries
            .filter(webhook_id.eq(hook_id))
            .filter(event_type.eq(event))
            .filter(event_timestamp.eq(jiff_diesel::Timestamp::from(timestamp)))
            .select(WebhookDelivery::as_select())
            .order(attempt_count.asc())
            .load(self)
            .await
            .map_err(PgError::from)?;

        Ok(deliveries)
    }
}
