//! Webhook repository for registry operations.

use std::future::Future;

use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use uuid::Uuid;

use crate::model::{NewWebhook, UpdateWebhook, Webhook};
use crate::types::WebhookEvent;
use crate::{PgConnection, PgError, PgResult, TRACING_TARGET_QUERY, schema};

/// Repository for webhook database operations.
///
/// Delivery only uses the read operations; the write operations exist for
/// operators and tests that populate the registry. Webhooks are retired with
/// [`set_webhook_active`](Self::set_webhook_active), never deleted, so their
/// delivery history is kept.
pub trait WebhookRepository {
    /// Registers a new webhook after validating it.
    fn create_webhook(
        &mut self,
        new_webhook: NewWebhook,
    ) -> impl Future<Output = PgResult<Webhook>> + Send;

    /// Finds a webhook by ID, regardless of its activation state.
    fn find_webhook_by_id(
        &mut self,
        webhook_id: Uuid,
    ) -> impl Future<Output = PgResult<Option<Webhook>>> + Send;

    /// Finds active webhooks subscribed to a specific event.
    fn find_active_webhooks_for_event(
        &mut self,
        event: WebhookEvent,
    ) -> impl Future<Output = PgResult<Vec<Webhook>>> + Send;

    /// Lists all webhooks, newest first.
    fn list_webhooks(&mut self) -> impl Future<Output = PgResult<Vec<Webhook>>> + Send;

    /// Updates a webhook, returning `None` if it does not exist.
    fn update_webhook(
        &mut self,
        webhook_id: Uuid,
        changes: UpdateWebhook,
    ) -> impl Future<Output = PgResult<Option<Webhook>>> + Send;

    /// Activates or deactivates a webhook, returning `None` if it does not exist.
    fn set_webhook_active(
        &mut self,
        webhook_id: Uuid,
        active: bool,
    ) -> impl Future<Output = PgResult<Option<Webhook>>> + Send;
}

impl WebhookRepository for PgConnection {
    #[tracing::instrument(skip_all, target = TRACING_TARGET_QUERY, fields(name = %new_webhook.name))]
    async fn create_webhook(&mut self, new_webhook: NewWebhook) -> PgResult<Webhook> {
        use schema::webhooks;

        new_webhook.validate()?;

        let webhook = diesel::insert_into(webhooks::table)
            .values(&new_webhook)
            .returning(Webhook::as_returning())
            .get_result(self)
            .await
            .map_err(PgError::from)?;

        tracing::info!(
            target: TRACING_TARGET_QUERY,
            webhook_id = %webhook.id,
            "Webhook registered"
        );

        Ok(webhook)
    }

    async fn find_webhook_by_id(&mut self, webhook_id: Uuid) -> PgResult<Option<Webhook>> {
        use schema::webhooks::dsl::*;

        let webhook = webhooks
            .filter(id.eq(webhook_id))
            .select(Webhook::as_select())
            .first(self)
            .await
            .optional()
            .map_err(PgError::from)?;

        Ok(webhook)
    }

    async fn find_active_webhooks_for_event(
        &mut self,
        event: WebhookEvent,
    ) -> PgResult<Vec<Webhook>> {
        use schema::webhooks::dsl::*;

        let found = webhooks
            .filter(is_active.eq(true))
            .filter(events.contains(vec![Some(event)]))
            .select(Webhook::as_select())
            .load(self)
            .await
            .map_err(PgError::from)?;

        Ok(found)
    }

    async fn list_webhooks(&mut self) -> PgResult<Vec<Webhook>> {
        use schema::webhooks::dsl::*;

        let found = webhooks
            .select(Webhook::as_select())
            .order(created_at.desc())
            .load(self)
            .await
            .map_err(PgError::from)?;

        Ok(found)
    }

    #[tracing::instrument(skip(self, changes), target = TRACING_TARGET_QUERY)]
    async fn update_webhook(
        &mut self,
        webhook_id: Uuid,
        changes: UpdateWebhook,
    ) -> PgResult<Option<Webhook>> {
        use schema::webhooks::dsl::*;

        changes.validate()?;

        let webhook = diesel::update(webhooks)
            .filter(id.eq(webhook_id))
            .set(&changes)
            .returning(Webhook::as_returning())
            .get_result(self)
            .await
            .optional()
            .map_err(PgError::from)?;

        Ok(webhook)
    }

    #[tracing::instrument(skip(self), target = TRACING_TARGET_QUERY)]
    async fn set_webhook_active(
        &mut self,
        webhook_id: Uuid,
        active: bool,
    ) -> PgResult<Option<Webhook>> {
        use schema::webhooks::dsl::*;

        let webhook = diesel::update(webhooks)
            .filter(id.eq(webhook_id))
            .set(is_active.eq(active))
            .returning(Webhook::as_returning())
            .get_result(self)
            .await
            .optional()
            .map_err(PgError::from)?;

        Ok(webhook)
    }
}
