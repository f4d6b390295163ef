//! Direct delivery trigger and the ledger audit view.

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use courier_postgres::model::WebhookDelivery;
use courier_postgres::types::WebhookEvent;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::handler::{Error, Result};
use crate::service::{
    DeliveryLedger, DeliveryOutcome, Dispatcher, LogicalDelivery, ServiceState, WebhookRegistry,
};
use crate::worker::RetryScheduler;

/// Tracing target for delivery handlers.
const TRACING_TARGET: &str = "courier_server::handler::deliveries";

/// Body of `POST /deliveries`.
#[derive(Debug, Deserialize)]
pub struct CreateDelivery {
    pub webhook_id: Uuid,
    pub event: WebhookEvent,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Query of `GET /webhooks/{webhook_id}/deliveries`.
#[derive(Debug, Default, Deserialize)]
pub struct ListDeliveries {
    pub event: Option<WebhookEvent>,
}

/// One recorded attempt.
#[derive(Debug, Serialize)]
pub struct DeliveryAttempt {
    pub id: Uuid,
    pub webhook_id: Uuid,
    pub event_type: WebhookEvent,
    pub event_timestamp: Timestamp,
    pub payload: serde_json::Value,
    pub response_status: Option<i32>,
    pub response_body: Option<String>,
    pub error_message: Option<String>,
    pub attempt_count: i32,
    pub last_attempted_at: Timestamp,
}

impl From<WebhookDelivery> for DeliveryAttempt {
    fn from(delivery: WebhookDelivery) -> Self {
        Self {
            id: delivery.id,
            webhook_id: delivery.webhook_id,
            event_type: delivery.event_type,
            event_timestamp: delivery.event_timestamp(),
            last_attempted_at: delivery.last_attempted_at(),
            payload: delivery.payload,
            response_status: delivery.response_status,
            response_body: delivery.response_body,
            error_message: delivery.error_message,
            attempt_count: delivery.attempt_count,
        }
    }
}

/// Makes the first attempt synchronously and hands failures to the scheduler.
#[tracing::instrument(skip_all)]
async fn create_delivery(
    State(dispatcher): State<Dispatcher>,
    State(scheduler): State<RetryScheduler>,
    request: Result<Json<CreateDelivery>, JsonRejection>,
) -> Result<Response> {
    let Json(request) = request?;

    tracing::debug!(
        target: TRACING_TARGET,
        webhook_id = %request.webhook_id,
        event = %request.event,
        "Delivering webhook"
    );

    let delivery = LogicalDelivery::new(request.webhook_id, request.event, request.data);
    let outcome = dispatcher.dispatch(&delivery.attempt(1)).await?;

    if outcome.is_retryable()
        && let Err(err) = scheduler.resume(delivery, 1)
    {
        tracing::warn!(
            target: TRACING_TARGET,
            error = %err,
            "Failed to schedule redelivery"
        );
    }

    let response = match outcome {
        DeliveryOutcome::Inactive => {
            (StatusCode::OK, Json(json!({ "message": "Webhook is inactive" }))).into_response()
        }
        DeliveryOutcome::Delivered { status } | DeliveryOutcome::ReceiverError { status, .. } => {
            (StatusCode::OK, Json(json!({ "success": true, "status": status }))).into_response()
        }
        DeliveryOutcome::TransportError { .. } => {
            Error::internal("Webhook delivery failed").into_response()
        }
    };

    Ok(response)
}

/// Lists recorded attempts for a webhook, oldest first.
#[tracing::instrument(skip_all, fields(webhook_id = %webhook_id))]
async fn list_deliveries(
    State(registry): State<Arc<dyn WebhookRegistry>>,
    State(ledger): State<Arc<dyn DeliveryLedger>>,
    Path(webhook_id): Path<Uuid>,
    Query(query): Query<ListDeliveries>,
) -> Result<Json<Vec<DeliveryAttempt>>> {
    if registry.find_webhook(webhook_id).await?.is_none() {
        return Err(crate::Error::not_found("Webhook not found").into());
    }

    let attempts = ledger.list_attempts(webhook_id, query.event).await?;

    tracing::debug!(
        target: TRACING_TARGET,
        count = attempts.len(),
        "Listed delivery attempts"
    );

    Ok(Json(attempts.into_iter().map(Into::into).collect()))
}

/// Returns a [`Router`] with delivery routes.
pub fn routes() -> Router<ServiceState> {
    Router::new()
        .route("/deliveries", post(create_delivery))
        .route("/webhooks/{webhook_id}/deliveries", get(list_deliveries))
}
