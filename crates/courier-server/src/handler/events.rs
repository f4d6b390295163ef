//! Event fan-out trigger.

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::routing::post;
use courier_postgres::types::WebhookEvent;
use serde::{Deserialize, Serialize};

use crate::handler::Result;
use crate::service::{ServiceState, WebhookEmitter};

/// Body of `POST /events`.
#[derive(Debug, Deserialize)]
pub struct EmitEvent {
    pub event: WebhookEvent,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Number of deliveries queued for an event.
#[derive(Debug, Serialize)]
pub struct EventScheduled {
    pub scheduled: usize,
}

#[tracing::instrument(skip_all)]
async fn emit_event(
    State(emitter): State<WebhookEmitter>,
    request: Result<Json<EmitEvent>, JsonRejection>,
) -> Result<(StatusCode, Json<EventScheduled>)> {
    let Json(request) = request?;
    let scheduled = emitter.emit(request.event, request.data).await?;
    Ok((StatusCode::ACCEPTED, Json(EventScheduled { scheduled })))
}

/// Returns a [`Router`] with event routes.
pub fn routes() -> Router<ServiceState> {
    Router::new().route("/events", post(emit_event))
}
