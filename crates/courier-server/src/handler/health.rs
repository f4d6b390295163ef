//! Liveness check.

use axum::Json;
use axum::Router;
use axum::routing::get;
use serde_json::{Value, json};

use crate::service::ServiceState;

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Returns a [`Router`] with the health route.
pub fn routes() -> Router<ServiceState> {
    Router::new().route("/health", get(health))
}
