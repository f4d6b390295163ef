//! All `axum::`[`Router`]s with related `axum::`[`Handler`]s.
//!
//! # Usage Example
//!
//! ```rust,ignore
//! use courier_server::handler::routes;
//! use courier_server::service::{ServiceConfig, ServiceState};
//!
//! let (state, worker) = ServiceState::from_config(&config, webhook).await?;
//! let router = routes(state);
//! ```
//!
//! [`Router`]: axum::routing::Router
//! [`Handler`]: axum::handler::Handler

mod deliveries;
mod error;
mod events;
mod health;

use axum::Router;
use tower_http::trace::TraceLayer;

pub use crate::handler::deliveries::{CreateDelivery, DeliveryAttempt, ListDeliveries};
pub use crate::handler::error::{Error, Result};
pub use crate::handler::events::{EmitEvent, EventScheduled};
use crate::service::ServiceState;

/// Returns a [`Router`] with every route, bound to `state`.
pub fn routes(state: ServiceState) -> Router {
    Router::new()
        .merge(deliveries::routes())
        .merge(events::routes())
        .merge(health::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
