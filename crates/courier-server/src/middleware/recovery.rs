//! Recovery middleware for handler panics and request timeouts.

use std::any::Any;
use std::time::Duration;

use axum::Router;
use axum::error_handling::HandleErrorLayer;
use axum::response::{IntoResponse, Response};
use tower::ServiceBuilder;
use tower::timeout::TimeoutLayer;
use tower::timeout::error::Elapsed;
use tower_http::catch_panic::CatchPanicLayer;

use crate::handler::Error;

/// Tracing target for error recovery.
const TRACING_TARGET: &str = "courier_server::middleware::recovery";

/// Extension trait for `axum::`[`Router`] to apply recovery middleware.
pub trait RouterRecoveryExt<S> {
    /// Converts panics and requests running longer than `request_timeout`
    /// into `500` JSON error responses.
    fn with_recovery(self, request_timeout: Duration) -> Self;
}

impl<S> RouterRecoveryExt<S> for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_recovery(self, request_timeout: Duration) -> Self {
        let middlewares = ServiceBuilder::new()
            .layer(HandleErrorLayer::new(handle_error))
            .layer(CatchPanicLayer::custom(catch_panic))
            .layer(TimeoutLayer::new(request_timeout));

        self.layer(middlewares)
    }
}

async fn handle_error(err: tower::BoxError) -> Response {
    if err.is::<Elapsed>() {
        tracing::error!(
            target: TRACING_TARGET,
            error = %err,
            "Request timeout exceeded"
        );
        return Error::internal("Request timeout").into_response();
    }

    tracing::error!(
        target: TRACING_TARGET,
        error = %err,
        "Unhandled middleware error"
    );
    Error::internal("Internal server error").into_response()
}

fn catch_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");

    tracing::error!(
        target: TRACING_TARGET,
        panic = message,
        "Handler panicked"
    );
    Error::internal("Internal server error").into_response()
}
