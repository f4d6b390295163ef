//! HTTP server startup and lifecycle management.

use std::time::Instant;

use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::server::{Result, ServerError, shutdown_signal};
use crate::{TRACING_TARGET_SERVER_SHUTDOWN, TRACING_TARGET_SERVER_STARTUP};

/// Serves `app` until a shutdown signal arrives.
///
/// `shutdown` is cancelled as soon as the signal is received, so background
/// workers stop alongside the listener. Open connections then get up to the
/// configured shutdown timeout to finish.
pub async fn serve(
    app: Router,
    server_config: ServerConfig,
    shutdown: CancellationToken,
) -> Result<()> {
    let server_addr = server_config.server_addr();

    let listener = TcpListener::bind(server_addr).await.map_err(|err| {
        tracing::error!(
            target: TRACING_TARGET_SERVER_STARTUP,
            addr = %server_addr,
            error = %err,
            "Failed to bind to address"
        );
        ServerError::bind_error(server_addr.to_string(), err)
    })?;

    if server_config.binds_to_all_interfaces() {
        tracing::warn!(
            target: TRACING_TARGET_SERVER_STARTUP,
            "Server bound to all interfaces (0.0.0.0) - ensure firewall is configured"
        );
    }

    tracing::info!(
        target: TRACING_TARGET_SERVER_STARTUP,
        addr = %server_addr,
        "Server is ready and listening for connections"
    );

    let start_time = Instant::now();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        tokio::select! {
            () = shutdown_signal() => signal_token.cancel(),
            () = signal_token.cancelled() => {}
        }
    });

    let graceful = shutdown.clone();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move { graceful.cancelled().await })
        .into_future();

    let shutdown_timeout = server_config.shutdown_timeout();
    let drain = async {
        shutdown.cancelled().await;
        tokio::time::sleep(shutdown_timeout).await;
    };

    let result = tokio::select! {
        result = server => result.map_err(ServerError::Runtime),
        () = drain => {
            tracing::warn!(
                target: TRACING_TARGET_SERVER_SHUTDOWN,
                timeout_secs = shutdown_timeout.as_secs(),
                "Shutdown timeout elapsed, dropping open connections"
            );
            Ok(())
        }
    };

    match &result {
        Ok(()) => tracing::info!(
            target: TRACING_TARGET_SERVER_SHUTDOWN,
            uptime_secs = start_time.elapsed().as_secs(),
            "Server shut down gracefully"
        ),
        Err(err) => tracing::error!(
            target: TRACING_TARGET_SERVER_SHUTDOWN,
            error = %err,
            error_code = err.error_code(),
            suggestion = ?err.suggestion(),
            "Server encountered an error"
        ),
    }

    result
}
