#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod config;
mod server;

use std::process;

use anyhow::Context;
use axum::Router;
use courier_server::handler::routes;
use courier_server::middleware::{CorsConfig, RouterCorsExt, RouterRecoveryExt};
use courier_server::service::ServiceState;
use courier_webhook::reqwest::ReqwestClient;
use tokio_util::sync::CancellationToken;

use crate::config::{Cli, ServerConfig};

// Tracing target constants
pub const TRACING_TARGET_SERVER_STARTUP: &str = "courier_cli::server::startup";
pub const TRACING_TARGET_SERVER_SHUTDOWN: &str = "courier_cli::server::shutdown";
pub const TRACING_TARGET_CONFIG: &str = "courier_cli::config";

#[tokio::main]
async fn main() {
    let Err(error) = run().await else {
        tracing::info!(
            target: TRACING_TARGET_SERVER_SHUTDOWN,
            "application terminated successfully"
        );
        process::exit(0);
    };

    if tracing::enabled!(tracing::Level::ERROR) {
        tracing::error!(
            target: TRACING_TARGET_SERVER_SHUTDOWN,
            error = %error,
            "application terminated with error"
        );
    } else {
        eprintln!("Error: {error:#}");
    }

    process::exit(1);
}

/// Main application entry point.
async fn run() -> anyhow::Result<()> {
    let cli = Cli::init();

    Cli::init_tracing();
    tracing::info!(
        target: TRACING_TARGET_SERVER_STARTUP,
        version = env!("CARGO_PKG_VERSION"),
        "starting courier server"
    );

    cli.log();
    cli.validate()?;

    let webhook = ReqwestClient::new(cli.http.clone())
        .context("failed to create webhook client")?
        .into_service();

    let (state, worker) = ServiceState::from_config(&cli.service, webhook)
        .await
        .context("failed to create service state")?;

    let shutdown = CancellationToken::new();
    let retry_worker = tokio::spawn(worker.run(shutdown.child_token()));

    let router = create_router(state, &cli.server, &cli.cors);
    let served = server::serve(router, cli.server, shutdown.clone()).await;

    // The listener may have failed before any signal arrived.
    shutdown.cancel();
    if let Err(err) = retry_worker.await {
        tracing::error!(
            target: TRACING_TARGET_SERVER_SHUTDOWN,
            error = %err,
            "retry worker terminated abnormally"
        );
    }

    served?;
    Ok(())
}

/// Creates the router with recovery applied outermost.
fn create_router(state: ServiceState, server: &ServerConfig, cors: &CorsConfig) -> Router {
    routes(state)
        .with_cors(cors)
        .with_recovery(server.request_timeout())
}
