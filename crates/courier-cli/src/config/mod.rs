//! CLI configuration management.
//!
//! ```text
//! Cli
//! ├── server: ServerConfig    # Host, port, timeouts
//! ├── service: ServiceConfig  # Postgres, retry policy
//! ├── http: ReqwestConfig     # Outbound delivery client
//! └── cors: CorsConfig        # Browser origins
//! ```
//!
//! All configuration can be provided via CLI arguments or environment variables.
//! Use `--help` to see all available options.

mod server;

use std::process;

use anyhow::Context;
use clap::Parser;
use courier_server::middleware::CorsConfig;
use courier_server::service::ServiceConfig;
use courier_webhook::reqwest::ReqwestConfig;
use serde::{Deserialize, Serialize};
pub use server::ServerConfig;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::{TRACING_TARGET_CONFIG, TRACING_TARGET_SERVER_STARTUP};

/// Complete CLI configuration.
#[derive(Debug, Clone, Parser, Serialize, Deserialize)]
#[command(name = "courier")]
#[command(about = "Signed webhook delivery server")]
#[command(version)]
pub struct Cli {
    /// Server network and lifecycle configuration.
    #[clap(flatten)]
    pub server: ServerConfig,

    /// Database and retry configuration.
    #[clap(flatten)]
    pub service: ServiceConfig,

    /// Outbound HTTP client configuration.
    #[clap(flatten)]
    pub http: ReqwestConfig,

    /// Cross-origin configuration of the HTTP routes.
    #[clap(flatten)]
    pub cors: CorsConfig,
}

impl Cli {
    /// Loads environment variables from .env file (if enabled) and parses CLI arguments.
    pub fn init() -> Self {
        Self::load_dotenv();
        Self::parse()
    }

    #[cfg(feature = "dotenv")]
    fn load_dotenv() {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            eprintln!("Warning: failed to load .env file: {err}");
        }
    }

    #[cfg(not(feature = "dotenv"))]
    fn load_dotenv() {}

    /// Initializes tracing with environment-based filtering.
    pub fn init_tracing() {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    /// Validates all configuration values.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.server
            .validate()
            .context("invalid server configuration")?;
        self.service
            .validate()
            .context("invalid service configuration")?;
        self.http
            .validate()
            .context("invalid http client configuration")?;
        self.cors.validate().context("invalid CORS configuration")?;
        Ok(())
    }

    /// Logs configuration (no sensitive information).
    pub fn log(&self) {
        tracing::debug!(
            target: TRACING_TARGET_SERVER_STARTUP,
            version = env!("CARGO_PKG_VERSION"),
            pid = process::id(),
            arch = std::env::consts::ARCH,
            os = std::env::consts::OS,
            dotenv = cfg!(feature = "dotenv"),
            "Build information"
        );

        self.server.log();

        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            postgres_url = %self.service.postgres.database_url_masked(),
            postgres_max_connections = self.service.postgres.postgres_max_connections,
            "Database configuration"
        );

        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            max_attempts = self.service.retry.max_attempts,
            base_delay_ms = self.service.retry.base_delay_ms,
            max_delay_ms = self.service.retry.max_delay_ms,
            http_timeout_secs = self.http.http_timeout,
            http_connect_timeout_secs = self.http.http_connect_timeout,
            "Delivery configuration"
        );

        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            cors_origins = ?self.cors.allowed_origins,
            cors_max_age_secs = self.cors.max_age_seconds,
            "CORS configuration"
        );
    }
}
