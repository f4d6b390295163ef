//! Service configuration.

#[cfg(feature = "config")]
use clap::Args;
use courier_postgres::{PgClient, PgConfig, run_pending_migrations};
use serde::{Deserialize, Serialize};

use crate::worker::RetryConfig;
use crate::{Error, Result};

/// Tracing target for service startup.
const TRACING_TARGET: &str = "courier_server::service::config";

/// App [`state`] configuration.
///
/// [`state`]: crate::service::ServiceState
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[must_use = "config does nothing unless you use it"]
pub struct ServiceConfig {
    /// Database connection and pool settings.
    #[cfg_attr(feature = "config", command(flatten))]
    pub postgres: PgConfig,

    /// Redelivery policy.
    #[cfg_attr(feature = "config", command(flatten))]
    #[serde(default)]
    pub retry: RetryConfig,
}

impl ServiceConfig {
    /// Creates a configuration with the default retry policy.
    pub fn new(postgres: PgConfig) -> Self {
        Self {
            postgres,
            retry: RetryConfig::default(),
        }
    }

    /// Sets the retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Validates every section.
    pub fn validate(&self) -> Result<()> {
        self.postgres.validate()?;
        self.retry.validate()
    }

    /// Connects to Postgres and applies pending migrations.
    pub async fn connect_postgres(&self) -> Result<PgClient> {
        let pg_client = self.postgres.clone().build().map_err(|e| {
            Error::internal("postgres", "Failed to create database client").with_source(e)
        })?;

        let migrations = run_pending_migrations(&pg_client).await.map_err(|e| {
            Error::internal("postgres", "Failed to apply database migrations").with_source(e)
        })?;

        tracing::info!(
            target: TRACING_TARGET,
            applied = migrations.processed_versions.len(),
            last_version = ?migrations.last_processed_version(),
            "Database is ready"
        );

        Ok(pg_client)
    }
}
