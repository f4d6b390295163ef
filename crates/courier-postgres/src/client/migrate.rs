//! Embedded migration runner.

use std::time::{Duration, Instant};

use diesel::sql_types::Text;
use diesel_async::async_connection_wrapper::AsyncConnectionWrapper;
use diesel_async::pooled_connection::PoolableConnection;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use diesel_migrations::MigrationHarness;
use tokio::task::spawn_blocking;

use crate::{MIGRATIONS, PgClient, PgError, PgResult, TRACING_TARGET_MIGRATION};

/// Outcome of a migration run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationResult {
    /// Total duration of the migration operation
    pub duration: Duration,
    /// Versions applied by this run, in order
    pub processed_versions: Vec<String>,
}

impl MigrationResult {
    /// Returns whether the schema was already up to date.
    pub fn is_no_op(&self) -> bool {
        self.processed_versions.is_empty()
    }

    /// Returns the last applied version, if any.
    pub fn last_processed_version(&self) -> Option<&str> {
        self.processed_versions.last().map(String::as_str)
    }
}

/// Applies every pending embedded migration.
///
/// Diesel's migration harness is synchronous, so it runs on a blocking thread
/// over an [`AsyncConnectionWrapper`] around a pooled connection.
#[tracing::instrument(skip(pg), target = TRACING_TARGET_MIGRATION)]
pub async fn run_pending_migrations(pg: &PgClient) -> PgResult<MigrationResult> {
    tracing::info!(target: TRACING_TARGET_MIGRATION, "Starting database migration process");

    let start_time = Instant::now();
    let mut conn = pg.get_pooled_connection().await?;

    if conn.is_broken() {
        tracing::error!(
            target: TRACING_TARGET_MIGRATION,
            "Connection is broken before migrations"
        );
    }

    let mut conn: AsyncConnectionWrapper<_> = conn.into();
    let versions = spawn_blocking(move || {
        conn.run_pending_migrations(MIGRATIONS)
            .map(|versions| versions.into_iter().map(|v| v.to_string()).collect::<Vec<_>>())
    })
    .await
    .map_err(|err| {
        tracing::error!(
            target: TRACING_TARGET_MIGRATION,
            error = %err,
            "Migration task panicked"
        );
        PgError::Migration(err.into())
    })?
    .map_err(|err| {
        tracing::error!(
            target: TRACING_TARGET_MIGRATION,
            error = %err,
            "Database migration process failed"
        );
        PgError::Migration(err)
    })?;

    let duration = start_time.elapsed();
    tracing::info!(
        target: TRACING_TARGET_MIGRATION,
        duration = ?duration,
        migrations_count = versions.len(),
        "Database migration process completed"
    );

    Ok(MigrationResult {
        duration,
        processed_versions: versions,
    })
}

/// Lists applied migration versions in order.
pub async fn get_applied_migrations(conn: &mut AsyncPgConnection) -> PgResult<Vec<String>> {
    #[derive(diesel::QueryableByName)]
    struct MigrationVersion {
        #[diesel(sql_type = Text)]
        version: String,
    }

    let versions = diesel::sql_query("SELECT version FROM __diesel_schema_migrations ORDER BY version")
        .get_results::<MigrationVersion>(conn)
        .await
        .map_err(|e| PgError::Migration(format!("Failed to get applied migrations: {e}").into()))?
        .into_iter()
        .map(|row| row.version)
        .collect();

    Ok(versions)
}
