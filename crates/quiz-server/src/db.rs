use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::config::Config;

/// Creates a connection pool sized from the configuration.
///
/// # Errors
///
/// Returns an error if the database URL is invalid or a connection cannot be
/// established within the acquire timeout.
pub async fn create_pool(cfg: &Config) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(cfg.db_max_connections)
        .min_connections(cfg.db_min_connections.min(cfg.db_max_connections))
        .max_lifetime(cfg.db_max_lifetime)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&cfg.database_url)
        .await
        .context("failed to connect to database")
}

/// Applies all pending migrations to the pool.
///
/// # Errors
///
/// Returns an error if the migrations table cannot be created or a migration
/// fails to apply.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("failed to apply database migrations")?;
    tracing::info!("database migrations applied");
    Ok(())
}
