use crate::config::DatabaseConfig;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;

const SCHEMA: &str = include_str!("../sql/schema.sql");

/// Connect with exponential backoff, retrying `connect_retries` times.
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    let strategy = ExponentialBackoff::from_millis(100)
        .max_delay(std::time::Duration::from_secs(5))
        .map(jitter)
        .take(config.connect_retries);

    Retry::spawn(strategy, || async {
        PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Database connection attempt failed");
                e
            })
    })
    .await
}

pub async fn health_check(pool: &PgPool) -> Result<String, sqlx::Error> {
    let row: (String,) = sqlx::query_as("SELECT version()").fetch_one(pool).await?;
    Ok(row.0)
}

/// Create the link tables and indexes if they do not exist yet.
pub async fn apply_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    tracing::info!("Database schema applied");
    Ok(())
}
