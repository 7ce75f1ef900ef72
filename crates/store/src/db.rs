use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use blogqa_core::config::PostgresConfig;

use crate::error::StoreError;

/// Create the PostgreSQL connection pool and run migrations.
///
/// The queue and content stores are the product here, so a missing or
/// unreachable database is a startup failure, not a degraded mode.
pub async fn init_pool(config: &PostgresConfig) -> Result<PgPool, StoreError> {
    info!("Connecting to PostgreSQL: {}", config.masked_url());

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await?;

    info!("PostgreSQL connected");

    sqlx::migrate!("../../migrations").run(&pool).await?;
    info!("Database migrations applied");

    Ok(pool)
}
