//! Postgres pool for the document store.
//!
//! The schema lives in `migrations/` and is embedded at compile time. It is
//! applied on every start; sqlx records applied versions, so each migration
//! runs once per database.

use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::config::PoolConfig;

pub static MIGRATOR: Migrator = sqlx::migrate!("src/db/migrations");

fn pool_options(config: &PoolConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
}

/// Open the pool and bring the schema up to date.
///
/// # Errors
///
/// Returns an error if Postgres is unreachable or a migration fails.
pub async fn connect(database_url: &str, config: &PoolConfig) -> Result<PgPool, sqlx::Error> {
    let pool = pool_options(config).connect(database_url).await?;
    MIGRATOR.run(&pool).await?;
    info!(
        max_connections = config.max_connections,
        migrations = MIGRATOR.iter().count(),
        "database ready"
    );
    Ok(pool)
}
