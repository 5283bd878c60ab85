use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use tc_config::shared::{IntoConnectOptions, PgConnectionConfig, PgConnectionOptions, PoolConfig};
use tracing::debug;

/// Opens a bounded connection pool against the configured database.
///
/// The first connection is established eagerly so an unreachable server is reported here
/// instead of on the first write.
pub async fn connect_pool(
    config: &PgConnectionConfig,
    pool_config: &PoolConfig,
) -> Result<PgPool, sqlx::Error> {
    let session_options = PgConnectionOptions::gateway(pool_config.command_timeout_ms);
    let connect_options: PgConnectOptions = config.with_db(Some(&session_options));

    debug!(
        host = %config.host,
        port = config.port,
        database = %config.name,
        min_connections = pool_config.min_connections,
        max_connections = pool_config.max_connections,
        "connecting to durable store"
    );

    let pool = PgPoolOptions::new()
        .min_connections(pool_config.min_connections)
        .max_connections(pool_config.max_connections)
        .acquire_timeout(Duration::from_millis(pool_config.acquire_timeout_ms))
        .connect_with(connect_options)
        .await?;

    Ok(pool)
}

/// Runs a trivial round trip on a pooled connection.
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("select 1").execute(pool).await?;

    Ok(())
}
