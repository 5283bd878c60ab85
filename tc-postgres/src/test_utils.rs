use sqlx::postgres::PgConnectOptions;
use sqlx::{Connection, Executor, PgConnection, PgPool};
use tc_config::shared::{IntoConnectOptions, PgConnectionConfig, TlsConfig};
use uuid::Uuid;

use crate::tables::CREATE_TC_TABLES;

/// Builds a connection config for a uniquely named database on the local test server.
///
/// Configuration is read from environment variables:
/// - `TESTS_DATABASE_HOST`: Postgres server hostname (required)
/// - `TESTS_DATABASE_PORT`: Postgres server port (required)
/// - `TESTS_DATABASE_USERNAME`: Database user (required)
/// - `TESTS_DATABASE_PASSWORD`: Database password (optional)
pub fn local_pg_connection_config() -> PgConnectionConfig {
    PgConnectionConfig {
        host: std::env::var("TESTS_DATABASE_HOST").expect("TESTS_DATABASE_HOST must be set"),
        port: std::env::var("TESTS_DATABASE_PORT")
            .expect("TESTS_DATABASE_PORT must be set")
            .parse()
            .expect("TESTS_DATABASE_PORT must be a valid port number"),
        name: Uuid::new_v4().to_string(),
        username: std::env::var("TESTS_DATABASE_USERNAME")
            .expect("TESTS_DATABASE_USERNAME must be set"),
        password: std::env::var("TESTS_DATABASE_PASSWORD")
            .ok()
            .map(Into::into),
        tls: TlsConfig::disabled(),
    }
}

/// Creates a new Postgres database with the TC tables and returns a pool on it.
///
/// # Panics
/// Panics if connection, database creation or table creation fails.
pub async fn create_tc_database(config: &PgConnectionConfig) -> PgPool {
    let server_options: PgConnectOptions = config.without_db(None);
    let mut connection = PgConnection::connect_with(&server_options)
        .await
        .expect("Failed to connect to Postgres");
    connection
        .execute(&*format!(r#"create database "{}";"#, config.name))
        .await
        .expect("Failed to create database");

    let database_options: PgConnectOptions = config.with_db(None);
    let pool = PgPool::connect_with(database_options)
        .await
        .expect("Failed to connect to Postgres");

    sqlx::raw_sql(CREATE_TC_TABLES)
        .execute(&pool)
        .await
        .expect("Failed to create TC tables");

    pool
}

/// Drops a Postgres database and terminates all connections.
///
/// This function will not panic on errors, it logs them and continues so cleanup never
/// fails a test.
pub async fn drop_tc_database(config: &PgConnectionConfig) {
    let server_options: PgConnectOptions = config.without_db(None);
    let mut connection = match PgConnection::connect_with(&server_options).await {
        Ok(conn) => conn,
        Err(e) => {
            eprintln!("warning: failed to connect to Postgres for cleanup: {e}");
            return;
        }
    };

    if let Err(e) = connection
        .execute(&*format!(
            r#"
            select pg_terminate_backend(pg_stat_activity.pid)
            from pg_stat_activity
            where pg_stat_activity.datname = '{}'
            and pid <> pg_backend_pid();"#,
            config.name
        ))
        .await
    {
        eprintln!(
            "warning: failed to terminate connections for database {}: {}",
            config.name, e
        );
    }

    if let Err(e) = connection
        .execute(&*format!(r#"drop database if exists "{}";"#, config.name))
        .await
    {
        eprintln!("warning: failed to drop database {}: {}", config.name, e);
    }
}
