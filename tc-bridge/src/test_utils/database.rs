use tc_config::shared::PgConnectionConfig;
use tc_postgres::test_utils::{create_tc_database, drop_tc_database, local_pg_connection_config};

use crate::store::postgres::PostgresStore;

/// A throwaway database holding the TC tables, with a [`PostgresStore`] on top of it.
pub struct TestDatabase {
    pub config: PgConnectionConfig,
    pub store: PostgresStore,
}

impl TestDatabase {
    /// Closes the pool and drops the database.
    pub async fn drop(self) {
        self.store.pool().close().await;
        drop_tc_database(&self.config).await;
    }
}

/// Creates a uniquely named database on the local test server.
///
/// # Panics
/// Panics if the test server is not reachable.
pub async fn spawn_database() -> TestDatabase {
    let config = local_pg_connection_config();
    let pool = create_tc_database(&config).await;

    TestDatabase {
        config,
        store: PostgresStore::from_pool(pool),
    }
}
