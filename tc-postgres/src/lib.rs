//! Postgres access for the TC durable store: pool construction, table catalogue and queries.

pub mod pool;
pub mod tables;
#[cfg(feature = "test-utils")]
pub mod test_utils;
