//! Ingestion core of the TC bridge.
//!
//! Inbound TC telemetry is parsed into typed records, written to an in-process cache and to
//! Postgres, and the original payload of selected record types is forwarded to downstream
//! consumers over TCP. A health monitor periodically samples the pipeline.

pub mod concurrency;
pub mod error;
pub mod forward;
mod macros;
pub mod metrics;
pub mod parser;
pub mod pipeline;
pub mod query;
pub mod store;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
pub mod workers;
