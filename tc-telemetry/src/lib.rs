//! Logging and metrics setup shared by the TC bridge binaries and tests.

pub mod metrics;
pub mod tracing;
