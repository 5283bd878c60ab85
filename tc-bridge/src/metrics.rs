//! Metric names emitted by the bridge.

use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge};

static REGISTER_METRICS: Once = Once::new();

/// Label for the record type in metrics.
pub const RECORD_TYPE_LABEL: &str = "record_type";

/// Label for the inbound listener name in metrics.
pub const LISTENER_LABEL: &str = "listener";

pub const TC_RECORDS_RECEIVED_TOTAL: &str = "tc_records_received_total";
pub const TC_RECORDS_REJECTED_TOTAL: &str = "tc_records_rejected_total";
pub const TC_CACHE_WRITES_TOTAL: &str = "tc_cache_writes_total";
pub const TC_DURABLE_WRITES_TOTAL: &str = "tc_durable_writes_total";
pub const TC_DURABLE_WRITE_FAILURES_TOTAL: &str = "tc_durable_write_failures_total";
pub const TC_FORWARDS_TOTAL: &str = "tc_forwards_total";
pub const TC_FORWARD_FAILURES_TOTAL: &str = "tc_forward_failures_total";
pub const TC_DURABLE_POOL_CONNECTIONS: &str = "tc_durable_pool_connections";

/// Registers descriptions of the bridge metrics. Safe to call more than once.
pub fn register_metrics() {
    REGISTER_METRICS.call_once(|| {
        describe_counter!(
            TC_RECORDS_RECEIVED_TOTAL,
            Unit::Count,
            "Inbound TC messages handed to the pipeline"
        );

        describe_counter!(
            TC_RECORDS_REJECTED_TOTAL,
            Unit::Count,
            "Inbound TC messages that could not be classified"
        );

        describe_counter!(
            TC_CACHE_WRITES_TOTAL,
            Unit::Count,
            "Records written to the in-process cache"
        );

        describe_counter!(
            TC_DURABLE_WRITES_TOTAL,
            Unit::Count,
            "Records written to Postgres"
        );

        describe_counter!(
            TC_DURABLE_WRITE_FAILURES_TOTAL,
            Unit::Count,
            "Records that failed to be written to Postgres"
        );

        describe_counter!(
            TC_FORWARDS_TOTAL,
            Unit::Count,
            "Raw payloads forwarded to downstream consumers"
        );

        describe_counter!(
            TC_FORWARD_FAILURES_TOTAL,
            Unit::Count,
            "Raw payloads that could not be forwarded"
        );

        describe_gauge!(
            TC_DURABLE_POOL_CONNECTIONS,
            Unit::Count,
            "Open connections in the Postgres pool"
        );
    });
}
