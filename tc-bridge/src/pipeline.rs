use chrono::Utc;
use metrics::counter;
use serde::Serialize;
use tracing::{debug, warn};

use crate::forward::{ForwardingRouter, RecordSender};
use crate::metrics::{TC_RECORDS_RECEIVED_TOTAL, TC_RECORDS_REJECTED_TOTAL};
use crate::parser::RecordParser;
use crate::store::{CacheStore, DurableStore};
use crate::types::{ConnectionPoolState, PipelineStats, StatsSnapshot};

/// Counters of the pipeline together with the durable store connectivity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProcessingStats {
    #[serde(flatten)]
    pub counters: StatsSnapshot,
    pub success_rate: f64,
    pub pool: ConnectionPoolState,
}

/// Availability of every component the pipeline writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    /// Always `true`, the cache lives in process.
    pub cache_store: bool,
    pub durable_store: bool,
    pub forwarder: bool,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.cache_store && self.durable_store && self.forwarder
    }
}

/// Runs every inbound payload through parsing, both stores and forwarding.
///
/// A single instance is shared by all inbound connection tasks. Per-record failures are
/// absorbed into the returned flag and the statistics, nothing raised while processing a
/// record stops the stream.
#[derive(Debug)]
pub struct IngestionPipeline<C, D, S> {
    parser: RecordParser,
    cache: C,
    durable: D,
    router: ForwardingRouter<S>,
    stats: PipelineStats,
}

impl<C, D, S> IngestionPipeline<C, D, S>
where
    C: CacheStore,
    D: DurableStore,
    S: RecordSender,
{
    pub fn new(parser: RecordParser, cache: C, durable: D, router: ForwardingRouter<S>) -> Self {
        Self {
            parser,
            cache,
            durable,
            router,
            stats: PipelineStats::new(),
        }
    }

    /// Processes one inbound payload.
    ///
    /// Returns `true` only when the record was written to both stores. The raw payload is
    /// forwarded whenever the record type is routed, whatever the outcome of the writes.
    pub async fn process(&self, raw_payload: &str, source_label: &str) -> bool {
        self.stats.record_received();
        counter!(TC_RECORDS_RECEIVED_TOTAL).increment(1);
        let received_at = Utc::now();

        let record = match self.parser.parse(raw_payload, source_label, received_at) {
            Ok(record) => record,
            Err(err) => {
                self.stats.record_error();
                counter!(TC_RECORDS_REJECTED_TOTAL).increment(1);
                warn!(source = source_label, error = %err, "rejected inbound payload");

                return false;
            }
        };

        let cache_saved = self.cache.save(&record).is_ok();
        if cache_saved {
            self.stats.record_cache_saved();
        }

        let durable_saved = self.durable.save(&record).await.is_ok();
        if durable_saved {
            self.stats.record_durable_saved();
        }

        self.router.forward(&record).await;

        debug!(
            record_type = %record.record_type(),
            source = source_label,
            coil_number = record.coil_number().unwrap_or_default(),
            cache_saved,
            durable_saved,
            "processed record"
        );

        cache_saved && durable_saved
    }

    pub fn stats(&self) -> ProcessingStats {
        let counters = self.stats.snapshot();

        ProcessingStats {
            counters,
            success_rate: counters.success_rate(),
            pool: self.durable.pool_state(),
        }
    }

    pub async fn health_check(&self) -> HealthReport {
        HealthReport {
            cache_store: true,
            durable_store: self.durable.health_check().await,
            forwarder: self.router.is_healthy(),
        }
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn durable(&self) -> &D {
        &self.durable
    }

    pub fn router(&self) -> &ForwardingRouter<S> {
        &self.router
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forward::{Destination, ForwardingRoutes};
    use crate::store::memory::MemoryCacheStore;
    use crate::test_utils::durable::MemoryDurableStore;
    use crate::test_utils::sender::RecordingSender;
    use crate::types::TcType;

    type TestPipeline = IngestionPipeline<MemoryCacheStore, MemoryDurableStore, RecordingSender>;

    fn pipeline() -> (TestPipeline, MemoryDurableStore, RecordingSender) {
        let durable = MemoryDurableStore::new();
        let sender = RecordingSender::new();
        let pipeline = IngestionPipeline::new(
            RecordParser::default(),
            MemoryCacheStore::new(),
            durable.clone(),
            ForwardingRouter::new(ForwardingRoutes::default(), sender.clone()),
        );

        (pipeline, durable, sender)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unknown_type_is_counted_and_dropped() {
        let (pipeline, durable, sender) = pipeline();

        assert!(!pipeline.process("9999,L1,0001", "test").await);

        let stats = pipeline.stats();
        assert_eq!(stats.counters.total_received, 1);
        assert_eq!(stats.counters.errors, 1);
        assert_eq!(stats.counters.cache_saved, 0);
        assert_eq!(durable.saved_count().await, 0);
        assert!(sender.sent().await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn durable_failure_still_forwards() {
        let (pipeline, durable, sender) = pipeline();
        durable.fail_saves(true).await;

        let raw = "4000,L1,0002,120,20240101,120000,,C-1001";
        assert!(!pipeline.process(raw, "test").await);

        let stats = pipeline.stats();
        assert_eq!(stats.counters.cache_saved, 1);
        assert_eq!(stats.counters.durable_saved, 0);
        assert_eq!(stats.counters.errors, 0);
        assert_eq!(pipeline.cache().len(TcType::Schedule).unwrap(), 1);

        let sent = sender.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, Destination::new("127.0.0.1", 9308));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cut_records_are_stored_but_not_forwarded() {
        let (pipeline, durable, sender) = pipeline();

        assert!(pipeline.process("4001,L1,3,0,d,t,,C-1,1,20", "test").await);

        assert_eq!(durable.saved_count().await, 1);
        assert!(sender.sent().await.is_empty());
        assert_eq!(pipeline.stats().success_rate, 1.0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn health_reflects_components() {
        let (pipeline, durable, sender) = pipeline();
        assert!(pipeline.health_check().await.is_healthy());

        durable.set_healthy(false).await;
        let report = pipeline.health_check().await;
        assert!(report.cache_store);
        assert!(!report.durable_store);
        assert!(report.forwarder);
        assert!(!report.is_healthy());

        durable.set_healthy(true).await;
        sender.close().await;
        assert!(!pipeline.health_check().await.forwarder);
    }
}
