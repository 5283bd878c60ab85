use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
struct Counters {
    total_received: AtomicU64,
    cache_saved: AtomicU64,
    durable_saved: AtomicU64,
    errors: AtomicU64,
}

/// Process-lifetime processing counters.
///
/// Cloning shares the same counters, so one instance can be handed to every inbound task
/// and to the health monitor.
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    counters: Arc<Counters>,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.counters.total_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_saved(&self) {
        self.counters.cache_saved.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_durable_saved(&self) {
        self.counters.durable_saved.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.counters.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Reads all counters.
    ///
    /// Counters are read one by one, a snapshot taken while records are processed may mix
    /// values from before and after a given record.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_received: self.counters.total_received.load(Ordering::Relaxed),
            cache_saved: self.counters.cache_saved.load(Ordering::Relaxed),
            durable_saved: self.counters.durable_saved.load(Ordering::Relaxed),
            errors: self.counters.errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`PipelineStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub total_received: u64,
    pub cache_saved: u64,
    pub durable_saved: u64,
    pub errors: u64,
}

impl StatsSnapshot {
    /// Share of received records persisted durably, in `[0, 1]`.
    pub fn success_rate(&self) -> f64 {
        self.durable_saved as f64 / self.total_received.max(1) as f64
    }
}
