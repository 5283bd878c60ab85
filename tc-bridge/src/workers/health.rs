use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{error, info, warn};

use crate::concurrency::shutdown::ShutdownRx;
use crate::forward::RecordSender;
use crate::pipeline::{HealthReport, IngestionPipeline};
use crate::store::{CacheStore, DurableStore};

/// Handle to a running [`HealthMonitor`].
#[derive(Debug)]
pub struct HealthMonitorHandle {
    join_handle: JoinHandle<()>,
}

impl HealthMonitorHandle {
    /// Waits for the monitor to stop after shutdown has been signalled.
    pub async fn wait(self) {
        if let Err(err) = self.join_handle.await {
            error!(error = %err, "health monitor task panicked");
        }
    }
}

/// Periodically logs the pipeline statistics and the health of its components.
///
/// The monitor only observes, it never retries or reconnects anything.
pub struct HealthMonitor<C, D, S> {
    pipeline: Arc<IngestionPipeline<C, D, S>>,
    interval: Duration,
    shutdown_rx: ShutdownRx,
}

impl<C, D, S> HealthMonitor<C, D, S>
where
    C: CacheStore + Send + Sync + 'static,
    D: DurableStore + Send + Sync + 'static,
    S: RecordSender + Send + Sync + 'static,
{
    pub fn new(
        pipeline: Arc<IngestionPipeline<C, D, S>>,
        interval: Duration,
        shutdown_rx: ShutdownRx,
    ) -> Self {
        Self {
            pipeline,
            interval,
            shutdown_rx,
        }
    }

    pub fn start(self) -> HealthMonitorHandle {
        let join_handle = tokio::spawn(self.run());
        HealthMonitorHandle { join_handle }
    }

    /// Logs one sample and returns the health report it was based on.
    pub async fn sample(&self) -> HealthReport {
        let stats = self.pipeline.stats();
        info!(
            total_received = stats.counters.total_received,
            cache_saved = stats.counters.cache_saved,
            durable_saved = stats.counters.durable_saved,
            errors = stats.counters.errors,
            success_rate = stats.success_rate,
            pool_status = ?stats.pool.status,
            pool_size = stats.pool.size,
            pool_idle = stats.pool.idle,
            "pipeline statistics"
        );

        let report = self.pipeline.health_check().await;
        if !report.is_healthy() {
            warn!(
                cache_store = report.cache_store,
                durable_store = report.durable_store,
                forwarder = report.forwarder,
                "pipeline is degraded"
            );
        }

        report
    }

    async fn run(mut self) {
        info!(interval_ms = self.interval.as_millis() as u64, "starting health monitor");

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately, samples start one period after startup.
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown_rx.wait_for_shutdown() => {
                    info!("health monitor stopped due to shutdown");
                    return;
                }

                _ = ticker.tick() => {
                    self.sample().await;
                }
            }
        }
    }
}
