use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::time::sleep;

use crate::bail;
use crate::error::{BridgeResult, ErrorKind};
use crate::store::{COIL_SPEED_WINDOW, CoilRecords, DurableStore, StoredRecord};
use crate::types::{COIL_NUMBER_FIELD, ConnectionPoolState, PoolStatus, TcRecord, TcType};

#[derive(Debug, Default)]
struct Inner {
    /// Rows per type in insertion order.
    rows: HashMap<TcType, Vec<StoredRecord>>,
    next_id: i64,
    fail_saves: bool,
    save_delay: Duration,
}

/// In-memory [`DurableStore`] with switchable failures.
///
/// Rows get an incrementing id and the current time as `created_at`, mirroring the server
/// assigned columns of the Postgres tables.
#[derive(Debug, Clone)]
pub struct MemoryDurableStore {
    inner: Arc<Mutex<Inner>>,
    healthy: Arc<AtomicBool>,
    connected: Arc<AtomicBool>,
}

impl MemoryDurableStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            healthy: Arc::new(AtomicBool::new(true)),
            connected: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Makes every following save fail while `fail` is set.
    pub async fn fail_saves(&self, fail: bool) {
        self.inner.lock().await.fail_saves = fail;
    }

    /// Delays every following save by `delay` before the row is written.
    pub async fn set_save_delay(&self, delay: Duration) {
        self.inner.lock().await.save_delay = delay;
    }

    pub async fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Returns the number of rows saved across all types.
    pub async fn saved_count(&self) -> usize {
        self.inner.lock().await.rows.values().map(Vec::len).sum()
    }

    /// Returns the rows saved for `record_type` in insertion order.
    pub async fn saved(&self, record_type: TcType) -> Vec<StoredRecord> {
        self.inner
            .lock()
            .await
            .rows
            .get(&record_type)
            .cloned()
            .unwrap_or_default()
    }

    fn latest_for_coil(
        rows: &HashMap<TcType, Vec<StoredRecord>>,
        record_type: TcType,
        coil_number: &str,
    ) -> Option<StoredRecord> {
        rows.get(&record_type)?
            .iter()
            .rev()
            .find(|row| {
                row.fields
                    .get(COIL_NUMBER_FIELD)
                    .and_then(|value| value.as_text())
                    == Some(coil_number)
            })
            .cloned()
    }
}

impl Default for MemoryDurableStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DurableStore for MemoryDurableStore {
    async fn save(&self, record: &TcRecord) -> BridgeResult<()> {
        let save_delay = self.inner.lock().await.save_delay;
        if !save_delay.is_zero() {
            sleep(save_delay).await;
        }

        let mut inner = self.inner.lock().await;
        if inner.fail_saves || !self.connected.load(Ordering::SeqCst) {
            bail!(
                ErrorKind::DurableQueryFailed,
                "Durable write failed",
                format!("injected failure for {}", record.record_type())
            );
        }

        inner.next_id += 1;
        let row = StoredRecord {
            id: inner.next_id,
            record_type: record.record_type(),
            fields: record.fields().clone(),
            created_at: Utc::now(),
        };
        inner.rows.entry(record.record_type()).or_default().push(row);

        Ok(())
    }

    async fn query_by_type(
        &self,
        record_type: TcType,
        limit: usize,
    ) -> BridgeResult<Vec<StoredRecord>> {
        let inner = self.inner.lock().await;

        Ok(inner
            .rows
            .get(&record_type)
            .map(|rows| rows.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn query_latest_by_coil(&self, coil_number: &str) -> BridgeResult<CoilRecords> {
        let inner = self.inner.lock().await;

        let schedule = Self::latest_for_coil(&inner.rows, TcType::Schedule, coil_number);
        let cut = Self::latest_for_coil(&inner.rows, TcType::Cut, coil_number);
        let wpd_pass = Self::latest_for_coil(&inner.rows, TcType::WpdPass, coil_number);

        let line_speeds = match (&schedule, inner.rows.get(&TcType::LineSpeed)) {
            (Some(schedule), Some(speeds)) => speeds
                .iter()
                .rev()
                .filter(|row| row.created_at >= schedule.created_at)
                .take(COIL_SPEED_WINDOW)
                .cloned()
                .collect(),
            _ => Vec::new(),
        };

        Ok(CoilRecords {
            schedule,
            cut,
            wpd_pass,
            line_speeds,
        })
    }

    fn pool_state(&self) -> ConnectionPoolState {
        if !self.connected.load(Ordering::SeqCst) {
            return ConnectionPoolState::disconnected();
        }

        ConnectionPoolState {
            status: PoolStatus::Connected,
            size: 1,
            idle: 1,
            min_size: 1,
            max_size: 1,
        }
    }

    async fn health_check(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && self.healthy.load(Ordering::SeqCst)
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}
