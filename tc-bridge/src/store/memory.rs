use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use metrics::counter;
use tracing::error;

use crate::bail;
use crate::error::{BridgeResult, ErrorKind};
use crate::metrics::{RECORD_TYPE_LABEL, TC_CACHE_WRITES_TOTAL};
use crate::store::base::CacheStore;
use crate::types::{TcRecord, TcType};

#[derive(Debug, Default)]
struct Inner {
    /// Records per type, oldest first.
    records: HashMap<TcType, VecDeque<TcRecord>>,
}

/// In-memory [`CacheStore`].
///
/// Keeps every record unless a per-type bound is given, in which case the oldest records of a
/// type are dropped first.
#[derive(Debug, Clone)]
pub struct MemoryCacheStore {
    inner: Arc<Mutex<Inner>>,
    max_records_per_type: Option<usize>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::with_capacity_limit(None)
    }

    pub fn with_capacity_limit(max_records_per_type: Option<usize>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            max_records_per_type,
        }
    }

    /// Returns the number of cached records of `record_type`.
    pub fn len(&self, record_type: TcType) -> BridgeResult<usize> {
        let inner = self.lock()?;
        Ok(inner.records.get(&record_type).map_or(0, VecDeque::len))
    }

    fn lock(&self) -> BridgeResult<MutexGuard<'_, Inner>> {
        match self.inner.lock() {
            Ok(inner) => Ok(inner),
            Err(_) => bail!(
                ErrorKind::CacheWriteFailed,
                "Cache lock poisoned",
                "a thread panicked while holding the cache lock"
            ),
        }
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStore for MemoryCacheStore {
    fn save(&self, record: &TcRecord) -> BridgeResult<()> {
        let record_type = record.record_type();

        let mut inner = self.lock().inspect_err(|err| {
            error!(record_type = %record_type, error = %err, "cache write failed");
        })?;

        let records = inner.records.entry(record_type).or_default();
        records.push_back(record.clone());
        if let Some(max) = self.max_records_per_type {
            while records.len() > max {
                records.pop_front();
            }
        }

        counter!(TC_CACHE_WRITES_TOTAL, RECORD_TYPE_LABEL => record_type.as_str()).increment(1);

        Ok(())
    }

    fn recent(&self, record_type: TcType, limit: usize) -> BridgeResult<Vec<TcRecord>> {
        let inner = self.lock()?;

        Ok(inner
            .records
            .get(&record_type)
            .map(|records| records.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    fn latest_for_coil(
        &self,
        record_type: TcType,
        coil_number: &str,
    ) -> BridgeResult<Option<TcRecord>> {
        let inner = self.lock()?;

        Ok(inner.records.get(&record_type).and_then(|records| {
            records
                .iter()
                .rev()
                .find(|record| record.coil_number() == Some(coil_number))
                .cloned()
        }))
    }
}
