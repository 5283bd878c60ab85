use std::collections::BTreeMap;
use std::future::Future;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::BridgeResult;
use crate::types::{ConnectionPoolState, FieldValue, TcRecord, TcType};

/// Maximum number of line speed rows returned for a coil.
pub const COIL_SPEED_WINDOW: usize = 10;

/// Process-local store of the most recent records.
///
/// Writes are synchronous and must not depend on external systems.
pub trait CacheStore {
    /// Stores a copy of `record`.
    fn save(&self, record: &TcRecord) -> BridgeResult<()>;

    /// Returns up to `limit` records of `record_type`, newest first.
    fn recent(&self, record_type: TcType, limit: usize) -> BridgeResult<Vec<TcRecord>>;

    /// Returns the newest record of `record_type` for the coil.
    fn latest_for_coil(
        &self,
        record_type: TcType,
        coil_number: &str,
    ) -> BridgeResult<Option<TcRecord>>;
}

/// A record as persisted by a [`DurableStore`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredRecord {
    pub id: i64,
    pub record_type: TcType,
    pub fields: BTreeMap<&'static str, FieldValue>,
    /// Insertion timestamp assigned by the store.
    pub created_at: DateTime<Utc>,
}

/// Everything the durable store knows about one coil.
///
/// Parts without a matching row are left empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CoilRecords {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<StoredRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cut: Option<StoredRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wpd_pass: Option<StoredRecord>,
    /// Newest line speed rows inserted at or after the schedule row, at most
    /// [`COIL_SPEED_WINDOW`]. Empty when the coil has no schedule.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub line_speeds: Vec<StoredRecord>,
}

impl CoilRecords {
    pub fn is_empty(&self) -> bool {
        self.schedule.is_none()
            && self.cut.is_none()
            && self.wpd_pass.is_none()
            && self.line_speeds.is_empty()
    }
}

/// Relational persistence of records, one table per record type.
///
/// Per-record failures are logged by the implementation and returned as errors, they are
/// never raised as panics.
pub trait DurableStore {
    /// Persists `record` in the table of its type.
    fn save(&self, record: &TcRecord) -> impl Future<Output = BridgeResult<()>> + Send;

    /// Returns up to `limit` stored rows of `record_type`, newest first.
    fn query_by_type(
        &self,
        record_type: TcType,
        limit: usize,
    ) -> impl Future<Output = BridgeResult<Vec<StoredRecord>>> + Send;

    /// Returns the newest schedule, cut and WPD pass rows for the coil and the line speed rows
    /// recorded since its schedule.
    fn query_latest_by_coil(
        &self,
        coil_number: &str,
    ) -> impl Future<Output = BridgeResult<CoilRecords>> + Send;

    /// Returns the current state of the connection pool.
    fn pool_state(&self) -> ConnectionPoolState;

    /// Runs a trivial round trip, `false` on any failure.
    fn health_check(&self) -> impl Future<Output = bool> + Send;

    /// Closes the connection pool, waiting for checked out connections to be returned.
    fn disconnect(&self) -> impl Future<Output = ()> + Send;
}
