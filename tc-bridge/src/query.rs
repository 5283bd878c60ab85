//! Read side used by operational tooling.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::error;

use crate::store::{CoilRecords, DurableStore, StoredRecord};
use crate::types::{ConnectionPoolState, TcType};

/// Number of rows returned by [`RecordQuery::recent_records`] when no limit is given.
pub const DEFAULT_RECENT_LIMIT: usize = 100;

/// What the durable store knows about one coil.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoilSummary {
    pub coil_number: String,
    pub has_schedule: bool,
    pub has_cut: bool,
    pub has_wpd: bool,
    /// Line speed rows recorded since the coil's schedule.
    pub speed_records: usize,
    /// Newest insertion time among the schedule, cut and WPD pass rows.
    pub last_updated: Option<DateTime<Utc>>,
}

impl CoilSummary {
    fn from_records(coil_number: &str, records: &CoilRecords) -> Self {
        let last_updated = [&records.schedule, &records.cut, &records.wpd_pass]
            .into_iter()
            .flatten()
            .map(|record| record.created_at)
            .max();

        Self {
            coil_number: coil_number.to_string(),
            has_schedule: records.schedule.is_some(),
            has_cut: records.cut.is_some(),
            has_wpd: records.wpd_pass.is_some(),
            speed_records: records.line_speeds.len(),
            last_updated,
        }
    }
}

/// Queries over a [`DurableStore`] that never fail.
///
/// Store errors are logged and turned into empty results.
#[derive(Debug, Clone)]
pub struct RecordQuery<D> {
    store: D,
}

impl<D> RecordQuery<D>
where
    D: DurableStore,
{
    pub fn new(store: D) -> Self {
        Self { store }
    }

    /// Returns the newest rows of `record_type`, [`DEFAULT_RECENT_LIMIT`] if no limit is given.
    pub async fn recent_records(
        &self,
        record_type: TcType,
        limit: Option<usize>,
    ) -> Vec<StoredRecord> {
        let limit = limit.unwrap_or(DEFAULT_RECENT_LIMIT);

        match self.store.query_by_type(record_type, limit).await {
            Ok(records) => records,
            Err(err) => {
                error!(record_type = %record_type, limit, error = %err, "recent records query failed");
                Vec::new()
            }
        }
    }

    /// Returns the newest rows of every type for the coil.
    pub async fn coil_records(&self, coil_number: &str) -> CoilRecords {
        match self.store.query_latest_by_coil(coil_number).await {
            Ok(records) => records,
            Err(err) => {
                error!(coil_number, error = %err, "coil query failed");
                CoilRecords::default()
            }
        }
    }

    pub async fn coil_summary(&self, coil_number: &str) -> CoilSummary {
        let records = self.coil_records(coil_number).await;
        CoilSummary::from_records(coil_number, &records)
    }

    pub fn pool_state(&self) -> ConnectionPoolState {
        self.store.pool_state()
    }

    pub async fn is_healthy(&self) -> bool {
        self.store.health_check().await
    }

    pub fn store(&self) -> &D {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::parser::RecordParser;
    use crate::test_utils::durable::MemoryDurableStore;

    async fn save(store: &MemoryDurableStore, raw: &str) {
        let record = RecordParser::default()
            .parse(raw, "test", Utc::now())
            .unwrap();
        store.save(&record).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn summary_of_unknown_coil_is_empty() {
        let query = RecordQuery::new(MemoryDurableStore::new());

        let summary = query.coil_summary("C-404").await;

        assert_eq!(summary.coil_number, "C-404");
        assert!(!summary.has_schedule && !summary.has_cut && !summary.has_wpd);
        assert_eq!(summary.speed_records, 0);
        assert_eq!(summary.last_updated, None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn summary_counts_speeds_since_schedule() {
        let store = MemoryDurableStore::new();
        save(&store, "4003,L1,1,0,d,t,,100").await;
        save(&store, "4000,L1,2,0,d,t,,C-1").await;
        save(&store, "4001,L1,3,0,d,t,,C-1,1,20").await;
        save(&store, "4003,L1,4,0,d,t,,180").await;
        save(&store, "4003,L1,5,0,d,t,,185").await;

        let query = RecordQuery::new(store.clone());
        let summary = query.coil_summary("C-1").await;

        assert!(summary.has_schedule);
        assert!(summary.has_cut);
        assert!(!summary.has_wpd);
        assert!(summary.speed_records >= 2);
        let cut = store.saved(TcType::Cut).await;
        assert_eq!(summary.last_updated, Some(cut[0].created_at));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn recent_records_uses_default_limit() {
        let store = MemoryDurableStore::new();
        for sequence in 0..(DEFAULT_RECENT_LIMIT + 5) {
            save(&store, &format!("4002,L1,{sequence},0,d,t,,C-1")).await;
        }

        let query = RecordQuery::new(store);

        assert_eq!(
            query.recent_records(TcType::WpdPass, None).await.len(),
            DEFAULT_RECENT_LIMIT
        );
        assert_eq!(query.recent_records(TcType::WpdPass, Some(3)).await.len(), 3);
        assert!(query.recent_records(TcType::Cut, None).await.is_empty());
    }
}
