use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tc_config::shared::{PgConnectionConfig, PoolConfig};
use tc_postgres::pool::{connect_pool, ping};
use tc_postgres::tables::{
    CREATED_AT_COLUMN, SqlValue, TcTable, fetch_latest_for_coil, fetch_recent,
    fetch_speeds_since, insert_row,
};
use tracing::{debug, error, info, warn};

use crate::bridge_error;
use crate::error::{BridgeError, BridgeResult, ErrorKind};
use crate::metrics::{
    RECORD_TYPE_LABEL, TC_DURABLE_POOL_CONNECTIONS, TC_DURABLE_WRITE_FAILURES_TOTAL,
    TC_DURABLE_WRITES_TOTAL,
};
use crate::store::base::{COIL_SPEED_WINDOW, CoilRecords, DurableStore, StoredRecord};
use crate::types::{ConnectionPoolState, FieldKind, FieldValue, PoolStatus, TcRecord, TcType};

/// Returns the table holding records of `record_type`.
fn table_for(record_type: TcType) -> TcTable {
    match record_type {
        TcType::Schedule => TcTable::Schedule,
        TcType::Cut => TcTable::Cut,
        TcType::WpdPass => TcTable::Wpd,
        TcType::LineSpeed => TcTable::Speed,
    }
}

fn sql_value(value: &FieldValue) -> SqlValue<'_> {
    match value {
        FieldValue::Text(text) => SqlValue::Text(text),
        FieldValue::Integer(integer) => SqlValue::BigInt(*integer),
        FieldValue::Decimal(decimal) => SqlValue::Double(*decimal),
    }
}

/// Decodes a row of the table of `record_type` using the type's field layout.
fn decode_row(record_type: TcType, row: &PgRow) -> Result<StoredRecord, sqlx::Error> {
    let mut fields = BTreeMap::new();
    for spec in record_type.fields() {
        let value = match spec.kind {
            FieldKind::Text => FieldValue::Text(row.try_get(spec.name)?),
            FieldKind::Integer => FieldValue::Integer(row.try_get(spec.name)?),
            FieldKind::Decimal => FieldValue::Decimal(row.try_get(spec.name)?),
        };
        fields.insert(spec.name, value);
    }

    Ok(StoredRecord {
        id: row.try_get("id")?,
        record_type,
        fields,
        created_at: row.try_get(CREATED_AT_COLUMN)?,
    })
}

/// [`DurableStore`] backed by a Postgres connection pool.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Opens the connection pool.
    ///
    /// Fails when the database cannot be reached, callers must not start ingesting in that
    /// case.
    pub async fn connect(
        config: &PgConnectionConfig,
        pool_config: &PoolConfig,
    ) -> BridgeResult<Self> {
        let pool = connect_pool(config, pool_config).await.map_err(|err| {
            bridge_error!(
                ErrorKind::DurableConnectionFailed,
                "Durable store connection failed",
                format!("could not connect to {}:{}/{}", config.host, config.port, config.name),
                source: err
            )
        })?;

        info!(
            host = %config.host,
            port = config.port,
            database = %config.name,
            min_connections = pool_config.min_connections,
            max_connections = pool_config.max_connections,
            "connected to durable store"
        );

        Ok(Self::from_pool(pool))
    }

    /// Wraps an already opened pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn latest_for_coil(
        &self,
        record_type: TcType,
        coil_number: &str,
    ) -> BridgeResult<Option<StoredRecord>> {
        let row = fetch_latest_for_coil(&self.pool, table_for(record_type), coil_number).await?;

        row.map(|row| decode_row(record_type, &row))
            .transpose()
            .map_err(BridgeError::from)
    }

    async fn speeds_since(&self, since: DateTime<Utc>) -> BridgeResult<Vec<StoredRecord>> {
        let rows = fetch_speeds_since(&self.pool, since, COIL_SPEED_WINDOW as i64).await?;

        rows.iter()
            .map(|row| decode_row(TcType::LineSpeed, row).map_err(BridgeError::from))
            .collect()
    }
}

impl DurableStore for PostgresStore {
    async fn save(&self, record: &TcRecord) -> BridgeResult<()> {
        let record_type = record.record_type();
        let columns: Vec<(&str, SqlValue<'_>)> = record
            .fields()
            .iter()
            .map(|(name, value)| (*name, sql_value(value)))
            .collect();

        if let Err(err) = insert_row(&self.pool, table_for(record_type), &columns).await {
            counter!(TC_DURABLE_WRITE_FAILURES_TOTAL, RECORD_TYPE_LABEL => record_type.as_str())
                .increment(1);
            error!(
                record_type = %record_type,
                source = record.source_label(),
                error = %err,
                "durable write failed"
            );

            return Err(err.into());
        }

        counter!(TC_DURABLE_WRITES_TOTAL, RECORD_TYPE_LABEL => record_type.as_str()).increment(1);
        debug!(record_type = %record_type, source = record.source_label(), "durable write succeeded");

        Ok(())
    }

    async fn query_by_type(
        &self,
        record_type: TcType,
        limit: usize,
    ) -> BridgeResult<Vec<StoredRecord>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = fetch_recent(&self.pool, table_for(record_type), limit).await?;

        rows.iter()
            .map(|row| decode_row(record_type, row).map_err(BridgeError::from))
            .collect()
    }

    async fn query_latest_by_coil(&self, coil_number: &str) -> BridgeResult<CoilRecords> {
        let schedule = self.latest_for_coil(TcType::Schedule, coil_number).await?;
        let cut = self.latest_for_coil(TcType::Cut, coil_number).await?;
        let wpd_pass = self.latest_for_coil(TcType::WpdPass, coil_number).await?;

        let line_speeds = match &schedule {
            Some(schedule) => self.speeds_since(schedule.created_at).await?,
            None => Vec::new(),
        };

        Ok(CoilRecords {
            schedule,
            cut,
            wpd_pass,
            line_speeds,
        })
    }

    fn pool_state(&self) -> ConnectionPoolState {
        if self.pool.is_closed() {
            gauge!(TC_DURABLE_POOL_CONNECTIONS).set(0.0);
            return ConnectionPoolState::disconnected();
        }

        let size = self.pool.size();
        gauge!(TC_DURABLE_POOL_CONNECTIONS).set(size as f64);

        ConnectionPoolState {
            status: PoolStatus::Connected,
            size,
            idle: u32::try_from(self.pool.num_idle()).unwrap_or(u32::MAX),
            min_size: self.pool.options().get_min_connections(),
            max_size: self.pool.options().get_max_connections(),
        }
    }

    async fn health_check(&self) -> bool {
        match ping(&self.pool).await {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "durable store health check failed");
                false
            }
        }
    }

    async fn disconnect(&self) {
        self.pool.close().await;
        info!("durable store connection pool closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_type_has_its_own_table() {
        let tables: std::collections::HashSet<_> =
            TcType::ALL.into_iter().map(table_for).collect();
        assert_eq!(tables.len(), TcType::ALL.len());
        assert_eq!(table_for(TcType::LineSpeed).name(), "tc_4003_speed");
        assert_eq!(table_for(TcType::Schedule).name(), "tc_4000_schedule");
    }

    #[test]
    fn values_map_to_sql_types() {
        assert_eq!(
            sql_value(&FieldValue::Text("C-1".to_string())),
            SqlValue::Text("C-1")
        );
        assert_eq!(sql_value(&FieldValue::Integer(185)), SqlValue::BigInt(185));
        assert_eq!(sql_value(&FieldValue::Decimal(0.45)), SqlValue::Double(0.45));
    }
}
