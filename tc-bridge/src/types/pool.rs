use serde::Serialize;

/// Connectivity of the durable store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolStatus {
    Connected,
    Disconnected,
}

/// Snapshot of the durable store connection pool, derived on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectionPoolState {
    pub status: PoolStatus,
    /// Open connections, idle or in use.
    pub size: u32,
    pub idle: u32,
    pub min_size: u32,
    pub max_size: u32,
}

impl ConnectionPoolState {
    pub fn disconnected() -> Self {
        Self {
            status: PoolStatus::Disconnected,
            size: 0,
            idle: 0,
            min_size: 0,
            max_size: 0,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status == PoolStatus::Connected
    }
}
