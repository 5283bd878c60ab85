use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Sizing and timeouts of the durable store connection pool.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct PoolConfig {
    /// Connections kept open while idle.
    ///
    /// Default: 2
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Upper bound on concurrently open connections.
    ///
    /// Default: 10
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Time in milliseconds to wait for a free connection (or for the first connect).
    ///
    /// Default: 5000
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,

    /// Per-statement timeout in milliseconds.
    ///
    /// Default: 60000
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
}

impl PoolConfig {
    pub const DEFAULT_MIN_CONNECTIONS: u32 = 2;

    pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

    pub const DEFAULT_ACQUIRE_TIMEOUT_MS: u64 = 5_000;

    pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 60_000;

    /// Validates the pool configuration.
    ///
    /// Ensures `max_connections` is non-zero and not below `min_connections`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_connections == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "max_connections".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        if self.min_connections > self.max_connections {
            return Err(ValidationError::InvalidFieldValue {
                field: "min_connections".to_string(),
                constraint: "must be <= max_connections".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_connections: Self::DEFAULT_MIN_CONNECTIONS,
            max_connections: Self::DEFAULT_MAX_CONNECTIONS,
            acquire_timeout_ms: Self::DEFAULT_ACQUIRE_TIMEOUT_MS,
            command_timeout_ms: Self::DEFAULT_COMMAND_TIMEOUT_MS,
        }
    }
}

fn default_min_connections() -> u32 {
    PoolConfig::DEFAULT_MIN_CONNECTIONS
}

fn default_max_connections() -> u32 {
    PoolConfig::DEFAULT_MAX_CONNECTIONS
}

fn default_acquire_timeout_ms() -> u64 {
    PoolConfig::DEFAULT_ACQUIRE_TIMEOUT_MS
}

fn default_command_timeout_ms() -> u64 {
    PoolConfig::DEFAULT_COMMAND_TIMEOUT_MS
}
