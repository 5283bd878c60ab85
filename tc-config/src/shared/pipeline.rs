use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Payload splitting settings.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct ParserConfig {
    /// Field separator of the upstream payload.
    ///
    /// Default: ","
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
}

impl ParserConfig {
    pub const DEFAULT_DELIMITER: &'static str = ",";

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.delimiter.is_empty() {
            return Err(ValidationError::InvalidFieldValue {
                field: "parser.delimiter".to_string(),
                constraint: "must not be empty".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
        }
    }
}

fn default_delimiter() -> String {
    ParserConfig::DEFAULT_DELIMITER.to_string()
}

/// In-process cache settings.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct CacheConfig {
    /// Records kept per type, oldest dropped first. Unbounded when `None`.
    #[serde(default)]
    pub max_records_per_type: Option<usize>,
}

impl CacheConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_records_per_type == Some(0) {
            return Err(ValidationError::InvalidFieldValue {
                field: "cache.max_records_per_type".to_string(),
                constraint: "must be greater than 0 when set".to_string(),
            });
        }

        Ok(())
    }
}

/// Health monitor settings.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Interval in milliseconds between health samples.
    ///
    /// Default: 30000 (30 seconds)
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

impl MonitorConfig {
    pub const DEFAULT_INTERVAL_MS: u64 = 30_000;

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.interval_ms == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "monitor.interval_ms".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_ms: Self::DEFAULT_INTERVAL_MS,
        }
    }
}

fn default_interval_ms() -> u64 {
    MonitorConfig::DEFAULT_INTERVAL_MS
}

/// Observability settings.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Port of the Prometheus scrape endpoint. Metrics are not exported when `None`.
    #[serde(default)]
    pub metrics_port: Option<u16>,
}
