use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Downstream consumers that receive raw payloads, one optional port per forwarded record type.
///
/// Cut records have no downstream consumer. A forwarded type without a port is not forwarded
/// either.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct ForwardingConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_schedule_port")]
    pub schedule_port: Option<u16>,
    #[serde(default = "default_wpd_pass_port")]
    pub wpd_pass_port: Option<u16>,
    #[serde(default = "default_line_speed_port")]
    pub line_speed_port: Option<u16>,
    /// Default: 3000
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Default: 3000
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
}

impl ForwardingConfig {
    pub const DEFAULT_HOST: &'static str = "127.0.0.1";

    pub const DEFAULT_SCHEDULE_PORT: u16 = 9308;

    pub const DEFAULT_WPD_PASS_PORT: u16 = 9309;

    pub const DEFAULT_LINE_SPEED_PORT: u16 = 9310;

    pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 3_000;

    pub const DEFAULT_WRITE_TIMEOUT_MS: u64 = 3_000;

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.host.trim().is_empty() {
            return Err(ValidationError::InvalidFieldValue {
                field: "forwarding.host".to_string(),
                constraint: "must not be empty".to_string(),
            });
        }

        if self.connect_timeout_ms == 0 || self.write_timeout_ms == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "forwarding.connect_timeout_ms/write_timeout_ms".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for ForwardingConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            schedule_port: default_schedule_port(),
            wpd_pass_port: default_wpd_pass_port(),
            line_speed_port: default_line_speed_port(),
            connect_timeout_ms: Self::DEFAULT_CONNECT_TIMEOUT_MS,
            write_timeout_ms: Self::DEFAULT_WRITE_TIMEOUT_MS,
        }
    }
}

fn default_host() -> String {
    ForwardingConfig::DEFAULT_HOST.to_string()
}

fn default_schedule_port() -> Option<u16> {
    Some(ForwardingConfig::DEFAULT_SCHEDULE_PORT)
}

fn default_wpd_pass_port() -> Option<u16> {
    Some(ForwardingConfig::DEFAULT_WPD_PASS_PORT)
}

fn default_line_speed_port() -> Option<u16> {
    Some(ForwardingConfig::DEFAULT_LINE_SPEED_PORT)
}

fn default_connect_timeout_ms() -> u64 {
    ForwardingConfig::DEFAULT_CONNECT_TIMEOUT_MS
}

fn default_write_timeout_ms() -> u64 {
    ForwardingConfig::DEFAULT_WRITE_TIMEOUT_MS
}
