use std::fmt;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// What an inbound listener does with the messages it receives.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ListenerRole {
    /// Messages are TC records and go through the ingestion pipeline.
    Telemetry,
    /// Messages are acknowledgements from the upstream producer and are only logged.
    Acknowledgement,
}

impl fmt::Display for ListenerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenerRole::Telemetry => f.write_str("telemetry"),
            ListenerRole::Acknowledgement => f.write_str("acknowledgement"),
        }
    }
}

/// A TCP endpoint accepting upstream connections.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct ListenerConfig {
    /// Name used as the prefix of the record source label.
    pub name: String,
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
    #[serde(default = "default_role")]
    pub role: ListenerRole,
    /// Longest accepted message, excluding the line terminator.
    ///
    /// Default: 65536
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,
}

impl ListenerConfig {
    pub const DEFAULT_HOST: &'static str = "0.0.0.0";

    pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 64 * 1024;

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::InvalidFieldValue {
                field: "listeners.name".to_string(),
                constraint: "must not be empty".to_string(),
            });
        }

        if self.max_message_bytes == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: format!("listeners.{}.max_message_bytes", self.name),
                constraint: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    /// Returns the `host:port` string the listener binds to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_host() -> String {
    ListenerConfig::DEFAULT_HOST.to_string()
}

fn default_role() -> ListenerRole {
    ListenerRole::Telemetry
}

fn default_max_message_bytes() -> usize {
    ListenerConfig::DEFAULT_MAX_MESSAGE_BYTES
}
