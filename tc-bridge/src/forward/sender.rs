use std::fmt;
use std::future::Future;

use serde::Serialize;

use crate::error::BridgeResult;

/// A downstream consumer endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Destination {
    pub host: String,
    pub port: u16,
}

impl Destination {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Transport used to deliver raw payloads to downstream consumers.
pub trait RecordSender {
    /// Delivers `payload` to `destination` as a single short lived transmission.
    fn send(
        &self,
        destination: &Destination,
        payload: &[u8],
    ) -> impl Future<Output = BridgeResult<()>> + Send;

    /// Returns `false` once the sender can no longer deliver payloads.
    fn is_healthy(&self) -> bool;

    /// Stops accepting new sends.
    fn close(&self) -> impl Future<Output = ()> + Send;
}
