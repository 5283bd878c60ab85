//! Shared configuration types for the TC gateway.

mod base;
mod connection;
mod forwarding;
mod gateway;
mod listener;
mod pipeline;
mod pool;

pub use base::ValidationError;
pub use connection::{
    IntoConnectOptions, PgConnectionConfig, PgConnectionConfigWithoutSecrets, PgConnectionOptions,
    TlsConfig,
};
pub use forwarding::ForwardingConfig;
pub use gateway::{GatewayConfig, GatewayConfigWithoutSecrets};
pub use listener::{ListenerConfig, ListenerRole};
pub use pipeline::{CacheConfig, MonitorConfig, ParserConfig, TelemetryConfig};
pub use pool::PoolConfig;
