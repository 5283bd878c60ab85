use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::Config;
use crate::shared::{
    CacheConfig, ForwardingConfig, ListenerConfig, ListenerRole, MonitorConfig, ParserConfig,
    PgConnectionConfig, PgConnectionConfigWithoutSecrets, PoolConfig, TelemetryConfig,
    ValidationError,
};

/// Complete configuration for the gateway service.
///
/// This intentionally does not implement [`Serialize`] to avoid accidentally
/// leaking secrets in the config into serialized forms.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Durable store connection.
    pub database: PgConnectionConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    /// Inbound TCP endpoints.
    pub listeners: Vec<ListenerConfig>,
    #[serde(default)]
    pub forwarding: ForwardingConfig,
    #[serde(default)]
    pub parser: ParserConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl GatewayConfig {
    /// Validates every section of the configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.database.validate()?;
        self.pool.validate()?;
        self.forwarding.validate()?;
        self.parser.validate()?;
        self.cache.validate()?;
        self.monitor.validate()?;

        let mut names = HashSet::new();
        for listener in &self.listeners {
            listener.validate()?;
            if !names.insert(listener.name.as_str()) {
                return Err(ValidationError::DuplicateListenerName(
                    listener.name.clone(),
                ));
            }
        }

        if !self
            .listeners
            .iter()
            .any(|listener| listener.role == ListenerRole::Telemetry)
        {
            return Err(ValidationError::NoTelemetryListener);
        }

        Ok(())
    }
}

impl Config for GatewayConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}

/// Same as [`GatewayConfig`] but without secrets, safe to log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfigWithoutSecrets {
    pub database: PgConnectionConfigWithoutSecrets,
    pub pool: PoolConfig,
    pub listeners: Vec<ListenerConfig>,
    pub forwarding: ForwardingConfig,
    pub parser: ParserConfig,
    pub cache: CacheConfig,
    pub monitor: MonitorConfig,
    pub telemetry: TelemetryConfig,
}

impl From<GatewayConfig> for GatewayConfigWithoutSecrets {
    fn from(value: GatewayConfig) -> Self {
        GatewayConfigWithoutSecrets {
            database: value.database.into(),
            pool: value.pool,
            listeners: value.listeners,
            forwarding: value.forwarding,
            parser: value.parser,
            cache: value.cache,
            monitor: value.monitor,
            telemetry: value.telemetry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
database:
  host: localhost
  port: 5432
  name: ccl_sdd_system
  username: postgres
  password: password
listeners:
  - name: dongkook
    port: 9304
  - name: gogi_ack
    port: 9306
    role: acknowledgement
"#;

    fn parse(source: &str) -> GatewayConfig {
        config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let config = parse(MINIMAL);

        assert_eq!(config.pool, PoolConfig::default());
        assert_eq!(config.forwarding.schedule_port, Some(9308));
        assert_eq!(config.forwarding.wpd_pass_port, Some(9309));
        assert_eq!(config.forwarding.line_speed_port, Some(9310));
        assert_eq!(config.parser.delimiter, ",");
        assert_eq!(config.monitor.interval_ms, 30_000);
        assert_eq!(config.cache.max_records_per_type, None);
        assert_eq!(config.telemetry.metrics_port, None);
        assert_eq!(config.listeners[0].role, ListenerRole::Telemetry);
        assert_eq!(config.listeners[0].host, "0.0.0.0");
        assert_eq!(config.listeners[1].role, ListenerRole::Acknowledgement);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn duplicate_listener_names_are_rejected() {
        let mut config = parse(MINIMAL);
        config.listeners[1].name = "dongkook".to_string();

        assert!(matches!(
            config.validate(),
            Err(ValidationError::DuplicateListenerName(name)) if name == "dongkook"
        ));
    }

    #[test]
    fn acknowledgement_only_listeners_are_rejected() {
        let mut config = parse(MINIMAL);
        config.listeners.remove(0);

        assert!(matches!(
            config.validate(),
            Err(ValidationError::NoTelemetryListener)
        ));
    }

    #[test]
    fn without_secrets_serializes_without_password() {
        let config: GatewayConfigWithoutSecrets = parse(MINIMAL).into();
        let rendered = serde_json::to_string(&config).unwrap();

        assert!(rendered.contains("ccl_sdd_system"));
        assert!(!rendered.contains("password"));
    }
}
