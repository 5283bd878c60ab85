use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgConnectOptions as SqlxConnectOptions, PgSslMode as SqlxSslMode};

use crate::Config;
use crate::shared::ValidationError;

const COMMON_DATESTYLE: &str = "ISO";
const COMMON_CLIENT_ENCODING: &str = "UTF8";
const COMMON_TIMEZONE: &str = "UTC";

const APP_NAME_GATEWAY: &str = "tc_gateway";

/// Session settings applied to every connection opened against the durable store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PgConnectionOptions {
    pub datestyle: String,
    pub client_encoding: String,
    pub timezone: String,
    /// Per-statement timeout in milliseconds, `0` disables it.
    pub statement_timeout: u64,
    pub application_name: String,
}

impl PgConnectionOptions {
    /// Builds the gateway session options with the given command timeout.
    pub fn gateway(command_timeout_ms: u64) -> Self {
        Self {
            datestyle: COMMON_DATESTYLE.to_string(),
            client_encoding: COMMON_CLIENT_ENCODING.to_string(),
            timezone: COMMON_TIMEZONE.to_string(),
            statement_timeout: command_timeout_ms,
            application_name: APP_NAME_GATEWAY.to_string(),
        }
    }

    pub fn to_key_value_pairs(&self) -> Vec<(String, String)> {
        vec![
            ("datestyle".to_string(), self.datestyle.clone()),
            ("client_encoding".to_string(), self.client_encoding.clone()),
            ("timezone".to_string(), self.timezone.clone()),
            (
                "statement_timeout".to_string(),
                self.statement_timeout.to_string(),
            ),
            ("application_name".to_string(), self.application_name.clone()),
        ]
    }
}

/// Connection parameters of the durable store.
#[derive(Debug, Clone, Deserialize)]
pub struct PgConnectionConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub username: String,
    pub password: Option<SecretString>,
    #[serde(default = "TlsConfig::disabled")]
    pub tls: TlsConfig,
}

impl PgConnectionConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.tls.validate()
    }
}

impl Config for PgConnectionConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PgConnectionConfigWithoutSecrets {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub username: String,
    pub tls: TlsConfig,
}

impl From<PgConnectionConfig> for PgConnectionConfigWithoutSecrets {
    fn from(value: PgConnectionConfig) -> Self {
        PgConnectionConfigWithoutSecrets {
            host: value.host,
            port: value.port,
            name: value.name,
            username: value.username,
            tls: value.tls,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    pub trusted_root_certs: String,
    pub enabled: bool,
}

impl TlsConfig {
    pub fn disabled() -> Self {
        Self {
            trusted_root_certs: "".to_string(),
            enabled: false,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.enabled && self.trusted_root_certs.is_empty() {
            return Err(ValidationError::MissingTrustedRootCerts);
        }

        Ok(())
    }
}

pub trait IntoConnectOptions<Output> {
    fn without_db(&self, options: Option<&PgConnectionOptions>) -> Output;
    fn with_db(&self, options: Option<&PgConnectionOptions>) -> Output;
}

impl IntoConnectOptions<SqlxConnectOptions> for PgConnectionConfig {
    fn without_db(&self, options: Option<&PgConnectionOptions>) -> SqlxConnectOptions {
        let ssl_mode = if self.tls.enabled {
            SqlxSslMode::VerifyFull
        } else {
            SqlxSslMode::Prefer
        };
        let mut connect_options = SqlxConnectOptions::new_without_pgpass()
            .host(&self.host)
            .username(&self.username)
            .port(self.port)
            .ssl_mode(ssl_mode);

        if self.tls.enabled {
            connect_options = connect_options
                .ssl_root_cert_from_pem(self.tls.trusted_root_certs.clone().into_bytes());
        }

        if let Some(password) = &self.password {
            connect_options = connect_options.password(password.expose_secret());
        }

        if let Some(opts) = options {
            connect_options = connect_options.options(opts.to_key_value_pairs());
        }

        connect_options
    }

    fn with_db(&self, options: Option<&PgConnectionOptions>) -> SqlxConnectOptions {
        let connect_options: SqlxConnectOptions = self.without_db(options);
        connect_options.database(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PgConnectionConfig {
        PgConnectionConfig {
            host: "localhost".to_string(),
            port: 5432,
            name: "ccl_sdd_system".to_string(),
            username: "postgres".to_string(),
            password: Some(SecretString::from("password")),
            tls: TlsConfig::disabled(),
        }
    }

    #[test]
    fn gateway_options_carry_command_timeout() {
        let options = PgConnectionOptions::gateway(60_000);
        let pairs = options.to_key_value_pairs();

        assert!(pairs.contains(&("statement_timeout".to_string(), "60000".to_string())));
        assert!(pairs.contains(&("application_name".to_string(), "tc_gateway".to_string())));
        assert!(pairs.contains(&("timezone".to_string(), "UTC".to_string())));
    }

    #[test]
    fn debug_output_redacts_password() {
        let rendered = format!("{:?}", config());
        assert!(!rendered.contains("\"password\""));
        assert!(rendered.contains("ccl_sdd_system"));
    }

    #[test]
    fn tls_without_certificates_is_rejected() {
        let mut config = config();
        config.tls.enabled = true;

        assert!(matches!(
            config.validate(),
            Err(ValidationError::MissingTrustedRootCerts)
        ));
    }

    #[test]
    fn with_db_sets_database_name() {
        let options: SqlxConnectOptions = config().with_db(None);
        assert_eq!(options.get_database(), Some("ccl_sdd_system"));
        assert_eq!(options.get_port(), 5432);
    }
}
