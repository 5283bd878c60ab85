use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// TLS is enabled but no trusted root certificates are provided.
    #[error("Invalid TLS config: `trusted_root_certs` must be set when `enabled` is true")]
    MissingTrustedRootCerts,
    /// No listener feeds records into the pipeline.
    #[error("at least one listener with role `telemetry` must be configured")]
    NoTelemetryListener,
    /// Two listeners share the same name.
    #[error("listener name `{0}` is used more than once")]
    DuplicateListenerName(String),
    /// A field holds a value outside of its allowed range.
    #[error("invalid value for `{field}`: {constraint}")]
    InvalidFieldValue { field: String, constraint: String },
}
