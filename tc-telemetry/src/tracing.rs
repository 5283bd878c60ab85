use std::io;
use std::sync::Once;

use tc_config::Environment;
use thiserror::Error;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Filter used when `RUST_LOG` is not set.
const DEFAULT_FILTER: &str = "info";

/// Errors raised while installing the global subscriber.
#[derive(Debug, Error)]
pub enum TracingError {
    #[error("failed to determine runtime environment: {0}")]
    Environment(#[source] io::Error),

    #[error("failed to bridge `log` records into tracing: {0}")]
    LogTracer(#[from] tracing_log::log::SetLoggerError),

    #[error("failed to install the global tracing subscriber: {0}")]
    SetGlobalDefault(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Flushes buffered log lines when dropped.
///
/// Keep it alive for the whole lifetime of `main`.
#[must_use = "dropping the flusher stops log output"]
pub struct LogFlusher {
    _guard: WorkerGuard,
}

/// Installs the global tracing subscriber for a binary.
///
/// Development builds print human readable lines, production emits JSON. Both write to
/// stdout through a non-blocking writer.
pub fn init_tracing(app_name: &str) -> Result<LogFlusher, TracingError> {
    let environment = Environment::load().map_err(TracingError::Environment)?;

    tracing_log::LogTracer::init()?;

    let (writer, guard) = tracing_appender::non_blocking(io::stdout());
    let registry = tracing_subscriber::registry().with(env_filter());

    match environment {
        Environment::Prod => {
            let layer = fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(false)
                .with_writer(writer);
            tracing::subscriber::set_global_default(registry.with(layer))?;
        }
        Environment::Dev => {
            let layer = fmt::layer().with_target(true).with_writer(writer);
            tracing::subscriber::set_global_default(registry.with(layer))?;
        }
    }

    info!(app = app_name, environment = %environment, "tracing initialized");

    Ok(LogFlusher { _guard: guard })
}

static INIT_TEST_TRACING: Once = Once::new();

/// Installs a subscriber that writes through the test harness capture.
///
/// Safe to call from every test; only the first call has an effect.
pub fn init_test_tracing() {
    INIT_TEST_TRACING.call_once(|| {
        let subscriber = tracing_subscriber::registry()
            .with(env_filter())
            .with(fmt::layer().with_test_writer());

        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}
