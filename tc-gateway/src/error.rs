use std::backtrace::Backtrace;
use std::error::Error;
use std::fmt;

use tc_bridge::error::BridgeError;

/// Returns whether terminal output should include backtraces.
fn should_render_backtrace() -> bool {
    matches!(
        std::env::var("RUST_BACKTRACE").as_deref(),
        Ok("1") | Ok("full")
    )
}

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Captured backtrace wrapper for variants that do not carry their own.
pub struct CapturedBacktrace(Backtrace);

impl CapturedBacktrace {
    fn capture() -> Self {
        Self(Backtrace::capture())
    }
}

impl fmt::Debug for CapturedBacktrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error type of the gateway binary.
#[derive(Debug)]
pub enum GatewayError {
    /// Error raised by the bridge core.
    Bridge(BridgeError),
    /// Configuration, tracing or metrics setup error.
    Config(Box<dyn Error + Send + Sync>, CapturedBacktrace),
    /// I/O error.
    Io(std::io::Error, CapturedBacktrace),
}

impl GatewayError {
    /// Returns a short category label for this error.
    pub fn category(&self) -> &'static str {
        match self {
            GatewayError::Bridge(_) => "bridge error",
            GatewayError::Config(_, _) => "configuration error",
            GatewayError::Io(_, _) => "i/o error",
        }
    }

    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self {
            GatewayError::Bridge(err) => err.backtrace(),
            GatewayError::Config(_, captured) => Some(&captured.0),
            GatewayError::Io(_, captured) => Some(&captured.0),
        }
    }

    /// Creates a configuration error from any error source.
    pub fn config<E: Error + Send + Sync + 'static>(err: E) -> Self {
        GatewayError::Config(Box::new(err), CapturedBacktrace::capture())
    }

    /// Returns a user-oriented report for terminal output.
    pub fn render_report(&self) -> String {
        let mut out = String::new();
        out.push_str("gateway failed\n");
        out.push_str(&format!("category: {}\n", self.category()));
        out.push_str(&format!("error: {self}\n"));

        let mut source = Error::source(self);
        let mut index = 1usize;
        while let Some(err) = source {
            out.push_str(&format!("cause {index}: {err}\n"));
            source = err.source();
            index += 1;
        }

        if should_render_backtrace()
            && let Some(backtrace) = self.backtrace()
        {
            out.push_str("backtrace:\n");
            out.push_str(&backtrace.to_string());
            if !out.ends_with('\n') {
                out.push('\n');
            }
        }

        out
    }
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::Bridge(err) => write!(f, "{err}"),
            GatewayError::Config(source, _) => write!(f, "configuration error: {source}"),
            GatewayError::Io(source, _) => write!(f, "i/o error: {source}"),
        }
    }
}

impl Error for GatewayError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            GatewayError::Bridge(err) => err.source(),
            GatewayError::Config(source, _) => Some(source.as_ref()),
            GatewayError::Io(source, _) => Some(source),
        }
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        GatewayError::Io(err, CapturedBacktrace::capture())
    }
}

impl From<BridgeError> for GatewayError {
    fn from(err: BridgeError) -> Self {
        GatewayError::Bridge(err)
    }
}
