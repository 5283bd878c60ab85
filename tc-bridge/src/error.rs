//! Error types and result definitions for bridge operations.
//!
//! [`BridgeError`] carries a closed [`ErrorKind`] classification, a static description, an
//! optional dynamic detail and source, and the call site where it was raised. Several errors can
//! be aggregated into one, which is used when more than one worker fails during shutdown.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use crate::parser::ParseError;

/// Convenient result type for bridge operations using [`BridgeError`] as the error type.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Detailed payload stored for single [`BridgeError`] instances.
#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Main error type for bridge operations.
#[derive(Debug, Clone)]
pub struct BridgeError {
    repr: ErrorRepr,
}

#[derive(Debug, Clone)]
enum ErrorRepr {
    Single(ErrorPayload),
    /// Multiple aggregated errors, mainly used to capture several worker failures.
    Many {
        errors: Vec<BridgeError>,
        location: &'static Location<'static>,
    },
}

/// Categories of errors raised by the bridge.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Inbound Errors
    ParseFailure,
    ListenerBindFailed,

    // Storage Errors
    CacheWriteFailed,
    DurableConnectionFailed,
    DurableQueryFailed,

    // Outbound Errors
    ForwardFailed,

    // Configuration Errors
    ConfigError,

    // IO & Serialization Errors
    IoError,
    SerializationError,

    // State Errors
    InvalidState,

    // Unknown / Uncategorized
    Unknown,
}

impl BridgeError {
    /// Returns the [`ErrorKind`] of this error.
    ///
    /// For multiple errors, returns the kind of the first error or [`ErrorKind::Unknown`]
    /// if the error list is empty.
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.kind,
            ErrorRepr::Many { ref errors, .. } => errors
                .first()
                .map(|err| err.kind())
                .unwrap_or(ErrorKind::Unknown),
        }
    }

    /// Returns all [`ErrorKind`]s present in this error.
    pub fn kinds(&self) -> Vec<ErrorKind> {
        match self.repr {
            ErrorRepr::Single(ref payload) => vec![payload.kind],
            ErrorRepr::Many { ref errors, .. } => {
                errors.iter().flat_map(|err| err.kinds()).collect()
            }
        }
    }

    /// Returns the detailed error information if available.
    ///
    /// For multiple errors, returns the detail of the first error that has one.
    pub fn detail(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.detail.as_deref(),
            ErrorRepr::Many { ref errors, .. } => errors.iter().find_map(|e| e.detail()),
        }
    }

    /// Returns the captured backtrace for this error.
    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self.repr {
            ErrorRepr::Single(ref payload) => Some(payload.backtrace.as_ref()),
            ErrorRepr::Many { .. } => None,
        }
    }

    /// Returns the captured callsite location for this error.
    pub fn location(&self) -> &'static Location<'static> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.location,
            ErrorRepr::Many { location, .. } => location,
        }
    }

    /// Attaches an originating [`error::Error`] to this error and returns the modified instance.
    ///
    /// Has no effect on aggregated errors, which forward their first error as source.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        if let ErrorRepr::Single(ref mut payload) = self.repr {
            payload.source = Some(Arc::new(source));
        }
        self
    }

    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        BridgeError {
            repr: ErrorRepr::Single(ErrorPayload {
                kind,
                description,
                detail,
                source,
                location: Location::caller(),
                backtrace: Arc::new(Backtrace::capture()),
            }),
        }
    }
}

impl PartialEq for BridgeError {
    fn eq(&self, other: &BridgeError) -> bool {
        match (&self.repr, &other.repr) {
            (ErrorRepr::Single(a), ErrorRepr::Single(b)) => a.kind == b.kind,
            (ErrorRepr::Many { errors: a, .. }, ErrorRepr::Many { errors: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match &self.repr {
            ErrorRepr::Single(payload) => {
                let location = payload.location;
                write!(
                    f,
                    "[{:?}] {} @ {}:{}:{}",
                    payload.kind,
                    payload.description,
                    location.file(),
                    location.line(),
                    location.column()
                )?;

                write_detail(payload.detail.as_deref(), f)?;
                write_backtrace(payload.backtrace.as_ref(), f)?;

                Ok(())
            }
            ErrorRepr::Many { errors, location } => {
                let count = errors.len();
                write!(
                    f,
                    "[Many] {} error{} aggregated @ {}:{}:{}",
                    count,
                    if count == 1 { "" } else { "s" },
                    location.file(),
                    location.line(),
                    location.column()
                )?;

                if errors.is_empty() {
                    write!(f, "\n  (no inner errors provided)")?;
                }

                for (index, error) in errors.iter().enumerate() {
                    let rendered = error.to_string();
                    let mut lines = rendered.lines();
                    match lines.next() {
                        Some(first_line) => write!(f, "\n  {}. {}", index + 1, first_line)?,
                        None => write!(f, "\n  {}.", index + 1)?,
                    }

                    for line in lines {
                        write!(f, "\n     {line}")?;
                    }
                }

                Ok(())
            }
        }
    }
}

impl error::Error for BridgeError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.repr {
            ErrorRepr::Single(payload) => payload
                .source
                .as_ref()
                .map(|source| source.as_ref() as &(dyn error::Error + 'static)),
            ErrorRepr::Many { errors, .. } => errors
                .first()
                .map(|error| error as &(dyn error::Error + 'static)),
        }
    }
}

fn write_backtrace(backtrace: &Backtrace, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if backtrace.status() != BacktraceStatus::Captured {
        return Ok(());
    }

    write!(f, "\n  Backtrace:")?;
    for line in backtrace.to_string().lines() {
        write!(f, "\n    {line}")?;
    }

    Ok(())
}

fn write_detail(detail: Option<&str>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let Some(detail) = detail else {
        return Ok(());
    };

    if detail.trim().is_empty() {
        return write!(f, "\n  Detail: <empty>");
    }

    write!(f, "\n  Detail:")?;
    for line in detail.lines() {
        write!(f, "\n    {line}")?;
    }

    Ok(())
}

/// Creates a [`BridgeError`] from an error kind and static description.
impl From<(ErrorKind, &'static str)> for BridgeError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> BridgeError {
        BridgeError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

/// Creates a [`BridgeError`] from an error kind, static description, and dynamic detail.
impl<D> From<(ErrorKind, &'static str, D)> for BridgeError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> BridgeError {
        BridgeError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

/// Aggregates several errors into one.
///
/// A single error is returned as is.
impl<E> From<Vec<E>> for BridgeError
where
    E: Into<BridgeError>,
{
    #[track_caller]
    fn from(errors: Vec<E>) -> BridgeError {
        let location = Location::caller();

        let mut errors: Vec<BridgeError> = errors.into_iter().map(Into::into).collect();
        if errors.len() == 1 {
            return errors.remove(0);
        }

        BridgeError {
            repr: ErrorRepr::Many { errors, location },
        }
    }
}

impl From<std::io::Error> for BridgeError {
    #[track_caller]
    fn from(err: std::io::Error) -> BridgeError {
        let detail = err.to_string();
        BridgeError::from_components(
            ErrorKind::IoError,
            Cow::Borrowed("I/O operation failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<serde_json::Error> for BridgeError {
    #[track_caller]
    fn from(err: serde_json::Error) -> BridgeError {
        let (kind, description) = match err.classify() {
            serde_json::error::Category::Io => (ErrorKind::IoError, "JSON I/O operation failed"),
            serde_json::error::Category::Syntax
            | serde_json::error::Category::Data
            | serde_json::error::Category::Eof => {
                (ErrorKind::SerializationError, "JSON serialization failed")
            }
        };

        let detail = err.to_string();
        BridgeError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts [`sqlx::Error`] to a [`BridgeError`].
///
/// Pool and I/O level failures are classified as connection failures, everything else as a
/// failed query.
impl From<sqlx::Error> for BridgeError {
    #[track_caller]
    fn from(err: sqlx::Error) -> BridgeError {
        let kind = match &err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolClosed
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::Configuration(_) => ErrorKind::DurableConnectionFailed,
            _ => ErrorKind::DurableQueryFailed,
        };

        let detail = err.to_string();
        BridgeError::from_components(
            kind,
            Cow::Borrowed("Database operation failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<ParseError> for BridgeError {
    #[track_caller]
    fn from(err: ParseError) -> BridgeError {
        let detail = err.to_string();
        BridgeError::from_components(
            ErrorKind::ParseFailure,
            Cow::Borrowed("Payload could not be parsed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}
