//! Classification of raw TC payloads into typed records.
//!
//! A payload is a delimiter separated line. The first field is the wire code of the record
//! type, the remaining fields follow the type's layout in [`TcType::fields`]. Missing trailing
//! fields take their defaults and surplus fields are ignored.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::types::{TcRecord, TcType};

/// Reasons a payload is rejected as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("payload is empty")]
    Empty,
    #[error("unknown TC type code `{0}`")]
    UnknownType(String),
}

/// Splits payloads on a fixed delimiter.
#[derive(Debug, Clone)]
pub struct RecordParser {
    delimiter: String,
}

impl RecordParser {
    pub fn new(delimiter: impl Into<String>) -> Self {
        Self {
            delimiter: delimiter.into(),
        }
    }

    /// Parses `raw_payload` into a record received at `received_at` from `source_label`.
    ///
    /// Never fails on malformed numeric fields, only on an empty payload or an unknown type
    /// code.
    pub fn parse(
        &self,
        raw_payload: &str,
        source_label: &str,
        received_at: DateTime<Utc>,
    ) -> Result<TcRecord, ParseError> {
        if raw_payload.trim().is_empty() {
            return Err(ParseError::Empty);
        }

        let mut parts = raw_payload.split(self.delimiter.as_str());
        let code = parts.next().unwrap_or_default().trim();
        let record_type =
            TcType::from_code(code).ok_or_else(|| ParseError::UnknownType(code.to_string()))?;

        let fields: BTreeMap<_, _> = record_type
            .fields()
            .iter()
            .zip(parts)
            .map(|(spec, raw)| (spec.name, spec.kind.coerce(raw)))
            .collect();

        Ok(TcRecord::new(
            record_type,
            raw_payload.to_string(),
            fields,
            received_at,
            source_label.to_string(),
        ))
    }
}

impl Default for RecordParser {
    fn default() -> Self {
        Self::new(",")
    }
}
