use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Name of the field identifying a coil, present on schedule, cut and WPD pass records.
pub const COIL_NUMBER_FIELD: &str = "coil_number";

/// Closed set of TC record types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TcType {
    /// Coil schedule, wire code `4000`.
    Schedule,
    /// Cut event, wire code `4001`.
    Cut,
    /// Weld point detector pass, wire code `4002`.
    WpdPass,
    /// Line speed sample, wire code `4003`.
    LineSpeed,
}

impl TcType {
    pub const ALL: [TcType; 4] = [
        TcType::Schedule,
        TcType::Cut,
        TcType::WpdPass,
        TcType::LineSpeed,
    ];

    /// Returns the wire code of the type.
    pub fn code(&self) -> u16 {
        match self {
            TcType::Schedule => 4000,
            TcType::Cut => 4001,
            TcType::WpdPass => 4002,
            TcType::LineSpeed => 4003,
        }
    }

    /// Classifies a wire code, `None` when it is not a known type.
    pub fn from_code(code: &str) -> Option<TcType> {
        match code.trim().parse::<u16>().ok()? {
            4000 => Some(TcType::Schedule),
            4001 => Some(TcType::Cut),
            4002 => Some(TcType::WpdPass),
            4003 => Some(TcType::LineSpeed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TcType::Schedule => "schedule",
            TcType::Cut => "cut",
            TcType::WpdPass => "wpd_pass",
            TcType::LineSpeed => "line_speed",
        }
    }

    /// Returns the ordered field layout of the type, header fields first.
    pub fn fields(&self) -> &'static [FieldSpec] {
        match self {
            TcType::Schedule => SCHEDULE_FIELDS,
            TcType::Cut => CUT_FIELDS,
            TcType::WpdPass => WPD_PASS_FIELDS,
            TcType::LineSpeed => LINE_SPEED_FIELDS,
        }
    }

    /// Returns `true` if records of this type identify a coil.
    pub fn has_coil_number(&self) -> bool {
        match self {
            TcType::Schedule | TcType::Cut | TcType::WpdPass => true,
            TcType::LineSpeed => false,
        }
    }
}

impl fmt::Display for TcType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TcType {
    type Err = String;

    /// Accepts either the snake case name or the wire code.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(record_type) = TcType::from_code(s) {
            return Ok(record_type);
        }

        TcType::ALL
            .into_iter()
            .find(|record_type| record_type.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!("`{s}` is not a TC record type, use one of schedule, cut, wpd_pass, line_speed or 4000-4003")
            })
    }
}

/// Value type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Decimal,
}

impl FieldKind {
    /// Returns the value used when a field is absent.
    pub fn default_value(&self) -> FieldValue {
        match self {
            FieldKind::Text => FieldValue::Text(String::new()),
            FieldKind::Integer => FieldValue::Integer(0),
            FieldKind::Decimal => FieldValue::Decimal(0.0),
        }
    }

    /// Converts raw text into a value of this kind.
    ///
    /// Unparsable numbers become the default value.
    pub fn coerce(&self, raw: &str) -> FieldValue {
        let raw = raw.trim();
        match self {
            FieldKind::Text => FieldValue::Text(raw.to_string()),
            FieldKind::Integer => FieldValue::Integer(coerce_integer(raw)),
            FieldKind::Decimal => FieldValue::Decimal(
                raw.parse::<f64>()
                    .ok()
                    .filter(|value| value.is_finite())
                    .unwrap_or(0.0),
            ),
        }
    }
}

/// Parses an integer, accepting decimal notation with an integral value such as `1200.0`.
///
/// Values outside the `i64` range take the default instead of saturating.
fn coerce_integer(raw: &str) -> i64 {
    if let Ok(value) = raw.parse::<i64>() {
        return value;
    }

    match raw.parse::<f64>() {
        Ok(value)
            if value.fract() == 0.0 && value >= i64::MIN as f64 && value < i64::MAX as f64 =>
        {
            value as i64
        }
        _ => 0,
    }
}

/// Name and kind of a record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

const fn text(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::Text,
    }
}

const fn integer(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::Integer,
    }
}

const fn decimal(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::Decimal,
    }
}

const SCHEDULE_FIELDS: &[FieldSpec] = &[
    text("line_code"),
    text("sequence_no"),
    integer("length"),
    text("date"),
    text("time"),
    text("spare"),
    text(COIL_NUMBER_FIELD),
    text("mo_number"),
    text("product_group"),
    text("material_code"),
    text("customer_name"),
    text("ccl_bom"),
    decimal("thickness"),
    integer("width"),
    integer("weight"),
    integer("length_value"),
    text("through_plate"),
    integer("sequence_order"),
];

const CUT_FIELDS: &[FieldSpec] = &[
    text("line_code"),
    text("sequence_no"),
    integer("length"),
    text("date"),
    text("time"),
    text("spare"),
    text(COIL_NUMBER_FIELD),
    integer("cut_mode"),
    integer("winding_length"),
];

const WPD_PASS_FIELDS: &[FieldSpec] = &[
    text("line_code"),
    text("sequence_no"),
    integer("length"),
    text("date"),
    text("time"),
    text("spare"),
    text(COIL_NUMBER_FIELD),
];

const LINE_SPEED_FIELDS: &[FieldSpec] = &[
    text("line_code"),
    text("sequence_no"),
    integer("length"),
    text("date"),
    text("time"),
    text("spare"),
    integer("line_speed"),
];

/// A typed field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Decimal(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(integer) => Some(*integer),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<f64> {
        match self {
            FieldValue::Decimal(decimal) => Some(*decimal),
            _ => None,
        }
    }
}

/// A classified TC record.
///
/// Immutable once built; `fields` always holds exactly the field set of `record_type`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TcRecord {
    record_type: TcType,
    raw_payload: String,
    fields: BTreeMap<&'static str, FieldValue>,
    received_at: DateTime<Utc>,
    source_label: String,
}

impl TcRecord {
    /// Builds a record, filling every field missing from `fields` with its default.
    ///
    /// Entries whose name is not part of the type's layout are dropped.
    pub fn new(
        record_type: TcType,
        raw_payload: String,
        mut fields: BTreeMap<&'static str, FieldValue>,
        received_at: DateTime<Utc>,
        source_label: String,
    ) -> Self {
        let fields = record_type
            .fields()
            .iter()
            .map(|spec| {
                let value = fields
                    .remove(spec.name)
                    .unwrap_or_else(|| spec.kind.default_value());
                (spec.name, value)
            })
            .collect();

        Self {
            record_type,
            raw_payload,
            fields,
            received_at,
            source_label,
        }
    }

    pub fn record_type(&self) -> TcType {
        self.record_type
    }

    /// Returns the payload exactly as received.
    pub fn raw_payload(&self) -> &str {
        &self.raw_payload
    }

    pub fn fields(&self) -> &BTreeMap<&'static str, FieldValue> {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub fn source_label(&self) -> &str {
        &self.source_label
    }

    /// Returns the coil number for record types that carry one.
    pub fn coil_number(&self) -> Option<&str> {
        if !self.record_type.has_coil_number() {
            return None;
        }

        self.field(COIL_NUMBER_FIELD).and_then(FieldValue::as_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip_through_classification() {
        for record_type in TcType::ALL {
            assert_eq!(
                TcType::from_code(&record_type.code().to_string()),
                Some(record_type)
            );
        }
        assert_eq!(TcType::from_code(" 4003 "), Some(TcType::LineSpeed));
        assert_eq!(TcType::from_code("4004"), None);
        assert_eq!(TcType::from_code("abc"), None);
    }

    #[test]
    fn types_parse_from_names_and_codes() {
        assert_eq!("wpd_pass".parse::<TcType>(), Ok(TcType::WpdPass));
        assert_eq!("LINE_SPEED".parse::<TcType>(), Ok(TcType::LineSpeed));
        assert_eq!("4000".parse::<TcType>(), Ok(TcType::Schedule));
        assert!("coil".parse::<TcType>().is_err());
    }

    #[test]
    fn field_layouts_have_expected_sizes() {
        assert_eq!(TcType::Schedule.fields().len(), 18);
        assert_eq!(TcType::Cut.fields().len(), 9);
        assert_eq!(TcType::WpdPass.fields().len(), 7);
        assert_eq!(TcType::LineSpeed.fields().len(), 7);
    }

    #[test]
    fn numeric_coercion_falls_back_to_defaults() {
        assert_eq!(FieldKind::Integer.coerce(" 185 "), FieldValue::Integer(185));
        assert_eq!(FieldKind::Integer.coerce("1200.0"), FieldValue::Integer(1200));
        assert_eq!(FieldKind::Integer.coerce("12.5"), FieldValue::Integer(0));
        assert_eq!(FieldKind::Integer.coerce("fast"), FieldValue::Integer(0));
        assert_eq!(
            FieldKind::Integer.coerce("99999999999999999999"),
            FieldValue::Integer(0)
        );
        assert_eq!(FieldKind::Integer.coerce("1e300"), FieldValue::Integer(0));
        assert_eq!(FieldKind::Integer.coerce("-1e30"), FieldValue::Integer(0));
        assert_eq!(FieldKind::Integer.coerce("inf"), FieldValue::Integer(0));
        assert_eq!(
            FieldKind::Integer.coerce("-9223372036854775808"),
            FieldValue::Integer(i64::MIN)
        );
        assert_eq!(FieldKind::Decimal.coerce("0.45"), FieldValue::Decimal(0.45));
        assert_eq!(FieldKind::Decimal.coerce("NaN"), FieldValue::Decimal(0.0));
        assert_eq!(FieldKind::Decimal.coerce(""), FieldValue::Decimal(0.0));
        assert_eq!(
            FieldKind::Text.coerce(" C-1 "),
            FieldValue::Text("C-1".to_string())
        );
    }

    #[test]
    fn new_record_fills_missing_fields_and_drops_unknown_ones() {
        let mut fields = BTreeMap::new();
        fields.insert("line_speed", FieldValue::Integer(185));
        fields.insert("coil_number", FieldValue::Text("C-1".to_string()));

        let record = TcRecord::new(
            TcType::LineSpeed,
            "4003".to_string(),
            fields,
            Utc::now(),
            "test".to_string(),
        );

        assert_eq!(record.fields().len(), 7);
        assert_eq!(record.field("line_speed"), Some(&FieldValue::Integer(185)));
        assert_eq!(record.field("length"), Some(&FieldValue::Integer(0)));
        assert_eq!(record.field("date"), Some(&FieldValue::Text(String::new())));
        assert_eq!(record.field("coil_number"), None);
        assert_eq!(record.coil_number(), None);
    }
}
