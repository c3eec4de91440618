// ── Decoded telemetry records ──

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::{Display, EnumString};

use super::value::FieldValue;

/// Field injected with the device serial when a payload lacks one.
pub const SERIAL_FIELD: &str = "serial_number";
/// Field injected with the receipt time when a payload lacks one.
pub const TIMESTAMP_FIELD: &str = "timestamp";

const COLUMN_PREFIX: &str = "eco_";

/// Which decoder path produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RecordSource {
    /// JSON property report.
    Json,
    /// Binary inverter heartbeat (command 1).
    Heartbeat,
    /// One element of a binary power-stream batch (command 32).
    PowerStream,
}

/// One decoded telemetry message for one device.
///
/// Fields are kept sorted by name so storage projection and output are
/// stable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryRecord {
    pub serial: String,
    pub timestamp: DateTime<Utc>,
    pub source: RecordSource,
    pub fields: BTreeMap<String, FieldValue>,
}

impl TelemetryRecord {
    pub fn new(serial: impl Into<String>, timestamp: DateTime<Utc>, source: RecordSource) -> Self {
        Self {
            serial: serial.into(),
            timestamp,
            source,
            fields: BTreeMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Add `serial_number` and `timestamp` unless the payload already
    /// carries them.
    pub(crate) fn inject_routing_fields(&mut self) {
        self.fields
            .entry(SERIAL_FIELD.to_owned())
            .or_insert_with(|| FieldValue::String(self.serial.clone()));
        self.fields
            .entry(TIMESTAMP_FIELD.to_owned())
            .or_insert(FieldValue::Timestamp(self.timestamp));
    }

    /// Project into storage columns.
    ///
    /// Column names are `eco_` plus the field name with `.` replaced by
    /// `_`, in field-name order. Integral floats become integers and
    /// composites become JSON text.
    pub fn columns(&self) -> Vec<Column> {
        self.fields
            .iter()
            .map(|(name, value)| Column {
                name: column_name(name),
                value: ColumnValue::from(value),
            })
            .collect()
    }
}

/// Storage column name for a field.
pub fn column_name(field: &str) -> String {
    format!("{COLUMN_PREFIX}{}", field.replace('.', "_"))
}

// ── Storage projection ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub value: ColumnValue,
}

/// Column value as a storage collaborator receives it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ColumnValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
}

impl From<&FieldValue> for ColumnValue {
    fn from(value: &FieldValue) -> Self {
        match value {
            FieldValue::String(s) => Self::Text(s.clone()),
            FieldValue::Integer(i) => Self::Integer(*i),
            FieldValue::Float(f) => integral(*f).map_or(Self::Float(*f), Self::Integer),
            FieldValue::Bool(b) => Self::Bool(*b),
            FieldValue::Timestamp(t) => Self::Timestamp(*t),
            FieldValue::Composite(v) => Self::Text(v.to_string()),
        }
    }
}

/// `Some` when `f` has no fractional part and fits an `i64`.
#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
pub(crate) fn integral(f: f64) -> Option<i64> {
    // 2^63 is exactly representable; anything at or past it overflows i64.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if f.is_finite() && f.trunc() == f && (-LIMIT..LIMIT).contains(&f) {
        Some(f as i64)
    } else {
        None
    }
}
