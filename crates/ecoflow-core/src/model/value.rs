// ── Typed telemetry values ──

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Number, Value};

/// One decoded telemetry field.
///
/// Nested JSON objects and arrays are kept as [`Composite`](Self::Composite)
/// and rendered as JSON text when projected into storage columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
    Composite(Value),
}

impl FieldValue {
    /// Convert a JSON value. `null` carries nothing and yields `None`.
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(b) => Some(Self::Bool(b)),
            Value::Number(n) => Some(Self::from_number(&n)),
            Value::String(s) => Some(Self::String(s)),
            composite @ (Value::Array(_) | Value::Object(_)) => Some(Self::Composite(composite)),
        }
    }

    fn from_number(n: &Number) -> Self {
        if let Some(i) = n.as_i64() {
            Self::Integer(i)
        } else if let Some(i) = n.as_u64().and_then(|u| i64::try_from(u).ok()) {
            Self::Integer(i)
        } else {
            Self::Float(n.as_f64().unwrap_or(f64::NAN))
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}
