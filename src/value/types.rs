//! Value types
//!
//! Canonical kinds and decoded values handed to consumers.

use base64::Engine as _;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Canonical kind of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataType {
    /// Native type with no canonical mapping
    #[default]
    Unspecified,
    Bool,
    /// 16-bit signed integer
    Short,
    /// 32-bit signed integer
    Int,
    /// 64-bit signed integer
    Long,
    Float,
    Double,
    /// Exact decimal carried as text
    Decimal,
    /// Calendar day
    Date,
    /// UTC instant with sub-second precision
    DateTime,
    Binary,
    String,
    /// UTF-8 text holding a JSON document
    Json,
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DataType::Unspecified => "UNSPECIFIED",
            DataType::Bool => "BOOL",
            DataType::Short => "SHORT",
            DataType::Int => "INT",
            DataType::Long => "LONG",
            DataType::Float => "FLOAT",
            DataType::Double => "DOUBLE",
            DataType::Decimal => "DECIMAL",
            DataType::Date => "DATE",
            DataType::DateTime => "DATE_TIME",
            DataType::Binary => "BINARY",
            DataType::String => "STRING",
            DataType::Json => "JSON",
        };
        f.write_str(name)
    }
}

/// Precision and scale of a decimal column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecimalParams {
    /// Total number of digits
    pub precision: u32,
    /// Digits after the decimal point
    pub scale: u32,
}

impl DecimalParams {
    /// Create decimal parameters
    pub fn new(precision: u32, scale: u32) -> Self {
        Self { precision, scale }
    }
}

/// A decoded column value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    /// Exact decimal text as produced by the server
    Decimal(String),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
    Binary(Vec<u8>),
    String(String),
    /// Raw JSON document text
    Json(String),
}

impl Value {
    /// Whether this is SQL NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Canonical kind of this value, `None` for NULL
    pub fn kind(&self) -> Option<DataType> {
        let kind = match self {
            Value::Null => return None,
            Value::Bool(_) => DataType::Bool,
            Value::Short(_) => DataType::Short,
            Value::Int(_) => DataType::Int,
            Value::Long(_) => DataType::Long,
            Value::Float(_) => DataType::Float,
            Value::Double(_) => DataType::Double,
            Value::Decimal(_) => DataType::Decimal,
            Value::Date(_) => DataType::Date,
            Value::DateTime(_) => DataType::DateTime,
            Value::Binary(_) => DataType::Binary,
            Value::String(_) => DataType::String,
            Value::Json(_) => DataType::Json,
        };
        Some(kind)
    }

    /// Render as a JSON value for line-oriented output
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Short(n) => JsonValue::from(*n),
            Value::Int(n) => JsonValue::from(*n),
            Value::Long(n) => JsonValue::from(*n),
            // f32 goes through its shortest text form so 1.1 stays 1.1
            Value::Float(f) => float_to_json(f.to_string().parse().unwrap_or(f64::NAN), f),
            Value::Double(d) => float_to_json(*d, d),
            Value::Decimal(s) | Value::String(s) => JsonValue::String(s.clone()),
            Value::Date(d) => JsonValue::String(d.format("%Y-%m-%d").to_string()),
            Value::DateTime(dt) => {
                JsonValue::String(dt.to_rfc3339_opts(SecondsFormat::Micros, true))
            }
            Value::Binary(b) => {
                JsonValue::String(base64::engine::general_purpose::STANDARD.encode(b))
            }
            Value::Json(s) => {
                serde_json::from_str(s).unwrap_or_else(|_| JsonValue::String(s.clone()))
            }
        }
    }
}

fn float_to_json(value: f64, original: &impl ToString) -> JsonValue {
    serde_json::Number::from_f64(value)
        .map_or_else(|| JsonValue::String(original.to_string()), JsonValue::Number)
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i16> for Value {
    fn from(n: i16) -> Self {
        Value::Short(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Long(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

/// A decoded row: column name to value, one entry per emitted column
pub type Row = BTreeMap<String, Value>;
