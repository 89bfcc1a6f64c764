use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::fmt;

use crate::utils::time::{format_timestamp, from_epoch_seconds, parse_timestamp};

/// Semantic type of a metadata attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    String,
    Float,
    Integer,
    Boolean,
    StringList,
    Timestamp,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Float => "float",
            ValueType::Integer => "integer",
            ValueType::Boolean => "boolean",
            ValueType::StringList => "string_list",
            ValueType::Timestamp => "timestamp",
        }
    }

    /// Accepts the spellings used in standards tables (`str`, `int`, `bool`, ...).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "str" | "string" => Some(ValueType::String),
            "float" | "double" => Some(ValueType::Float),
            "int" | "integer" => Some(ValueType::Integer),
            "bool" | "boolean" => Some(ValueType::Boolean),
            "list" | "string_list" | "name_list" => Some(ValueType::StringList),
            "timestamp" | "date_time" | "datetime" => Some(ValueType::Timestamp),
            _ => None,
        }
    }

    /// Convert a raw JSON value into this type, returning `None` when it does
    /// not fit. Strings are parsed for every non-string type because text
    /// inputs arrive untyped. A string attribute only takes a JSON string.
    pub fn coerce(&self, raw: &Value) -> Option<MetadataValue> {
        match (self, raw) {
            (_, Value::Null) => None,

            (ValueType::String, Value::String(s)) => Some(MetadataValue::String(s.clone())),

            (ValueType::Float, Value::Number(n)) => n
                .as_f64()
                .filter(|f| f.is_finite())
                .map(MetadataValue::Float),
            (ValueType::Float, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(MetadataValue::Float),

            (ValueType::Integer, Value::Number(n)) => n
                .as_i64()
                .or_else(|| {
                    n.as_f64()
                        .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                        .map(|f| f as i64)
                })
                .map(MetadataValue::Integer),
            (ValueType::Integer, Value::String(s)) => {
                s.trim().parse::<i64>().ok().map(MetadataValue::Integer)
            }

            (ValueType::Boolean, Value::Bool(b)) => Some(MetadataValue::Boolean(*b)),
            (ValueType::Boolean, Value::String(s)) => match s.trim().to_lowercase().as_str() {
                "true" => Some(MetadataValue::Boolean(true)),
                "false" => Some(MetadataValue::Boolean(false)),
                _ => None,
            },

            (ValueType::StringList, Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect::<Option<Vec<_>>>()
                .map(MetadataValue::StringList),
            (ValueType::StringList, Value::String(s)) => Some(MetadataValue::StringList(split_list(s))),

            (ValueType::Timestamp, Value::String(s)) => {
                parse_timestamp(s).ok().map(MetadataValue::Timestamp)
            }
            (ValueType::Timestamp, Value::Number(n)) => n
                .as_f64()
                .and_then(|secs| from_epoch_seconds(secs).ok())
                .map(MetadataValue::Timestamp),

            _ => None,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Split a comma separated list, dropping empty entries.
pub fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// A typed metadata value.
///
/// `Json` holds undeclared (non-standard) values whose shape does not map onto
/// one of the schema types, so they survive a round trip untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    String(String),
    Float(f64),
    Integer(i64),
    Boolean(bool),
    StringList(Vec<String>),
    Timestamp(DateTime<Utc>),
    Json(Value),
}

impl MetadataValue {
    /// Best-effort typing for a value that has no descriptor.
    pub fn infer(raw: &Value) -> Option<Self> {
        match raw {
            Value::Null => None,
            Value::String(s) => Some(MetadataValue::String(s.clone())),
            Value::Bool(b) => Some(MetadataValue::Boolean(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(MetadataValue::Integer(i)),
                None => n.as_f64().map(MetadataValue::Float),
            },
            Value::Array(items) if items.iter().all(Value::is_string) => Some(
                MetadataValue::StringList(
                    items
                        .iter()
                        .filter_map(|item| item.as_str().map(str::to_string))
                        .collect(),
                ),
            ),
            other => Some(MetadataValue::Json(other.clone())),
        }
    }

    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            MetadataValue::String(_) => Some(ValueType::String),
            MetadataValue::Float(_) => Some(ValueType::Float),
            MetadataValue::Integer(_) => Some(ValueType::Integer),
            MetadataValue::Boolean(_) => Some(ValueType::Boolean),
            MetadataValue::StringList(_) => Some(ValueType::StringList),
            MetadataValue::Timestamp(_) => Some(ValueType::Timestamp),
            MetadataValue::Json(_) => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.value_type().map_or("json", |t| t.as_str())
    }

    /// Strict conversion used by typed setters: only integer-to-float widening
    /// and timestamp strings are accepted across types.
    pub fn conform(self, expected: ValueType) -> std::result::Result<Self, Self> {
        match (expected, self) {
            (ValueType::Float, MetadataValue::Integer(i)) => Ok(MetadataValue::Float(i as f64)),
            (ValueType::Timestamp, MetadataValue::String(s)) => match parse_timestamp(&s) {
                Ok(dt) => Ok(MetadataValue::Timestamp(dt)),
                Err(_) => Err(MetadataValue::String(s)),
            },
            (expected, value) if value.value_type() == Some(expected) => Ok(value),
            (_, value) => Err(value),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            MetadataValue::String(s) => Value::String(s.clone()),
            MetadataValue::Float(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
            MetadataValue::Integer(i) => Value::Number(Number::from(*i)),
            MetadataValue::Boolean(b) => Value::Bool(*b),
            MetadataValue::StringList(items) => {
                Value::Array(items.iter().cloned().map(Value::String).collect())
            }
            MetadataValue::Timestamp(dt) => Value::String(format_timestamp(dt)),
            MetadataValue::Json(v) => v.clone(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetadataValue::Float(f) => Some(*f),
            MetadataValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            MetadataValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MetadataValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            MetadataValue::StringList(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<&DateTime<Utc>> {
        match self {
            MetadataValue::Timestamp(dt) => Some(dt),
            _ => None,
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::String(s) => f.write_str(s),
            MetadataValue::Float(v) => write!(f, "{}", v),
            MetadataValue::Integer(v) => write!(f, "{}", v),
            MetadataValue::Boolean(v) => write!(f, "{}", v),
            MetadataValue::StringList(items) => f.write_str(&items.join(",")),
            MetadataValue::Timestamp(dt) => f.write_str(&format_timestamp(dt)),
            MetadataValue::Json(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::String(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::String(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        MetadataValue::Float(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Integer(value)
    }
}

impl From<i32> for MetadataValue {
    fn from(value: i32) -> Self {
        MetadataValue::Integer(value as i64)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        MetadataValue::Boolean(value)
    }
}

impl From<Vec<String>> for MetadataValue {
    fn from(value: Vec<String>) -> Self {
        MetadataValue::StringList(value)
    }
}

impl From<Vec<&str>> for MetadataValue {
    fn from(value: Vec<&str>) -> Self {
        MetadataValue::StringList(value.into_iter().map(str::to_string).collect())
    }
}

impl From<DateTime<Utc>> for MetadataValue {
    fn from(value: DateTime<Utc>) -> Self {
        MetadataValue::Timestamp(value)
    }
}
