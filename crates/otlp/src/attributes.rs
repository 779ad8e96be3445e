use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{AnyValue, KeyValue};

/// Flattened attributes of a span, resource or event
pub type Attributes = BTreeMap<String, AttributeValue>;

/// Native scalar produced from a wire `AnyValue`
///
/// Serialized untagged, so a map of these is a plain JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
}

impl AttributeValue {
    /// Numeric view of the value; numeric strings are parsed
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Double(d) => Some(*d),
            Self::String(s) => s.trim().parse().ok(),
            Self::Bool(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            // Whole doubles keep their fractional digit ("1.0", not "1")
            Self::Double(d) if d.is_finite() && d.fract() == 0.0 && d.abs() < 1e16 => {
                write!(f, "{:.1}", d)
            }
            Self::Double(d) => write!(f, "{}", d),
            Self::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Resolve one wire value: string, then integer, then double, then boolean.
/// Values with none of those populated become the debug rendering of the raw value.
pub fn flatten_value(value: &AnyValue) -> AttributeValue {
    if let Some(s) = &value.string_value {
        AttributeValue::String(s.clone())
    } else if let Some(i) = value.int_value {
        AttributeValue::Int(i)
    } else if let Some(d) = value.double_value {
        AttributeValue::Double(d)
    } else if let Some(b) = value.bool_value {
        AttributeValue::Bool(b)
    } else {
        AttributeValue::String(format!("{:?}", value))
    }
}

/// Flatten key/value pairs into a map. Repeated keys keep the last value.
pub fn flatten_attributes(attributes: &[KeyValue]) -> Attributes {
    attributes
        .iter()
        .map(|kv| (kv.key.clone(), flatten_value(&kv.value)))
        .collect()
}
