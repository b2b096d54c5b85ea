//! Scanned and coerced value types.
use std::fmt;

use serde::{Serialize, Serializer};

/// A column value as a driver scanned it, before any coercion.
///
/// Drivers decode as much as they already know: a text-protocol driver hands
/// over `Text` for nearly everything, a binary one may produce native numbers.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,
    Text(String),
    Bytes(Vec<u8>),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl RawValue {
    pub fn is_null(&self) -> bool {
        matches!(self, RawValue::Null)
    }
}

impl Serialize for RawValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RawValue::Null => serializer.serialize_none(),
            RawValue::Text(s) => serializer.serialize_str(s),
            RawValue::Bytes(b) => serializer.serialize_bytes(b),
            RawValue::Int(v) => serializer.serialize_i64(*v),
            RawValue::Float(v) => serializer.serialize_f64(*v),
            RawValue::Bool(v) => serializer.serialize_bool(*v),
        }
    }
}

/// A typed value stored in a [`Record`](crate::Record).
///
/// Also used as a query parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Bytes(Vec<u8>),
    Bool(bool),
    Text(String),
    Null,
    /// A driver-native value whose column type has no coercion rule.
    Raw(RawValue),
}

/// The variant tag of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Integer,
    Float,
    Bytes,
    Bool,
    Text,
    Null,
    Raw,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Integer => "integer",
            ValueKind::Float => "float",
            ValueKind::Bytes => "bytes",
            ValueKind::Bool => "bool",
            ValueKind::Text => "text",
            ValueKind::Null => "null",
            ValueKind::Raw => "raw",
        };
        f.write_str(name)
    }
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Integer(_) => ValueKind::Integer,
            Value::Float(_) => ValueKind::Float,
            Value::Bytes(_) => ValueKind::Bytes,
            Value::Bool(_) => ValueKind::Bool,
            Value::Text(_) => ValueKind::Text,
            Value::Null => ValueKind::Null,
            Value::Raw(_) => ValueKind::Raw,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Integer(v) => serializer.serialize_i64(*v),
            Value::Float(v) => serializer.serialize_f64(*v),
            Value::Bytes(b) => serializer.serialize_bytes(b),
            Value::Bool(v) => serializer.serialize_bool(*v),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Null => serializer.serialize_none(),
            Value::Raw(raw) => raw.serialize(serializer),
        }
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v as f64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_conversions() {
        assert_eq!(Value::from(7i32), Value::Integer(7));
        assert_eq!(Value::from("Skoda"), Value::Text("Skoda".to_string()));
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some(true)), Value::Bool(true));
        assert_eq!(Value::from(&b"ab"[..]), Value::Bytes(vec![b'a', b'b']));
    }

    #[test]
    fn test_json_shape() {
        let values = vec![
            Value::Integer(1),
            Value::Float(2.5),
            Value::Bool(false),
            Value::Text("x".into()),
            Value::Null,
            Value::Bytes(vec![1, 2]),
            Value::Raw(RawValue::Int(9)),
        ];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"[1,2.5,false,"x",null,[1,2],9]"#);
    }

    #[test]
    fn test_kind() {
        assert_eq!(Value::Raw(RawValue::Null).kind(), ValueKind::Raw);
        assert_eq!(Value::Null.kind().to_string(), "null");
        assert!(Value::Null.is_null());
        assert_eq!(Value::Integer(3).as_i64(), Some(3));
        assert_eq!(Value::Text("3".into()).as_i64(), None);
    }
}
