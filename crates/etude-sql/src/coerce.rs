//! Type-name driven coercion of scanned values.
//!
//! The database reports each column's type only as a name. That name is
//! normalized and looked up in a fixed table which decides the target
//! [`Value`] variant. The table is policy, not catalog data: it is never
//! derived from a live database.
use std::num::IntErrorKind;

use crate::value::{RawValue, Value, ValueKind};

/// Coercion target selected by a column's reported type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeFamily {
    /// 64-bit signed integers.
    Integer,
    /// 64-bit floating point.
    Real,
    /// Raw byte sequences.
    Binary,
    Boolean,
    /// Anything else: the scanned value passes through untouched.
    Other,
}

/// Type names per family, upper-case.
pub const TYPE_FAMILIES: &[(TypeFamily, &[&str])] = &[
    (
        TypeFamily::Integer,
        &[
            "BIGINT",
            "BIGSERIAL",
            "BIT",
            "BIT VARYING",
            "INT",
            "INT2",
            "INT4",
            "INT8",
            "INTEGER",
            "MEDIUMINT",
            "SERIAL",
            "SMALLINT",
            "SMALLSERIAL",
            "TINYINT",
        ],
    ),
    (
        TypeFamily::Real,
        &[
            "DEC",
            "DECIMAL",
            "DOUBLE",
            "DOUBLE PRECISION",
            "FIXED",
            "FLOAT",
            "FLOAT4",
            "FLOAT8",
            "NUMERIC",
            "REAL",
        ],
    ),
    (
        TypeFamily::Binary,
        &[
            "BINARY",
            "BLOB",
            "BYTE",
            "BYTEA",
            "LONGBLOB",
            "TINYBLOB",
            "VARBINARY",
        ],
    ),
    (TypeFamily::Boolean, &["BOOL", "BOOLEAN"]),
];

impl TypeFamily {
    /// Look up the family of a database-reported type name (case-insensitive).
    pub fn of(type_name: &str) -> TypeFamily {
        let name = type_name.trim().to_ascii_uppercase();
        TYPE_FAMILIES
            .iter()
            .find(|(_, names)| names.contains(&name.as_str()))
            .map(|(family, _)| *family)
            .unwrap_or(TypeFamily::Other)
    }

    /// Whether `value` is of a kind this family produces.
    pub fn admits(self, value: &Value) -> bool {
        match self {
            TypeFamily::Integer => value.kind() == ValueKind::Integer,
            TypeFamily::Real => value.kind() == ValueKind::Float,
            TypeFamily::Binary => value.kind() == ValueKind::Bytes,
            TypeFamily::Boolean => value.kind() == ValueKind::Bool,
            TypeFamily::Other => matches!(
                value.kind(),
                ValueKind::Text | ValueKind::Null | ValueKind::Raw
            ),
        }
    }

    /// Convert a scanned value into this family's variant. Never fails.
    pub fn coerce(self, raw: RawValue) -> Value {
        match self {
            TypeFamily::Integer => Value::Integer(to_int(&raw)),
            TypeFamily::Real => Value::Float(to_float(&raw)),
            TypeFamily::Binary => Value::Bytes(to_bytes(raw)),
            TypeFamily::Boolean => Value::Bool(to_bool(&raw)),
            TypeFamily::Other => match raw {
                RawValue::Null => Value::Null,
                RawValue::Text(s) => Value::Text(s),
                other => Value::Raw(other),
            },
        }
    }
}

/// Coerce a scanned value according to the column's reported type name.
///
/// `Null` becomes the zero value of the target family (`0`, `0.0`, empty
/// bytes, `false`); only unknown type names keep it as [`Value::Null`].
pub fn coerce(raw: RawValue, type_name: &str) -> Value {
    TypeFamily::of(type_name).coerce(raw)
}

fn to_int(raw: &RawValue) -> i64 {
    match raw {
        RawValue::Null => 0,
        RawValue::Text(s) => parse_int_prefix(s),
        RawValue::Bytes(b) => parse_int_prefix(&String::from_utf8_lossy(b)),
        RawValue::Int(v) => *v,
        RawValue::Float(v) => *v as i64,
        RawValue::Bool(v) => *v as i64,
    }
}

/// Parse the part before the first `.`; anything unparsable is 0.
///
/// Out-of-range values clamp to `i64::MAX` / `i64::MIN`.
fn parse_int_prefix(s: &str) -> i64 {
    let head = s.split_once('.').map_or(s, |(head, _)| head);
    match head.parse::<i64>() {
        Ok(v) => v,
        Err(e) => match e.kind() {
            IntErrorKind::PosOverflow => i64::MAX,
            IntErrorKind::NegOverflow => i64::MIN,
            _ => 0,
        },
    }
}

fn to_float(raw: &RawValue) -> f64 {
    match raw {
        RawValue::Null => 0.0,
        RawValue::Text(s) => s.parse().unwrap_or(0.0),
        RawValue::Bytes(b) => String::from_utf8_lossy(b).parse().unwrap_or(0.0),
        RawValue::Int(v) => *v as f64,
        RawValue::Float(v) => *v,
        RawValue::Bool(v) => {
            if *v {
                1.0
            } else {
                0.0
            }
        }
    }
}

// Numbers are not rendered into bytes.
fn to_bytes(raw: RawValue) -> Vec<u8> {
    match raw {
        RawValue::Text(s) => s.into_bytes(),
        RawValue::Bytes(b) => b,
        _ => Vec::new(),
    }
}

fn to_bool(raw: &RawValue) -> bool {
    match raw {
        RawValue::Null => false,
        RawValue::Text(s) => truthy(s),
        RawValue::Bytes(b) => truthy(&String::from_utf8_lossy(b)),
        RawValue::Int(v) => *v != 0,
        RawValue::Float(v) => *v != 0.0,
        RawValue::Bool(v) => *v,
    }
}

fn truthy(s: &str) -> bool {
    !(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> RawValue {
        RawValue::Text(s.to_string())
    }

    #[test]
    fn test_family_table_is_case_insensitive() {
        for (family, names) in TYPE_FAMILIES {
            for name in *names {
                assert_eq!(TypeFamily::of(name), *family, "{}", name);
                assert_eq!(TypeFamily::of(&name.to_lowercase()), *family, "{}", name);
            }
        }
        assert_eq!(TypeFamily::of(" Double Precision "), TypeFamily::Real);
        assert_eq!(TypeFamily::of("VARCHAR"), TypeFamily::Other);
        assert_eq!(TypeFamily::of("TIMESTAMPTZ"), TypeFamily::Other);
        assert_eq!(TypeFamily::of(""), TypeFamily::Other);
    }

    #[test]
    fn test_family_names_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for (_, names) in TYPE_FAMILIES {
            for name in *names {
                assert!(seen.insert(*name), "{} listed twice", name);
                assert_eq!(*name, name.to_ascii_uppercase());
            }
        }
    }

    #[test]
    fn test_integer_truncates_at_decimal_point() {
        assert_eq!(coerce(text("123.456"), "INT4"), Value::Integer(123));
        assert_eq!(coerce(text("-7.9"), "bigint"), Value::Integer(-7));
        assert_eq!(coerce(text("42"), "INTEGER"), Value::Integer(42));
        assert_eq!(coerce(text("9000"), "int4"), Value::Integer(9000));
    }

    #[test]
    fn test_integer_degrades_to_zero() {
        assert_eq!(coerce(text(""), "INT"), Value::Integer(0));
        assert_eq!(coerce(text("abc"), "INT"), Value::Integer(0));
        assert_eq!(coerce(text(".5"), "INT"), Value::Integer(0));
        assert_eq!(coerce(RawValue::Null, "SMALLINT"), Value::Integer(0));
        assert_eq!(coerce(RawValue::Bytes(vec![0xff]), "SMALLINT"), Value::Integer(0));
    }

    #[test]
    fn test_integer_overflow_clamps() {
        assert_eq!(coerce(text("99999999999999999999"), "BIGINT"), Value::Integer(i64::MAX));
        assert_eq!(coerce(text("-99999999999999999999.9"), "INT8"), Value::Integer(i64::MIN));
        assert_eq!(
            coerce(RawValue::Bytes(b"18446744073709551616".to_vec()), "INT"),
            Value::Integer(i64::MAX)
        );
    }

    #[test]
    fn test_integer_from_native_values() {
        assert_eq!(coerce(RawValue::Int(5), "SERIAL"), Value::Integer(5));
        assert_eq!(coerce(RawValue::Float(-3.99), "INT"), Value::Integer(-3));
        assert_eq!(coerce(RawValue::Bool(true), "TINYINT"), Value::Integer(1));
        assert_eq!(coerce(RawValue::Bytes(b"12.0".to_vec()), "INT"), Value::Integer(12));
    }

    #[test]
    fn test_real_family() {
        assert_eq!(coerce(text("1.25"), "NUMERIC"), Value::Float(1.25));
        assert_eq!(coerce(text("1e3"), "float8"), Value::Float(1000.0));
        assert_eq!(coerce(text("not a number"), "REAL"), Value::Float(0.0));
        assert_eq!(coerce(RawValue::Null, "DECIMAL"), Value::Float(0.0));
        assert_eq!(coerce(RawValue::Int(2), "DOUBLE"), Value::Float(2.0));
        assert_eq!(coerce(RawValue::Bool(true), "FIXED"), Value::Float(1.0));
    }

    #[test]
    fn test_binary_never_reinterprets_numbers() {
        assert_eq!(coerce(RawValue::Int(123), "BYTEA"), Value::Bytes(vec![]));
        assert_eq!(coerce(RawValue::Float(1.5), "BLOB"), Value::Bytes(vec![]));
        assert_eq!(coerce(RawValue::Bool(true), "BINARY"), Value::Bytes(vec![]));
        assert_eq!(coerce(RawValue::Null, "VARBINARY"), Value::Bytes(vec![]));
    }

    #[test]
    fn test_binary_keeps_text_and_bytes() {
        assert_eq!(coerce(text("abc"), "BYTEA"), Value::Bytes(b"abc".to_vec()));
        assert_eq!(
            coerce(RawValue::Bytes(vec![0, 159, 255]), "longblob"),
            Value::Bytes(vec![0, 159, 255])
        );
    }

    #[test]
    fn test_boolean_strings() {
        assert_eq!(coerce(text("false"), "BOOL"), Value::Bool(false));
        assert_eq!(coerce(text("FALSE"), "BOOL"), Value::Bool(false));
        assert_eq!(coerce(text("0"), "BOOL"), Value::Bool(false));
        assert_eq!(coerce(text(""), "BOOL"), Value::Bool(false));
        assert_eq!(coerce(text("anything-else"), "BOOL"), Value::Bool(true));
        assert_eq!(coerce(text("t"), "BOOLEAN"), Value::Bool(true));
        // Only the exact words above are false.
        assert_eq!(coerce(text("f"), "BOOLEAN"), Value::Bool(true));
        assert_eq!(coerce(text("no"), "BOOLEAN"), Value::Bool(true));
    }

    #[test]
    fn test_boolean_native_values() {
        assert_eq!(coerce(RawValue::Int(0), "BOOL"), Value::Bool(false));
        assert_eq!(coerce(RawValue::Int(-1), "BOOL"), Value::Bool(true));
        assert_eq!(coerce(RawValue::Float(0.0), "BOOL"), Value::Bool(false));
        assert_eq!(coerce(RawValue::Bool(true), "BOOL"), Value::Bool(true));
        assert_eq!(coerce(RawValue::Null, "BOOL"), Value::Bool(false));
        assert_eq!(coerce(RawValue::Bytes(b"false".to_vec()), "BOOL"), Value::Bool(false));
    }

    #[test]
    fn test_unknown_types_pass_through() {
        assert_eq!(coerce(RawValue::Null, "VARCHAR"), Value::Null);
        assert_eq!(coerce(text("Skoda"), "VARCHAR"), Value::Text("Skoda".into()));
        assert_eq!(
            coerce(RawValue::Int(3), "TIMESTAMP"),
            Value::Raw(RawValue::Int(3))
        );
        assert_eq!(
            coerce(RawValue::Bytes(vec![1]), ""),
            Value::Raw(RawValue::Bytes(vec![1]))
        );
    }

    #[test]
    fn test_coerced_values_are_admitted_by_their_family() {
        let inputs = [
            RawValue::Null,
            text("12.5"),
            text("junk"),
            RawValue::Bytes(vec![1, 2]),
            RawValue::Int(-4),
            RawValue::Float(0.25),
            RawValue::Bool(false),
        ];
        for type_name in ["INT8", "NUMERIC", "BYTEA", "BOOL", "TEXT"] {
            let family = TypeFamily::of(type_name);
            for raw in &inputs {
                let value = coerce(raw.clone(), type_name);
                assert!(family.admits(&value), "{} -> {:?}", type_name, value);
            }
        }
    }
}
