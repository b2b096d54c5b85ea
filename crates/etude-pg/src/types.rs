//! PostgreSQL type system: type OIDs, type names and text-format conversions.
use etude_sql::{RawValue, Value};

use crate::error::{PgError, PgResult};

/// Well-known PostgreSQL type OIDs.
pub mod oid {
    pub const BOOL: u32 = 16;
    pub const BYTEA: u32 = 17;
    pub const CHAR: u32 = 18;
    pub const NAME: u32 = 19;
    pub const INT8: u32 = 20;
    pub const INT2: u32 = 21;
    pub const INT4: u32 = 23;
    pub const TEXT: u32 = 25;
    pub const OID: u32 = 26;
    pub const JSON: u32 = 114;
    pub const XML: u32 = 142;
    pub const FLOAT4: u32 = 700;
    pub const FLOAT8: u32 = 701;
    pub const MONEY: u32 = 790;
    pub const INET: u32 = 869;
    pub const BPCHAR: u32 = 1042;
    pub const VARCHAR: u32 = 1043;
    pub const DATE: u32 = 1082;
    pub const TIME: u32 = 1083;
    pub const TIMESTAMP: u32 = 1114;
    pub const TIMESTAMPTZ: u32 = 1184;
    pub const INTERVAL: u32 = 1186;
    pub const TIMETZ: u32 = 1266;
    pub const BIT: u32 = 1560;
    pub const VARBIT: u32 = 1562;
    pub const NUMERIC: u32 = 1700;
    pub const UUID: u32 = 2950;
    pub const JSONB: u32 = 3802;

    // Array types
    pub const BOOL_ARRAY: u32 = 1000;
    pub const INT2_ARRAY: u32 = 1005;
    pub const INT4_ARRAY: u32 = 1007;
    pub const TEXT_ARRAY: u32 = 1009;
    pub const VARCHAR_ARRAY: u32 = 1015;
    pub const INT8_ARRAY: u32 = 1016;
    pub const FLOAT4_ARRAY: u32 = 1021;
    pub const FLOAT8_ARRAY: u32 = 1022;
}

/// Upper-case type name reported for a column's type OID.
///
/// Unknown OIDs report an empty name, which coerces as pass-through.
pub fn type_name(type_oid: u32) -> &'static str {
    match type_oid {
        oid::BOOL => "BOOL",
        oid::BYTEA => "BYTEA",
        oid::CHAR => "CHAR",
        oid::NAME => "NAME",
        oid::INT8 => "INT8",
        oid::INT2 => "INT2",
        oid::INT4 => "INT4",
        oid::TEXT => "TEXT",
        oid::OID => "OID",
        oid::JSON => "JSON",
        oid::XML => "XML",
        oid::FLOAT4 => "FLOAT4",
        oid::FLOAT8 => "FLOAT8",
        oid::MONEY => "MONEY",
        oid::INET => "INET",
        oid::BPCHAR => "BPCHAR",
        oid::VARCHAR => "VARCHAR",
        oid::DATE => "DATE",
        oid::TIME => "TIME",
        oid::TIMESTAMP => "TIMESTAMP",
        oid::TIMESTAMPTZ => "TIMESTAMPTZ",
        oid::INTERVAL => "INTERVAL",
        oid::TIMETZ => "TIMETZ",
        oid::BIT => "BIT",
        oid::VARBIT => "VARBIT",
        oid::NUMERIC => "NUMERIC",
        oid::UUID => "UUID",
        oid::JSONB => "JSONB",
        oid::BOOL_ARRAY => "_BOOL",
        oid::INT2_ARRAY => "_INT2",
        oid::INT4_ARRAY => "_INT4",
        oid::TEXT_ARRAY => "_TEXT",
        oid::VARCHAR_ARRAY => "_VARCHAR",
        oid::INT8_ARRAY => "_INT8",
        oid::FLOAT4_ARRAY => "_FLOAT4",
        oid::FLOAT8_ARRAY => "_FLOAT8",
        _ => "",
    }
}

/// Decode a text-format cell. `None` is SQL NULL.
///
/// `bool`, integer and float columns decode to native values; `bytea` hex
/// decodes to bytes. Everything else, `numeric` included, stays text.
pub fn decode_text(type_oid: u32, data: Option<&[u8]>) -> PgResult<RawValue> {
    let Some(data) = data else {
        return Ok(RawValue::Null);
    };
    let s = std::str::from_utf8(data)
        .map_err(|_| PgError::TypeConversion(format!("Invalid UTF-8 in {} value", type_label(type_oid))))?;
    let raw = match type_oid {
        oid::BYTEA => return decode_bytea_hex(s).map(RawValue::Bytes),
        oid::BOOL => match s {
            "t" => Some(RawValue::Bool(true)),
            "f" => Some(RawValue::Bool(false)),
            _ => None,
        },
        oid::INT2 | oid::INT4 | oid::INT8 => s.parse().ok().map(RawValue::Int),
        oid::FLOAT4 | oid::FLOAT8 => s.parse().ok().map(RawValue::Float),
        _ => None,
    };
    // Anything the server formatted unexpectedly is left to the text rules.
    Ok(raw.unwrap_or_else(|| RawValue::Text(s.to_string())))
}

fn type_label(type_oid: u32) -> String {
    match type_name(type_oid) {
        "" => format!("type {}", type_oid),
        name => name.to_string(),
    }
}

/// Encode a parameter in text format; `None` binds SQL NULL.
pub fn encode_param(value: &Value) -> Option<Vec<u8>> {
    match value {
        Value::Null => None,
        Value::Integer(v) => Some(v.to_string().into_bytes()),
        Value::Float(v) => Some(v.to_string().into_bytes()),
        Value::Bool(b) => Some(if *b { b"t".to_vec() } else { b"f".to_vec() }),
        Value::Text(s) => Some(s.as_bytes().to_vec()),
        Value::Bytes(b) => Some(encode_bytea_hex(b).into_bytes()),
        Value::Raw(raw) => encode_raw(raw),
    }
}

fn encode_raw(raw: &RawValue) -> Option<Vec<u8>> {
    match raw {
        RawValue::Null => None,
        RawValue::Text(s) => Some(s.as_bytes().to_vec()),
        RawValue::Bytes(b) => Some(encode_bytea_hex(b).into_bytes()),
        RawValue::Int(v) => Some(v.to_string().into_bytes()),
        RawValue::Float(v) => Some(v.to_string().into_bytes()),
        RawValue::Bool(b) => Some(if *b { b"t".to_vec() } else { b"f".to_vec() }),
    }
}

/// Decode PostgreSQL hex-format bytea (`\x` prefix).
///
/// Values without the prefix are returned as their raw bytes.
fn decode_bytea_hex(s: &str) -> PgResult<Vec<u8>> {
    let Some(hex) = s.strip_prefix("\\x") else {
        return Ok(s.as_bytes().to_vec());
    };
    if hex.len() % 2 != 0 {
        return Err(PgError::TypeConversion("Odd-length bytea hex".to_string()));
    }
    hex.as_bytes()
        .chunks(2)
        .map(|pair| -> PgResult<u8> { Ok((hex_digit(pair[0])? << 4) | hex_digit(pair[1])?) })
        .collect()
}

fn encode_bytea_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("\\x");
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

fn hex_digit(b: u8) -> PgResult<u8> {
    match b {
        b'0'..=b'9' => Ok(b - b'0'),
        b'a'..=b'f' => Ok(b - b'a' + 10),
        b'A'..=b'F' => Ok(b - b'A' + 10),
        _ => Err(PgError::TypeConversion(format!(
            "Invalid hex digit {:?} in bytea",
            b as char
        ))),
    }
}
