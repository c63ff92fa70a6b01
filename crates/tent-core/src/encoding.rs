//! Canonical JSON encoding.
//!
//! Two semantically equal JSON values always encode to the same bytes:
//! - Object members sorted by the UTF-8 bytes of their keys
//! - No insignificant whitespace
//! - Strings escape only `"`, `\` and control characters; everything else
//!   is written as literal UTF-8
//! - Integral numbers (including integral floats below 2^53) are written as
//!   plain integers; other floats use the shortest round-trip form

use serde_json::{Number, Value};

use crate::error::{Error, Result};

/// Largest integer a float can carry without losing precision.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Encode a JSON value to canonical bytes.
pub fn to_canonical_bytes(value: &Value) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    write_value(value, &mut buf)?;
    Ok(buf)
}

/// Decode bytes into a JSON value.
///
/// Accepts any valid JSON, canonical or not.
pub fn from_canonical_bytes(bytes: &[u8]) -> Result<Value> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Parse raw JSON text into a value suitable for canonical encoding.
pub fn parse_raw(raw: &str) -> Result<Value> {
    serde_json::from_str(raw).map_err(|e| Error::Canonical(format!("content is not valid JSON: {e}")))
}

fn write_value(value: &Value, buf: &mut Vec<u8>) -> Result<()> {
    match value {
        Value::Null => buf.extend_from_slice(b"null"),
        Value::Bool(true) => buf.extend_from_slice(b"true"),
        Value::Bool(false) => buf.extend_from_slice(b"false"),
        Value::Number(n) => write_number(n, buf)?,
        Value::String(s) => write_string(s, buf),
        Value::Array(items) => {
            buf.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    buf.push(b',');
                }
                write_value(item, buf)?;
            }
            buf.push(b']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.as_bytes().cmp(b.as_bytes()));
            buf.push(b'{');
            for (i, (key, member)) in entries.into_iter().enumerate() {
                if i > 0 {
                    buf.push(b',');
                }
                write_string(key, buf);
                buf.push(b':');
                write_value(member, buf)?;
            }
            buf.push(b'}');
        }
    }
    Ok(())
}

fn write_number(n: &Number, buf: &mut Vec<u8>) -> Result<()> {
    if n.is_i64() || n.is_u64() {
        buf.extend_from_slice(n.to_string().as_bytes());
        return Ok(());
    }
    let f = n
        .as_f64()
        .ok_or_else(|| Error::Canonical(format!("unrepresentable number: {n}")))?;
    if !f.is_finite() {
        return Err(Error::Canonical(format!("non-finite number: {f}")));
    }
    if f.fract() == 0.0 && f.abs() < MAX_SAFE_INTEGER {
        buf.extend_from_slice((f as i64).to_string().as_bytes());
    } else {
        buf.extend_from_slice(n.to_string().as_bytes());
    }
    Ok(())
}

fn write_string(s: &str, buf: &mut Vec<u8>) {
    buf.push(b'"');
    let mut utf8 = [0u8; 4];
    for c in s.chars() {
        match c {
            '"' => buf.extend_from_slice(b"\\\""),
            '\\' => buf.extend_from_slice(b"\\\\"),
            '\n' => buf.extend_from_slice(b"\\n"),
            '\r' => buf.extend_from_slice(b"\\r"),
            '\t' => buf.extend_from_slice(b"\\t"),
            '\u{08}' => buf.extend_from_slice(b"\\b"),
            '\u{0c}' => buf.extend_from_slice(b"\\f"),
            c if (c as u32) < 0x20 => {
                buf.extend_from_slice(format!("\\u{:04x}", c as u32).as_bytes());
            }
            c => buf.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes()),
        }
    }
    buf.push(b'"');
}
