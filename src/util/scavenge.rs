//! Permissive field scavenging over heterogeneous JSON.
//!
//! The run-record store and the usage API both carry two generations of
//! schema, with the same logical field appearing under different key names.
//! Rather than repeating `a.get("x").or_else(...)` chains inline, each
//! logical field is described as an ordered candidate-key list and resolved
//! through these helpers. Earlier keys win.

use chrono::{DateTime, Utc};
use serde_json::Value;

/// First string value found under any of the candidate keys.
#[must_use]
pub fn first_str<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
}

/// First integer value found under any of the candidate keys.
///
/// Accepts JSON integers and floats with an integral value.
#[must_use]
pub fn first_i64(value: &Value, keys: &[&str]) -> Option<i64> {
    keys.iter().find_map(|key| as_i64(value.get(*key)?))
}

/// First float value found under any of the candidate keys.
#[must_use]
pub fn first_f64(value: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .find_map(|key| value.get(*key).and_then(Value::as_f64))
}

/// First parseable timestamp found under any of the candidate keys.
///
/// Accepts RFC 3339 strings and Unix epoch numbers (seconds or milliseconds;
/// values above `10^12` are treated as milliseconds).
#[must_use]
pub fn first_timestamp(value: &Value, keys: &[&str]) -> Option<DateTime<Utc>> {
    keys.iter().find_map(|key| parse_timestamp(value.get(*key)?))
}

fn as_i64(value: &Value) -> Option<i64> {
    if let Some(n) = value.as_i64() {
        return Some(n);
    }
    value.as_f64().and_then(|f| {
        if f.is_finite() && f.fract() == 0.0 {
            Some(f as i64)
        } else {
            None
        }
    })
}

/// Parse a timestamp value in either generation's encoding.
#[must_use]
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(num) => {
            let raw = num.as_i64().or_else(|| num.as_u64().map(|u| u as i64))?;
            let (secs, nanos) = if raw > 1_000_000_000_000 {
                (raw / 1000, ((raw % 1000) as u32) * 1_000_000)
            } else {
                (raw, 0)
            };
            DateTime::from_timestamp(secs, nanos)
        }
        _ => None,
    }
}
