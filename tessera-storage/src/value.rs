//! JSON <-> SQLite value mapping.
//!
//! null → NULL, bool → INTEGER 0/1, integer → INTEGER, float → REAL,
//! string → TEXT, array of integers in 0..=255 → BLOB, any other
//! array/object → TEXT holding the JSON text. On the way back BLOBs become
//! arrays of byte values, so bytes survive a write-then-read unchanged.

use rusqlite::types::{Value as SqlValue, ValueRef};
use serde_json::{Number, Value};

/// Convert a bound JSON parameter to a SQLite value.
pub fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                SqlValue::Real(f)
            } else {
                // u64 above i64::MAX
                SqlValue::Text(n.to_string())
            }
        }
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Array(items) => match byte_array(items) {
            Some(bytes) => SqlValue::Blob(bytes),
            None => SqlValue::Text(value.to_string()),
        },
        Value::Object(_) => SqlValue::Text(value.to_string()),
    }
}

/// Bytes of an array whose items are all integers in `0..=255`.
pub fn byte_array(items: &[Value]) -> Option<Vec<u8>> {
    items
        .iter()
        .map(|item| item.as_u64().and_then(|b| u8::try_from(b).ok()))
        .collect()
}

/// Convert a result cell to JSON.
pub fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Array(bytes.iter().map(|b| Value::from(*b)).collect()),
    }
}
