//! Row representation and key coercion
//!
//! Rows are plain JSON objects. Keys (primary and foreign) are always
//! coerced to strings before they are stored or indexed.

use serde_json::{Map, Number, Value};

/// A single stored row
pub type Row = Map<String, Value>;

/// Coerces a JSON value to an id.
///
/// Strings and numbers are valid ids. Null, booleans, empty strings,
/// arrays and objects are not. Integer-valued floats key like the
/// integer they equal, so `1.0` and `1` name the same row.
pub fn key_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(number_key(n)),
        _ => None,
    }
}

fn number_key(n: &Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 9.007_199_254_740_992e15 => {
            format!("{}", f as i64)
        }
        _ => n.to_string(),
    }
}

/// Returns the key stored under `field` in `row`, if it is a valid id
pub fn row_key(row: &Row, field: &str) -> Option<String> {
    row.get(field).and_then(key_from_value)
}

/// Returns a short type name for error messages
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Default record comparer: per-key equality over both rows.
///
/// Arrays compare element by element, so a rebuilt array holding the
/// same ids does not count as a change.
pub fn rows_equal(prev: &Row, next: &Row) -> bool {
    prev.len() == next.len()
        && next.iter().all(|(key, value)| match (prev.get(key), value) {
            (Some(Value::Array(a)), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x == y)
            }
            (Some(old), new) => old == new,
            (None, _) => false,
        })
}
