//! Value helpers for desired/observed VM state.
//!
//! Both sides of a comparison are JSON object trees. Absence is explicit
//! (`None`/missing key), never a zero-value sentinel: "unset" and "equals
//! the zero value" are different facts and must diff differently.

use crate::schema::ValueType;
use serde_json::Value;

/// Normalize a scalar to its declared type for comparison.
///
/// Returns `None` when the value cannot represent the declared type, and
/// for `null` (absent). Integers accept numeric strings and whole floats;
/// bools accept `"true"`/`"false"`; strings accept numbers and bools.
pub fn coerce(value: &Value, value_type: ValueType) -> Option<Value> {
    if value.is_null() {
        return None;
    }
    match value_type {
        ValueType::Int => match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                .map(Value::from),
            Value::String(s) => s.trim().parse::<i64>().ok().map(Value::from),
            _ => None,
        },
        ValueType::Bool => match value {
            Value::Bool(b) => Some(Value::Bool(*b)),
            Value::String(s) => match s.as_str() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            _ => None,
        },
        ValueType::Str => match value {
            Value::String(s) => Some(Value::String(s.clone())),
            Value::Number(n) => Some(Value::String(n.to_string())),
            Value::Bool(b) => Some(Value::String(b.to_string())),
            _ => None,
        },
    }
}

/// Whether a value contains at least one populated leaf.
pub fn is_populated(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Object(map) => map.values().any(is_populated),
        Value::Array(items) => items.iter().any(is_populated),
        _ => true,
    }
}

/// Render an optional value for diff reports: bare scalars, `absent` for
/// missing values.
pub fn display(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "absent".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
