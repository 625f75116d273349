//! Loose-JSON helpers shared by the schema engine.
//!
//! Schema documents and payloads arrive as untyped [`serde_json::Value`]s.
//! Everything in the engine pattern-matches on the value kind through these
//! helpers instead of assuming a shape.

use serde_json::{Map, Value};

/// Dynamic type name of a payload value as reported in validation messages.
///
/// Numbers are always `"number"`, whether or not they are integral.
#[must_use]
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Whether `value` satisfies a declared schema `type`.
///
/// `"integer"` accepts numbers with no fractional part; `"number"` accepts any
/// number. Every other declared type must equal [`type_name`]. Unknown declared
/// types never match.
#[must_use]
pub fn matches_type(declared: &str, value: &Value) -> bool {
    match (declared, value) {
        ("integer", Value::Number(n)) => {
            n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)
        }
        (declared, value) => declared == type_name(value),
    }
}

/// Loose truthiness used for marker flags (`xPrimaryKey`, `autoincrement`, ...).
///
/// `null`, `false`, `0`, and `""` are falsy; arrays and objects are truthy
/// even when empty.
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Truthiness of an optional member: a missing member is falsy.
#[must_use]
pub fn flag(obj: &Map<String, Value>, key: &str) -> bool {
    obj.get(key).is_some_and(is_truthy)
}

/// Coerces a value to a number.
///
/// Numbers pass through, booleans map to 0/1, `null` maps to 0, and strings
/// are parsed after trimming (the empty string is 0). Arrays, objects, and
/// unparseable or non-finite strings yield `None`.
#[must_use]
pub fn coerce_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Null => 0.0,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                trimmed.parse::<f64>().ok()?
            }
        }
        Value::Array(_) | Value::Object(_) => return None,
    };
    n.is_finite().then_some(n)
}

/// Stringifies a value the way it appears inside error messages and ids:
/// strings verbatim, everything else as compact JSON.
#[must_use]
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Structural equality with numbers compared by numeric value, so `7` and
/// `7.0` are equal. Strings are never coerced to numbers.
#[must_use]
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| values_equal(x, y)))
        }
        (a, b) => a == b,
    }
}

/// Whether a candidate's primary-key value counts as "not supplied".
#[must_use]
pub fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

/// Builds a JSON number, preferring an integer representation when exact.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        return Value::from(n as i64);
    }
    serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number)
}
