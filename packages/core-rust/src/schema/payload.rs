//! Payload validation against a schema document.

use serde_json::Value;

use super::primary::{properties, PrimaryMeta};
use super::value::{coerce_number, display_value, matches_type, type_name};

/// Validates `data` against `schema`, returning every violation found.
///
/// An empty list means the payload is valid. A schema that is not an object
/// imposes no constraints. Errors are ordered: root type first, then missing
/// required fields in `required` order, then per-property errors in
/// `properties` order.
///
/// A required autoincrement primary key may be omitted, since the insert path
/// assigns it.
#[must_use]
pub fn basic_validate(schema: &Value, data: &Value, primary: Option<&PrimaryMeta>) -> Vec<String> {
    let mut errors = Vec::new();
    let Some(schema) = schema.as_object() else {
        return errors;
    };

    let expected = schema.get("type").and_then(Value::as_str);
    if let Some(expected) = expected {
        if !matches_type(expected, data) {
            errors.push(format!("root: expected {expected}, got {}", type_name(data)));
        }
    }

    let data_obj = data.as_object();

    for key in schema
        .get("required")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
    {
        if primary.is_some_and(|p| p.is_autoincrement_field(key)) {
            continue;
        }
        if !data_obj.is_some_and(|d| d.contains_key(key)) {
            errors.push(format!("missing required: {key}"));
        }
    }

    let (Some("object"), Some(data_obj), Some(props)) = (expected, data_obj, properties(schema))
    else {
        return errors;
    };

    for (key, def) in props {
        let Some(value) = data_obj.get(key) else {
            continue;
        };
        let Some(declared) = def.get("type").and_then(Value::as_str) else {
            continue;
        };

        if !matches_type(declared, value) {
            errors.push(format!("{key}: expected {declared}, got {}", type_name(value)));
        }

        if matches!(declared, "number" | "integer") {
            let Some(num) = coerce_number(value) else {
                errors.push(format!("{key}: not a number"));
                continue;
            };
            if let Some(min) = def.get("minimum").filter(|m| m.is_number()) {
                if min.as_f64().is_some_and(|min| num < min) {
                    errors.push(format!("{key}: < minimum {}", display_value(min)));
                }
            }
            if let Some(max) = def.get("maximum").filter(|m| m.is_number()) {
                if max.as_f64().is_some_and(|max| num > max) {
                    errors.push(format!("{key}: > maximum {}", display_value(max)));
                }
            }
        }
    }

    errors
}
