//! Starting payloads generated from a schema's properties.

use serde_json::{Map, Value};

use super::primary::{properties, PrimaryMeta};

/// Builds a default-populated object for a schema's properties.
///
/// Each property takes its `default`, else its `example`, else a zero value
/// for its declared type (`null` for unknown types). An autoincrement primary
/// key is omitted. Non-object schemas produce `{}`.
#[must_use]
pub fn schema_to_skeleton(schema: &Value, primary: Option<&PrimaryMeta>) -> Value {
    let mut out = Map::new();

    let Some(schema) = schema.as_object() else {
        return Value::Object(out);
    };
    if schema.get("type").and_then(Value::as_str) != Some("object") {
        return Value::Object(out);
    }

    for (key, def) in properties(schema).into_iter().flatten() {
        if primary.is_some_and(|p| p.is_autoincrement_field(key)) {
            continue;
        }
        let seed = def
            .get("default")
            .or_else(|| def.get("example"))
            .cloned()
            .unwrap_or_else(|| zero_value(def.get("type").and_then(Value::as_str)));
        out.insert(key.clone(), seed);
    }

    Value::Object(out)
}

fn zero_value(declared: Option<&str>) -> Value {
    match declared {
        Some("string") => Value::String(String::new()),
        Some("number" | "integer") => Value::from(0),
        Some("boolean") => Value::Bool(false),
        Some("array") => Value::Array(Vec::new()),
        Some("object") => Value::Object(Map::new()),
        _ => Value::Null,
    }
}
