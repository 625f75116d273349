//! Well-formedness checks for schema documents.

use serde_json::Value;

use super::primary::{detect_primary, is_field_marker, properties, root_primary_field, PrimaryMeta};
use super::value::display_value;

/// All structural problems found in a schema document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid schema definition: {}", .errors.join("; "))]
pub struct DefinitionError {
    /// Human-readable descriptions, in check order.
    pub errors: Vec<String>,
}

/// Checks a schema document for internal consistency.
///
/// Every check runs; the error carries all failures at once. On success the
/// detected primary key (if any) is returned.
///
/// # Errors
///
/// Returns [`DefinitionError`] when the document is not an object, its root
/// `type` is not `"object"`, `properties` is missing, `required` names unknown
/// properties, the primary key is unknown or has a non-numeric autoincrement
/// type, or more than one primary key is declared.
pub fn validate_schema_definition(schema: &Value) -> Result<Option<PrimaryMeta>, DefinitionError> {
    let Some(obj) = schema.as_object() else {
        return Err(DefinitionError {
            errors: vec!["Schema must be an object".to_string()],
        });
    };

    let mut errors = Vec::new();

    if obj.get("type").and_then(Value::as_str) != Some("object") {
        errors.push(r#"Root "type" should be "object""#.to_string());
    }

    let props = properties(obj);
    if props.is_none() {
        errors.push(r#""properties" must be an object"#.to_string());
    }
    let has_prop = |key: &str| props.is_some_and(|p| p.contains_key(key));

    let unknown_required: Vec<String> = obj
        .get("required")
        .and_then(Value::as_array)
        .map(|required| {
            required
                .iter()
                .filter(|k| k.as_str().map_or(true, |k| !has_prop(k)))
                .map(display_value)
                .collect()
        })
        .unwrap_or_default();
    if !unknown_required.is_empty() {
        errors.push(format!(
            r#""required" contains unknown keys: {}"#,
            unknown_required.join(", ")
        ));
    }

    let primary = detect_primary(schema);
    if let Some(prim) = &primary {
        match props.and_then(|p| p.get(&prim.field)) {
            None => errors.push(format!(
                r#"Primary key "{}" not found in properties"#,
                prim.field
            )),
            Some(def) => {
                let declared = def.get("type").and_then(Value::as_str);
                if prim.autoincrement && !matches!(declared, Some("integer" | "number")) {
                    errors.push(format!(
                        r#"Autoincrement primary key "{}" must be "integer" or "number", got "{}""#,
                        prim.field,
                        declared.unwrap_or("unknown")
                    ));
                }
            }
        }
    }

    if count_primary_declarations(obj) > 1 {
        errors.push("Only one primary key is allowed".to_string());
    }

    if errors.is_empty() {
        Ok(primary)
    } else {
        Err(DefinitionError { errors })
    }
}

/// Counts primary-key declarations across both declaration sites.
fn count_primary_declarations(schema: &serde_json::Map<String, Value>) -> usize {
    let root = usize::from(root_primary_field(schema).is_some());
    let fields = properties(schema).map_or(0, |props| {
        props
            .values()
            .filter_map(Value::as_object)
            .filter(|def| is_field_marker(def, true))
            .count()
    });
    root + fields
}
