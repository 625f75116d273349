//! Primary-key detection.
//!
//! A schema can declare its primary key in two places: a root-level
//! `primaryKey: { field, autoincrement }` object, or field-level markers
//! (`xPrimaryKey` / `primaryKey: true`, `xAutoIncrement` / `autoincrement`).
//! Detection is lenient and picks the first declaration by precedence; the
//! exclusivity rule lives in the definition validator.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::value::{display_value, flag, is_truthy};

/// The primary key a schema declares.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrimaryMeta {
    /// Name of the primary-key property.
    pub field: String,
    /// Whether omitted values are assigned the next integer on insert.
    #[serde(default)]
    pub autoincrement: bool,
}

impl PrimaryMeta {
    /// Whether `key` is this primary key and it autoincrements.
    #[must_use]
    pub fn is_autoincrement_field(&self, key: &str) -> bool {
        self.autoincrement && self.field == key
    }
}

/// Reports the primary key declared by `schema`, if any.
///
/// The root-level `primaryKey.field` wins over any field-level marker, even
/// when they name different fields. Otherwise the first property (in document
/// order) with `xPrimaryKey` truthy or `primaryKey == true` is returned.
#[must_use]
pub fn detect_primary(schema: &Value) -> Option<PrimaryMeta> {
    let schema = schema.as_object()?;

    if let Some(field) = root_primary_field(schema) {
        let autoincrement = schema
            .get("primaryKey")
            .and_then(Value::as_object)
            .is_some_and(|pk| flag(pk, "autoincrement"));
        return Some(PrimaryMeta {
            field,
            autoincrement,
        });
    }

    properties(schema)?
        .iter()
        .find_map(|(key, def)| {
            let def = def.as_object()?;
            is_field_marker(def, false).then(|| PrimaryMeta {
                field: key.clone(),
                autoincrement: flag(def, "xAutoIncrement") || flag(def, "autoincrement"),
            })
        })
}

/// The stringified `primaryKey.field` at the document root, when present and
/// non-empty.
pub(crate) fn root_primary_field(schema: &Map<String, Value>) -> Option<String> {
    let field = schema.get("primaryKey")?.as_object()?.get("field")?;
    if field.is_null() {
        return None;
    }
    let field = display_value(field);
    (!field.is_empty()).then_some(field)
}

/// Whether a property definition carries a primary-key marker.
///
/// Detection requires `primaryKey` to be exactly `true`; the exclusivity count
/// (`loose = true`) accepts any truthy value.
pub(crate) fn is_field_marker(def: &Map<String, Value>, loose: bool) -> bool {
    if flag(def, "xPrimaryKey") {
        return true;
    }
    match def.get("primaryKey") {
        Some(Value::Bool(true)) => true,
        Some(other) => loose && is_truthy(other),
        None => false,
    }
}

pub(crate) fn properties(schema: &Map<String, Value>) -> Option<&Map<String, Value>> {
    schema.get("properties").and_then(Value::as_object)
}
