//! Primary-key uniqueness and autoincrement resolution.
//!
//! This is the decision half of the insert check: it takes rows that were
//! already fetched and decides. Fetching and deciding are separate steps with
//! nothing held in between, so two writers inserting into the same collection
//! at once can both pass and store the same key. Callers that need a real
//! guarantee must pair this with a conditional write in the store.

use serde_json::Value;

use super::primary::PrimaryMeta;
use super::value::{coerce_number, display_value, is_blank, number_value, values_equal};

/// Why a candidate row cannot be inserted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InsertConflict {
    /// A non-autoincrement primary key was not supplied.
    #[error("Primary key \"{field}\" is required")]
    MissingPrimaryKey { field: String },
    /// An existing row already holds the candidate's primary-key value.
    #[error("Duplicate primary key \"{field}\" value: {value}")]
    DuplicatePrimaryKey { field: String, value: String },
    /// The candidate is not an object, so no primary key can be read or set.
    #[error("Cannot resolve primary key \"{field}\" on a non-object payload")]
    NotAnObject { field: String },
}

/// Resolves a candidate row against the decoded payloads of its collection.
///
/// Without a primary key the candidate passes through unchanged. With an
/// autoincrement key and no supplied value, the key is set to one more than
/// the largest numeric value among `existing` (0 if there is none). Otherwise
/// the supplied value must be present and must not equal any existing value.
///
/// # Errors
///
/// Returns [`InsertConflict`] when the key is missing or duplicated, or the
/// candidate is not an object.
pub fn resolve_against_existing(
    primary: Option<&PrimaryMeta>,
    candidate: Value,
    existing: &[Value],
) -> Result<Value, InsertConflict> {
    let Some(primary) = primary else {
        return Ok(candidate);
    };
    let field = primary.field.as_str();

    let Value::Object(mut row) = candidate else {
        return Err(InsertConflict::NotAnObject {
            field: field.to_string(),
        });
    };

    let incoming = row.get(field);
    if is_blank(incoming) {
        if !primary.autoincrement {
            return Err(InsertConflict::MissingPrimaryKey {
                field: field.to_string(),
            });
        }
        let next = next_autoincrement(field, existing);
        tracing::debug!(field, next, "assigned autoincrement primary key");
        row.insert(field.to_string(), number_value(next));
        return Ok(Value::Object(row));
    }

    if let Some(incoming) = incoming {
        let duplicate = existing
            .iter()
            .filter_map(|o| o.get(field))
            .any(|v| values_equal(v, incoming));
        if duplicate {
            return Err(InsertConflict::DuplicatePrimaryKey {
                field: field.to_string(),
                value: display_value(incoming),
            });
        }
    }

    Ok(Value::Object(row))
}

/// One more than the largest finite numeric value at `field`, or 1.
fn next_autoincrement(field: &str, existing: &[Value]) -> f64 {
    existing
        .iter()
        .filter_map(|o| o.get(field))
        .filter_map(coerce_number)
        .fold(None, |max: Option<f64>, n| Some(max.map_or(n, |m| m.max(n))))
        .unwrap_or(0.0)
        + 1.0
}
