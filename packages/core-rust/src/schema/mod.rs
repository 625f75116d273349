//! Lightweight schema engine.
//!
//! Schemas are a small JSON-Schema subset: a root `type`, `properties` with
//! primitive/array/object `type`s, `required`, numeric `minimum`/`maximum`,
//! and one optional primary key with an autoincrement flag. Documents are
//! handled as untyped [`serde_json::Value`]s and never mutated.

mod definition;
mod payload;
mod primary;
mod skeleton;
mod uniqueness;
pub mod value;

pub use definition::{validate_schema_definition, DefinitionError};
pub use payload::basic_validate;
pub use primary::{detect_primary, PrimaryMeta};
pub use skeleton::schema_to_skeleton;
pub use uniqueness::{resolve_against_existing, InsertConflict};

use serde_json::Value;

/// Result of validating a payload against a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// The value conforms to the schema.
    Valid,
    /// The value violates one or more schema constraints.
    Invalid {
        /// Human-readable descriptions of each validation failure.
        errors: Vec<String>,
    },
}

impl ValidationResult {
    /// Wraps a list of validation messages.
    #[must_use]
    pub fn from_errors(errors: Vec<String>) -> Self {
        if errors.is_empty() {
            Self::Valid
        } else {
            Self::Invalid { errors }
        }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// The failure messages; empty when valid.
    #[must_use]
    pub fn errors(&self) -> &[String] {
        match self {
            Self::Valid => &[],
            Self::Invalid { errors } => errors,
        }
    }
}

/// Validates `data` against `schema` using the schema's own primary key.
#[must_use]
pub fn validate_payload(schema: &Value, data: &Value) -> ValidationResult {
    let primary = detect_primary(schema);
    ValidationResult::from_errors(basic_validate(schema, data, primary.as_ref()))
}
