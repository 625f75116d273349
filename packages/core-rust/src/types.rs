use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reserved `type` annotation value marking a collection record.
pub const TYPE_COLLECTION: &str = "__collection";
/// Reserved `type` annotation value marking a schema record.
pub const TYPE_SCHEMA: &str = "__schema";

/// Annotation keys used by the console's linking conventions.
pub mod keys {
    pub const TYPE: &str = "type";
    pub const COLLECTION: &str = "collection";
    pub const SCHEMA_ID: &str = "schemaId";
    pub const SCHEMA_NAME: &str = "schemaName";
    pub const VERSION: &str = "version";
}

/// String-valued annotation attached to an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringAnnotation {
    pub key: String,
    pub value: String,
}

impl StringAnnotation {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Numeric annotation attached to an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericAnnotation {
    pub key: String,
    pub value: f64,
}

impl NumericAnnotation {
    pub fn new(key: impl Into<String>, value: f64) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// An entity as returned by the store.
///
/// Rows from a query carry only the key and payload; annotations are filled in
/// from per-entity metadata.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    /// Opaque entity identifier.
    pub entity_key: String,
    /// Raw payload bytes.
    #[serde(with = "serde_bytes")]
    pub storage_value: Vec<u8>,
    #[serde(default)]
    pub string_annotations: Vec<StringAnnotation>,
    #[serde(default)]
    pub numeric_annotations: Vec<NumericAnnotation>,
}

impl Row {
    /// Decodes the payload as UTF-8 text, then as JSON when it parses.
    #[must_use]
    pub fn decode_payload(&self) -> Payload {
        Payload::decode(&self.storage_value)
    }

    /// The first string annotation with `key`.
    #[must_use]
    pub fn string_annotation(&self, key: &str) -> Option<&str> {
        find_string(&self.string_annotations, key)
    }

    /// The first numeric annotation with `key`.
    #[must_use]
    pub fn numeric_annotation(&self, key: &str) -> Option<f64> {
        self.numeric_annotations
            .iter()
            .find(|a| a.key == key)
            .map(|a| a.value)
    }

    /// Whether this row is a collection or schema record rather than data.
    #[must_use]
    pub fn is_reserved(&self) -> bool {
        matches!(
            self.string_annotation(keys::TYPE),
            Some(TYPE_COLLECTION | TYPE_SCHEMA)
        )
    }
}

pub(crate) fn find_string<'a>(annotations: &'a [StringAnnotation], key: &str) -> Option<&'a str> {
    annotations
        .iter()
        .find(|a| a.key == key)
        .map(|a| a.value.as_str())
}

/// A decoded row payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// The payload text parsed as JSON.
    Json(Value),
    /// The payload text did not parse; kept verbatim.
    Text(String),
}

impl Payload {
    /// Decodes bytes as (lossy) UTF-8, then best-effort JSON.
    #[must_use]
    pub fn decode(bytes: &[u8]) -> Self {
        let text = String::from_utf8_lossy(bytes);
        match serde_json::from_str(&text) {
            Ok(value) => Self::Json(value),
            Err(_) => Self::Text(text.into_owned()),
        }
    }

    /// The payload as a JSON value; raw text becomes a JSON string.
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Json(value) => value,
            Self::Text(text) => Value::String(text),
        }
    }

    /// Pretty-printed JSON, or the raw text.
    #[must_use]
    pub fn to_pretty(&self) -> String {
        match self {
            Self::Json(value) => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
            Self::Text(text) => text.clone(),
        }
    }
}

/// Per-entity metadata from the store.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityMetadata {
    #[serde(default)]
    pub string_annotations: Vec<StringAnnotation>,
    #[serde(default)]
    pub numeric_annotations: Vec<NumericAnnotation>,
    /// Block at which the entity stops being readable.
    pub expires_at_block: u64,
    /// Creator of the entity, when the store tracks one.
    #[serde(default)]
    pub owner: Option<String>,
}

/// New entity to create.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntityCreate {
    pub data: Vec<u8>,
    /// Blocks-to-live.
    pub btl: u64,
    pub string_annotations: Vec<StringAnnotation>,
    pub numeric_annotations: Vec<NumericAnnotation>,
}

/// Replacement payload and annotations for an existing entity.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntityUpdate {
    pub entity_key: String,
    pub data: Vec<u8>,
    pub btl: u64,
    pub string_annotations: Vec<StringAnnotation>,
    pub numeric_annotations: Vec<NumericAnnotation>,
}

/// Lifetime extension for an existing entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityExtend {
    pub entity_key: String,
    pub number_of_blocks: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateReceipt {
    pub entity_key: String,
    pub expiration_block: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateReceipt {
    pub entity_key: String,
    pub expiration_block: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendReceipt {
    pub entity_key: String,
    pub new_expiration_block: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteReceipt {
    pub entity_key: String,
}

/// Identifier linking rows to the schema that governs them.
///
/// Formats as `"{collection}:{name}@{version}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaId {
    pub collection: String,
    pub name: String,
    pub version: u32,
}

impl SchemaId {
    pub fn new(collection: impl Into<String>, name: impl Into<String>, version: u32) -> Self {
        Self {
            collection: collection.into(),
            name: name.into(),
            version,
        }
    }
}

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}@{}", self.collection, self.name, self.version)
    }
}

/// Error parsing a schema id string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed schema id {0:?}: expected \"collection:name@version\"")]
pub struct SchemaIdParseError(pub String);

impl FromStr for SchemaId {
    type Err = SchemaIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || SchemaIdParseError(s.to_string());
        let (head, version) = s.trim().rsplit_once('@').ok_or_else(err)?;
        let (collection, name) = head.split_once(':').ok_or_else(err)?;
        let version = version.parse().map_err(|_| err())?;
        if collection.is_empty() || name.is_empty() {
            return Err(err());
        }
        Ok(Self::new(collection, name, version))
    }
}

/// Payload of a collection record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionRecord {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Creation time in milliseconds since the Unix epoch.
    pub created_at: u64,
}

/// A schema record as resolved from a `__schema` row.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaRecord {
    pub schema_id: String,
    pub name: String,
    pub version: u32,
    pub collection: String,
    pub entity_key: String,
    /// The schema document itself.
    pub schema: Value,
}

impl SchemaRecord {
    /// Resolves a schema record from a row whose annotations are populated.
    ///
    /// Each field comes from the row's annotations first, then the decoded
    /// payload, then a default. The schema body is `payload.schema` when
    /// present, else the whole payload.
    #[must_use]
    pub fn from_row(row: &Row) -> Self {
        let data = match row.decode_payload() {
            Payload::Json(value @ Value::Object(_)) => value,
            _ => Value::Object(serde_json::Map::new()),
        };
        let data_str = |key: &str| data.get(key).and_then(Value::as_str).map(str::to_string);

        let collection = row
            .string_annotation(keys::COLLECTION)
            .map(str::to_string)
            .or_else(|| data_str("collection"))
            .unwrap_or_default();
        let name = row
            .string_annotation(keys::SCHEMA_NAME)
            .map(str::to_string)
            .or_else(|| data_str("name"))
            .unwrap_or_else(|| "schema".to_string());
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let version = row
            .numeric_annotation(keys::VERSION)
            .map(|v| v as u32)
            .or_else(|| {
                data.get("version")
                    .and_then(Value::as_u64)
                    .and_then(|v| u32::try_from(v).ok())
            })
            .unwrap_or(1);
        let schema_id = row
            .string_annotation(keys::SCHEMA_ID)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| SchemaId::new(&collection, &name, version).to_string());
        let schema = data.get("schema").cloned().unwrap_or_else(|| data.clone());

        Self {
            schema_id,
            name,
            version,
            collection,
            entity_key: row.entity_key.clone(),
            schema,
        }
    }
}
