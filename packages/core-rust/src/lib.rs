//! `GolemDB` Core: schema engine, entity row model, and annotation filters.

pub mod clock;
pub mod filter;
pub mod schema;
pub mod traits;
pub mod types;

pub use clock::{ClockSource, ManualClock, SystemClock};
pub use filter::{collection_filter, type_filter, FilterExpr, FilterParseError, FilterValue};
pub use schema::{
    basic_validate, detect_primary, resolve_against_existing, schema_to_skeleton,
    validate_payload, validate_schema_definition, DefinitionError, InsertConflict, PrimaryMeta,
    ValidationResult,
};
pub use traits::EntityStore;
pub use types::{
    CollectionRecord, CreateReceipt, DeleteReceipt, EntityCreate, EntityExtend, EntityMetadata,
    EntityUpdate, ExtendReceipt, NumericAnnotation, Payload, Row, SchemaId, SchemaRecord,
    StringAnnotation, UpdateReceipt, TYPE_COLLECTION, TYPE_SCHEMA,
};
