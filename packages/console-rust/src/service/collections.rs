//! Collection and schema management.
//!
//! Collections and schemas are ordinary entities tagged with a reserved `type`
//! annotation. Data rows link to them only through their `collection` and
//! `schemaId` annotations; the store does not enforce those links.

use golemdb_core::types::keys;
use golemdb_core::{
    collection_filter, schema_to_skeleton, type_filter, validate_payload,
    validate_schema_definition, CollectionRecord, CreateReceipt, EntityCreate, NumericAnnotation,
    Payload, SchemaId, SchemaRecord, StringAnnotation, ValidationResult, TYPE_COLLECTION,
    TYPE_SCHEMA,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::error::{ConsoleError, ConsoleResult};
use crate::service::context::ConsoleContext;
use crate::service::enrich::{enrich_rows, EnrichedRow};
use crate::service::resolver::UniquenessResolver;

/// A collection as listed in the console.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSummary {
    pub name: String,
    pub entity_key: String,
    pub description: Option<String>,
    /// Number of data rows in the collection. Collection and schema records
    /// are not counted.
    pub count: usize,
}

/// Result of a successful insert into a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionInsert {
    pub receipt: CreateReceipt,
    /// The payload as stored, including any assigned autoincrement key.
    pub value: Value,
}

// ---------------------------------------------------------------------------
// CollectionService
// ---------------------------------------------------------------------------

/// Creates and reads collections, their schemas, and their objects.
#[derive(Debug, Clone)]
pub struct CollectionService {
    ctx: ConsoleContext,
}

impl CollectionService {
    pub fn new(ctx: ConsoleContext) -> Self {
        Self { ctx }
    }

    /// Creates a collection record.
    ///
    /// # Errors
    ///
    /// `MissingInput` for a blank name, or `Store` when the write fails.
    pub async fn create_collection(
        &self,
        name: &str,
        description: &str,
    ) -> ConsoleResult<CreateReceipt> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ConsoleError::MissingInput("collection name"));
        }
        let record = CollectionRecord {
            name: name.to_string(),
            description: description.to_string(),
            created_at: self.ctx.clock.now(),
        };
        let create = EntityCreate {
            data: serde_json::to_vec(&record)?,
            btl: self.ctx.config.long_btl,
            string_annotations: vec![
                StringAnnotation::new(keys::TYPE, TYPE_COLLECTION),
                StringAnnotation::new(keys::COLLECTION, name),
            ],
            numeric_annotations: vec![NumericAnnotation::new(keys::VERSION, 1.0)],
        };
        let receipt = self.create_one(create).await?;
        self.ctx
            .log
            .push(format!("Created collection {name} → {}", receipt.entity_key));
        Ok(receipt)
    }

    /// Lists every collection with its object count.
    ///
    /// A failed count leaves that collection at zero; it does not fail the
    /// listing.
    ///
    /// # Errors
    ///
    /// `Store` when the collection query itself fails.
    pub async fn list_collections(&self) -> ConsoleResult<Vec<CollectionSummary>> {
        let rows = self
            .ctx
            .store
            .query_entities(&type_filter(TYPE_COLLECTION).to_string())
            .await?;

        let mut collections = Vec::with_capacity(rows.len());
        for row in rows {
            let data = match row.decode_payload() {
                Payload::Json(value) => value,
                Payload::Text(_) => Value::Null,
            };
            let name = data
                .get("name")
                .and_then(Value::as_str)
                .filter(|n| !n.is_empty())
                .unwrap_or("unknown")
                .to_string();
            let description = data
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string);
            let count = match self.load_collection_objects(&name, None).await {
                Ok(objects) => objects.len(),
                Err(err) => {
                    warn!(collection = %name, error = %err, "collection count failed");
                    0
                }
            };
            collections.push(CollectionSummary {
                name,
                entity_key: row.entity_key,
                description,
                count,
            });
        }
        self.ctx
            .log
            .push(format!("Loaded {} collections", collections.len()));
        Ok(collections)
    }

    /// Creates a schema record for `collection`.
    ///
    /// # Errors
    ///
    /// `MissingInput` for a blank collection or name, `InvalidSchema` when the
    /// definition does not validate, or `Store` when the write fails.
    pub async fn create_schema(
        &self,
        collection: &str,
        name: &str,
        version: u32,
        schema: Value,
    ) -> ConsoleResult<(SchemaId, CreateReceipt)> {
        let (collection, name) = (collection.trim(), name.trim());
        if collection.is_empty() {
            return Err(ConsoleError::MissingInput("schema collection"));
        }
        if name.is_empty() {
            return Err(ConsoleError::MissingInput("schema name"));
        }
        validate_schema_definition(&schema)?;

        let schema_id = SchemaId::new(collection, name, version);
        let body = json!({
            "collection": collection,
            "name": name,
            "version": version,
            "schema": schema,
        });
        let create = EntityCreate {
            data: serde_json::to_vec(&body)?,
            btl: self.ctx.config.long_btl,
            string_annotations: vec![
                StringAnnotation::new(keys::TYPE, TYPE_SCHEMA),
                StringAnnotation::new(keys::COLLECTION, collection),
                StringAnnotation::new(keys::SCHEMA_NAME, name),
                StringAnnotation::new(keys::SCHEMA_ID, schema_id.to_string()),
            ],
            numeric_annotations: vec![NumericAnnotation::new(keys::VERSION, f64::from(version))],
        };
        let receipt = self.create_one(create).await?;
        self.ctx
            .log
            .push(format!("Created schema {schema_id} → {}", receipt.entity_key));
        Ok((schema_id, receipt))
    }

    /// Lists every schema record.
    ///
    /// # Errors
    ///
    /// `Store` when the schema query fails.
    pub async fn list_schemas(&self) -> ConsoleResult<Vec<SchemaRecord>> {
        let rows = self
            .ctx
            .store
            .query_entities(&type_filter(TYPE_SCHEMA).to_string())
            .await?;
        let enriched =
            enrich_rows(self.ctx.store.as_ref(), rows, self.ctx.config.enrich_concurrency).await;
        let schemas: Vec<SchemaRecord> = enriched
            .iter()
            .map(|e| SchemaRecord::from_row(&e.row))
            .collect();
        self.ctx.log.push(format!("Loaded {} schemas", schemas.len()));
        Ok(schemas)
    }

    /// Finds a schema record by id. Surrounding whitespace is ignored.
    ///
    /// # Errors
    ///
    /// `UnknownSchema` when no record matches, or `Store` when listing fails.
    pub async fn find_schema(&self, schema_id: &str) -> ConsoleResult<SchemaRecord> {
        let wanted = schema_id.trim();
        self.list_schemas()
            .await?
            .into_iter()
            .find(|s| s.schema_id.trim() == wanted)
            .ok_or_else(|| ConsoleError::UnknownSchema(wanted.to_string()))
    }

    /// Data rows of `collection`, enriched with their metadata.
    ///
    /// With `schema_filter`, only rows whose `schemaId` annotation matches
    /// (after trimming) are returned.
    ///
    /// # Errors
    ///
    /// `Store` when the collection query fails.
    pub async fn load_collection_objects(
        &self,
        collection: &str,
        schema_filter: Option<&str>,
    ) -> ConsoleResult<Vec<EnrichedRow>> {
        let rows = self
            .ctx
            .store
            .query_entities(&collection_filter(collection, None).to_string())
            .await?;
        let enriched = enrich_rows(
            self.ctx.store.as_ref(),
            rows,
            self.ctx.config.collection_enrich_concurrency,
        )
        .await;

        let wanted = schema_filter.map(str::trim).filter(|s| !s.is_empty());
        let objects: Vec<EnrichedRow> = enriched
            .into_iter()
            .filter(|e| !e.row.is_reserved())
            .filter(|e| {
                wanted.is_none_or(|sid| {
                    e.row.string_annotation(keys::SCHEMA_ID).map(str::trim) == Some(sid)
                })
            })
            .collect();
        tracing::debug!(collection, objects = objects.len(), "loaded collection objects");
        Ok(objects)
    }

    /// A starting payload for the schema with `schema_id`.
    ///
    /// # Errors
    ///
    /// `UnknownSchema` when no record matches, or `Store` when listing fails.
    pub async fn skeleton_for(&self, schema_id: &str) -> ConsoleResult<Value> {
        let record = self.find_schema(schema_id).await?;
        let primary = golemdb_core::detect_primary(&record.schema);
        Ok(schema_to_skeleton(&record.schema, primary.as_ref()))
    }

    /// Validates `payload_text` against a schema and inserts it into
    /// `collection`.
    ///
    /// Runs in order: JSON parse, schema lookup, definition check, payload
    /// check, primary-key resolution, then the write. The primary-key check is
    /// not atomic with the write; see [`UniquenessResolver`].
    ///
    /// # Errors
    ///
    /// The first failing step's error: `MissingInput`, `InvalidJson`,
    /// `UnknownSchema`, `InvalidSchema`, `InvalidPayload`, `Conflict`, or
    /// `Store`.
    pub async fn create_in_collection(
        &self,
        collection: &str,
        schema_id: &str,
        payload_text: &str,
        btl: Option<u64>,
    ) -> ConsoleResult<CollectionInsert> {
        let collection = collection.trim();
        if collection.is_empty() {
            return Err(ConsoleError::MissingInput("collection"));
        }
        let candidate: Value = serde_json::from_str(payload_text)?;
        let record = self.find_schema(schema_id).await?;
        validate_schema_definition(&record.schema)?;

        if let ValidationResult::Invalid { errors } = validate_payload(&record.schema, &candidate) {
            for error in &errors {
                self.ctx.log.push(format!("Schema error: {error}"));
            }
            return Err(ConsoleError::InvalidPayload { errors });
        }

        let resolver = UniquenessResolver::new(
            self.ctx.store.as_ref(),
            self.ctx.config.collection_enrich_concurrency,
        );
        let value = match resolver
            .resolve_insert(collection, &record.schema_id, candidate, &record.schema)
            .await
        {
            Ok(value) => value,
            Err(err) => {
                self.ctx.log.push(err.to_string());
                return Err(err);
            }
        };

        let create = EntityCreate {
            data: serde_json::to_vec(&value)?,
            btl: btl.unwrap_or(self.ctx.config.default_btl),
            string_annotations: vec![
                StringAnnotation::new(keys::COLLECTION, collection),
                StringAnnotation::new(keys::SCHEMA_ID, record.schema_id.trim()),
            ],
            numeric_annotations: Vec::new(),
        };
        let receipt = self.create_one(create).await?;
        self.ctx.log.push(format!(
            "Created object in \"{collection}\" → {}",
            receipt.entity_key
        ));
        Ok(CollectionInsert { receipt, value })
    }

    async fn create_one(&self, create: EntityCreate) -> ConsoleResult<CreateReceipt> {
        self.ctx
            .store
            .create_entities(vec![create])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("store returned no receipt").into())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use golemdb_core::{EntityStore, InsertConflict, ManualClock};

    use super::*;
    use crate::service::config::ConsoleConfig;
    use crate::storage::MemoryEntityStore;

    fn setup() -> (Arc<MemoryEntityStore>, CollectionService) {
        let store = Arc::new(MemoryEntityStore::new());
        let ctx = ConsoleContext::with_clock(
            store.clone(),
            ConsoleConfig::default(),
            Arc::new(ManualClock::new(1_700_000_000_000)),
        );
        (store, CollectionService::new(ctx))
    }

    fn people_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": {"type": "integer"},
                "name": {"type": "string", "default": "anon"},
                "age": {"type": "integer", "minimum": 0, "maximum": 120}
            },
            "required": ["id", "name"],
            "primaryKey": {"field": "id", "autoincrement": true}
        })
    }

    #[tokio::test]
    async fn create_collection_writes_reserved_record() {
        let (store, svc) = setup();
        let receipt = svc.create_collection("  people ", "folks").await.unwrap();
        assert_eq!(receipt.expiration_block, 100_000);

        let meta = store.get_entity_metadata(&receipt.entity_key).await.unwrap();
        assert_eq!(
            meta.string_annotations,
            vec![
                StringAnnotation::new("type", TYPE_COLLECTION),
                StringAnnotation::new("collection", "people"),
            ]
        );
        let body: Value =
            serde_json::from_slice(&store.get_storage_value(&receipt.entity_key).await.unwrap())
                .unwrap();
        assert_eq!(
            body,
            json!({"name": "people", "description": "folks", "createdAt": 1_700_000_000_000u64})
        );
    }

    #[tokio::test]
    async fn created_at_reads_the_context_clock() {
        let store = Arc::new(MemoryEntityStore::new());
        let clock = Arc::new(ManualClock::new(1_000));
        let ctx = ConsoleContext::with_clock(store.clone(), ConsoleConfig::default(), clock.clone());
        let svc = CollectionService::new(ctx);

        let created_at = |key: String| {
            let store = store.clone();
            async move {
                let bytes = store.get_storage_value(&key).await.unwrap();
                serde_json::from_slice::<Value>(&bytes).unwrap()["createdAt"].clone()
            }
        };

        let first = svc.create_collection("a", "").await.unwrap();
        clock.advance(250);
        let second = svc.create_collection("b", "").await.unwrap();
        clock.set(42);
        let third = svc.create_collection("c", "").await.unwrap();

        assert_eq!(created_at(first.entity_key).await, json!(1_000));
        assert_eq!(created_at(second.entity_key).await, json!(1_250));
        assert_eq!(created_at(third.entity_key).await, json!(42));
    }

    #[tokio::test]
    async fn blank_collection_name_is_rejected() {
        let (store, svc) = setup();
        let err = svc.create_collection("   ", "").await.unwrap_err();
        assert!(matches!(err, ConsoleError::MissingInput(_)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn list_collections_counts_only_data_rows() {
        let (_store, svc) = setup();
        svc.create_collection("people", "").await.unwrap();
        svc.create_collection("empty", "").await.unwrap();
        svc.create_schema("people", "person", 1, people_schema())
            .await
            .unwrap();
        for payload in [r#"{"name":"a"}"#, r#"{"name":"b"}"#] {
            svc.create_in_collection("people", "people:person@1", payload, None)
                .await
                .unwrap();
        }

        let collections = svc.list_collections().await.unwrap();
        let counts: Vec<(&str, usize)> = collections
            .iter()
            .map(|c| (c.name.as_str(), c.count))
            .collect();
        assert_eq!(counts, vec![("people", 2), ("empty", 0)]);
        assert_eq!(
            svc.ctx.log.last().as_deref(),
            Some("Loaded 2 collections")
        );
    }

    #[tokio::test]
    async fn create_schema_rejects_invalid_definition() {
        let (store, svc) = setup();
        let err = svc
            .create_schema("people", "person", 1, json!({"type": "array"}))
            .await
            .unwrap_err();
        let ConsoleError::InvalidSchema(def) = err else {
            panic!("expected InvalidSchema, got {err:?}");
        };
        assert!(def.errors.contains(&"Root \"type\" should be \"object\"".to_string()));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn schemas_round_trip_through_records() {
        let (_store, svc) = setup();
        let (id, receipt) = svc
            .create_schema("people", "person", 2, people_schema())
            .await
            .unwrap();
        assert_eq!(id.to_string(), "people:person@2");

        let schemas = svc.list_schemas().await.unwrap();
        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas[0].schema_id, "people:person@2");
        assert_eq!(schemas[0].version, 2);
        assert_eq!(schemas[0].entity_key, receipt.entity_key);
        assert_eq!(schemas[0].schema, people_schema());

        assert!(svc.find_schema(" people:person@2 ").await.is_ok());
        assert!(matches!(
            svc.find_schema("people:person@3").await,
            Err(ConsoleError::UnknownSchema(_))
        ));
    }

    #[tokio::test]
    async fn skeleton_omits_autoincrement_key() {
        let (_store, svc) = setup();
        svc.create_schema("people", "person", 1, people_schema())
            .await
            .unwrap();
        let skeleton = svc.skeleton_for("people:person@1").await.unwrap();
        assert_eq!(skeleton, json!({"name": "anon", "age": 0}));
    }

    #[tokio::test]
    async fn insert_assigns_sequential_keys() {
        let (store, svc) = setup();
        svc.create_schema("people", "person", 1, people_schema())
            .await
            .unwrap();

        let first = svc
            .create_in_collection("people", "people:person@1", r#"{"name":"a"}"#, None)
            .await
            .unwrap();
        let second = svc
            .create_in_collection("people", "people:person@1", r#"{"name":"b"}"#, Some(10))
            .await
            .unwrap();
        assert_eq!(first.value["id"], json!(1));
        assert_eq!(second.value["id"], json!(2));
        assert_eq!(first.receipt.expiration_block, 300);
        assert_eq!(second.receipt.expiration_block, 10);

        let meta = store
            .get_entity_metadata(&second.receipt.entity_key)
            .await
            .unwrap();
        assert_eq!(
            meta.string_annotations,
            vec![
                StringAnnotation::new("collection", "people"),
                StringAnnotation::new("schemaId", "people:person@1"),
            ]
        );
    }

    #[tokio::test]
    async fn insert_rejects_duplicates_and_bad_payloads() {
        let (_store, svc) = setup();
        svc.create_schema("people", "person", 1, people_schema())
            .await
            .unwrap();
        svc.create_in_collection("people", "people:person@1", r#"{"id":7,"name":"a"}"#, None)
            .await
            .unwrap();

        let dup = svc
            .create_in_collection("people", "people:person@1", r#"{"id":7,"name":"b"}"#, None)
            .await
            .unwrap_err();
        assert!(matches!(
            dup,
            ConsoleError::Conflict(InsertConflict::DuplicatePrimaryKey { .. })
        ));

        let bad = svc
            .create_in_collection("people", "people:person@1", r#"{"name":"c","age":200}"#, None)
            .await
            .unwrap_err();
        let ConsoleError::InvalidPayload { errors } = bad else {
            panic!("expected InvalidPayload, got {bad:?}");
        };
        assert_eq!(errors, vec!["age: > maximum 120"]);

        assert!(matches!(
            svc.create_in_collection("people", "people:person@1", "{not json", None)
                .await,
            Err(ConsoleError::InvalidJson(_))
        ));
        assert!(matches!(
            svc.create_in_collection("people", "people:nobody@1", "{}", None)
                .await,
            Err(ConsoleError::UnknownSchema(_))
        ));

        let objects = svc.load_collection_objects("people", None).await.unwrap();
        assert_eq!(objects.len(), 1);
    }

    #[tokio::test]
    async fn load_collection_objects_filters_by_schema() {
        let (_store, svc) = setup();
        svc.create_schema("people", "person", 1, people_schema())
            .await
            .unwrap();
        svc.create_schema("people", "person", 2, people_schema())
            .await
            .unwrap();
        svc.create_in_collection("people", "people:person@1", r#"{"name":"a"}"#, None)
            .await
            .unwrap();
        svc.create_in_collection("people", "people:person@2", r#"{"name":"b"}"#, None)
            .await
            .unwrap();

        let all = svc.load_collection_objects("people", None).await.unwrap();
        assert_eq!(all.len(), 2);
        let v2 = svc
            .load_collection_objects("people", Some(" people:person@2 "))
            .await
            .unwrap();
        assert_eq!(v2.len(), 1);
        assert_eq!(v2[0].row.decode_payload().into_value()["name"], json!("b"));
    }
}
