//! Generic entity operations: query, create, update, extend, delete, load.

use golemdb_core::types::keys;
use golemdb_core::{
    validate_payload, CreateReceipt, DeleteReceipt, EntityCreate, EntityExtend, EntityMetadata,
    EntityUpdate, ExtendReceipt, NumericAnnotation, Payload, Row, StringAnnotation,
    UpdateReceipt, ValidationResult,
};
use serde_json::Value;

use crate::error::{ConsoleError, ConsoleResult};
use crate::service::collections::CollectionService;
use crate::service::context::ConsoleContext;

/// A query result with its payload decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRow {
    pub row: Row,
    pub payload: Payload,
}

/// Payload and annotations for a create or update.
///
/// `collection` and `schema_id` are appended as annotations when set, and a
/// set `schema_id` makes the payload validate against that schema first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityDraft {
    pub payload: String,
    /// Blocks-to-live; the configured default when `None`.
    pub btl: Option<u64>,
    pub string_annotations: Vec<StringAnnotation>,
    pub numeric_annotations: Vec<NumericAnnotation>,
    pub collection: Option<String>,
    pub schema_id: Option<String>,
}

/// An entity loaded by key.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedEntity {
    pub metadata: EntityMetadata,
    /// Pretty-printed JSON, or the raw text when the payload is not JSON.
    pub payload: String,
}

// ---------------------------------------------------------------------------
// EntityService
// ---------------------------------------------------------------------------

/// Raw entity operations with optional schema validation.
#[derive(Debug, Clone)]
pub struct EntityService {
    ctx: ConsoleContext,
    collections: CollectionService,
}

impl EntityService {
    pub fn new(ctx: ConsoleContext) -> Self {
        let collections = CollectionService::new(ctx.clone());
        Self { ctx, collections }
    }

    /// Runs a filter expression against the store. The filter is passed
    /// through untouched.
    ///
    /// # Errors
    ///
    /// `Store` when the query fails.
    pub async fn run_query(&self, filter: &str) -> ConsoleResult<Vec<QueryRow>> {
        let rows = match self.ctx.store.query_entities(filter).await {
            Ok(rows) => rows,
            Err(err) => {
                self.ctx.log.push(format!("Query error: {err}"));
                return Err(err.into());
            }
        };
        self.ctx.log.push(format!("Query OK ({} rows)", rows.len()));
        Ok(rows
            .into_iter()
            .map(|row| QueryRow {
                payload: row.decode_payload(),
                row,
            })
            .collect())
    }

    /// Creates one entity from `draft`.
    ///
    /// # Errors
    ///
    /// `InvalidJson`/`InvalidPayload` when a selected schema rejects the
    /// payload, or `Store` when the write fails.
    pub async fn create(&self, draft: EntityDraft) -> ConsoleResult<CreateReceipt> {
        self.validate_against_selected(&draft).await?;
        let (string_annotations, numeric_annotations) = annotations(&draft);
        let create = EntityCreate {
            data: draft.payload.into_bytes(),
            btl: draft.btl.unwrap_or(self.ctx.config.default_btl),
            string_annotations,
            numeric_annotations,
        };
        let receipt = self
            .ctx
            .store
            .create_entities(vec![create])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("store returned no receipt"))?;
        self.ctx.log.push(format!(
            "Created entityKey: {} (expires @ {})",
            receipt.entity_key, receipt.expiration_block
        ));
        Ok(receipt)
    }

    /// Replaces the payload and annotations of `entity_key`.
    ///
    /// # Errors
    ///
    /// `MissingInput` for a blank key, validation errors as for
    /// [`create`](Self::create), or `Store` when the write fails.
    pub async fn update(&self, entity_key: &str, draft: EntityDraft) -> ConsoleResult<UpdateReceipt> {
        let entity_key = required_key(entity_key)?;
        self.validate_against_selected(&draft).await?;
        let (string_annotations, numeric_annotations) = annotations(&draft);
        let update = EntityUpdate {
            entity_key: entity_key.to_string(),
            data: draft.payload.into_bytes(),
            btl: draft.btl.unwrap_or(self.ctx.config.default_btl),
            string_annotations,
            numeric_annotations,
        };
        let receipt = self
            .ctx
            .store
            .update_entities(vec![update])
            .await
            .map_err(|err| {
                self.ctx.log.push(format!("Update error: {err}"));
                err
            })?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("store returned no receipt"))?;
        self.ctx
            .log
            .push(format!("Updated entityKey: {}", receipt.entity_key));
        Ok(receipt)
    }

    /// Extends the lifetime of `entity_key` by `blocks`, or the configured
    /// default.
    ///
    /// # Errors
    ///
    /// `MissingInput` for a blank key, or `Store` when the write fails.
    pub async fn extend(&self, entity_key: &str, blocks: Option<u64>) -> ConsoleResult<ExtendReceipt> {
        let entity_key = required_key(entity_key)?;
        let extend = EntityExtend {
            entity_key: entity_key.to_string(),
            number_of_blocks: blocks.unwrap_or(self.ctx.config.extend_blocks),
        };
        let receipt = self
            .ctx
            .store
            .extend_entities(vec![extend])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("store returned no receipt"))?;
        self.ctx.log.push(format!(
            "Extended to block: {}",
            receipt.new_expiration_block
        ));
        Ok(receipt)
    }

    /// # Errors
    ///
    /// `MissingInput` for a blank key, or `Store` when the delete fails.
    pub async fn delete(&self, entity_key: &str) -> ConsoleResult<DeleteReceipt> {
        let entity_key = required_key(entity_key)?;
        let receipt = self
            .ctx
            .store
            .delete_entities(vec![entity_key.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("store returned no receipt"))?;
        self.ctx
            .log
            .push(format!("Deleted entityKey: {}", receipt.entity_key));
        Ok(receipt)
    }

    /// Loads the metadata and payload of `entity_key`.
    ///
    /// # Errors
    ///
    /// `MissingInput` for a blank key, or `Store` when either read fails.
    pub async fn load_by_key(&self, entity_key: &str) -> ConsoleResult<LoadedEntity> {
        let entity_key = required_key(entity_key)?;
        let metadata = self.ctx.store.get_entity_metadata(entity_key).await?;
        self.ctx.log.push(format!(
            "Loaded meta: expiresAtBlock={}",
            metadata.expires_at_block
        ));
        let bytes = self.ctx.store.get_storage_value(entity_key).await?;
        Ok(LoadedEntity {
            metadata,
            payload: Payload::decode(&bytes).to_pretty(),
        })
    }

    /// Validates the draft's payload when it names a known schema.
    ///
    /// No schema selected, or a schema id that matches no record, means no
    /// validation.
    async fn validate_against_selected(&self, draft: &EntityDraft) -> ConsoleResult<()> {
        let Some(schema_id) = draft
            .schema_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        else {
            return Ok(());
        };
        let schema = match self.collections.find_schema(schema_id).await {
            Ok(record) => record.schema,
            Err(ConsoleError::UnknownSchema(_)) => return Ok(()),
            Err(err) => return Err(err),
        };
        let data: Value = serde_json::from_str(&draft.payload).inspect_err(|err| {
            self.ctx
                .log
                .push(format!("Schema validate: payload is not JSON: {err}"));
        })?;
        let ValidationResult::Invalid { errors } = validate_payload(&schema, &data) else {
            return Ok(());
        };
        for error in &errors {
            self.ctx.log.push(format!("Schema error: {error}"));
        }
        Err(ConsoleError::InvalidPayload { errors })
    }
}

fn required_key(entity_key: &str) -> ConsoleResult<&str> {
    let key = entity_key.trim();
    if key.is_empty() {
        return Err(ConsoleError::MissingInput("entity key"));
    }
    Ok(key)
}

/// Draft annotations with blank keys dropped and the collection/schema links
/// appended.
fn annotations(draft: &EntityDraft) -> (Vec<StringAnnotation>, Vec<NumericAnnotation>) {
    let mut strings: Vec<StringAnnotation> = draft
        .string_annotations
        .iter()
        .filter(|a| !a.key.is_empty())
        .cloned()
        .collect();
    if let Some(collection) = draft.collection.as_deref().filter(|c| !c.is_empty()) {
        strings.push(StringAnnotation::new(keys::COLLECTION, collection));
    }
    if let Some(schema_id) = draft.schema_id.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        strings.push(StringAnnotation::new(keys::SCHEMA_ID, schema_id));
    }
    let numbers = draft
        .numeric_annotations
        .iter()
        .filter(|a| !a.key.is_empty())
        .cloned()
        .collect();
    (strings, numbers)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use golemdb_core::EntityStore;
    use serde_json::json;

    use super::*;
    use crate::service::config::ConsoleConfig;
    use crate::storage::MemoryEntityStore;

    fn setup() -> (Arc<MemoryEntityStore>, EntityService) {
        let store = Arc::new(MemoryEntityStore::new().with_owner("0xowner"));
        let ctx = ConsoleContext::new(store.clone(), ConsoleConfig::default());
        (store, EntityService::new(ctx))
    }

    fn draft(payload: &str) -> EntityDraft {
        EntityDraft {
            payload: payload.to_string(),
            ..EntityDraft::default()
        }
    }

    #[tokio::test]
    async fn create_appends_links_and_drops_blank_keys() {
        let (store, svc) = setup();
        let receipt = svc
            .create(EntityDraft {
                string_annotations: vec![
                    StringAnnotation::new("kind", "note"),
                    StringAnnotation::new("", "ignored"),
                ],
                numeric_annotations: vec![NumericAnnotation::new("prio", 2.0)],
                collection: Some("notes".into()),
                ..draft("hello")
            })
            .await
            .unwrap();
        assert_eq!(receipt.expiration_block, 300);

        let meta = store.get_entity_metadata(&receipt.entity_key).await.unwrap();
        assert_eq!(
            meta.string_annotations,
            vec![
                StringAnnotation::new("kind", "note"),
                StringAnnotation::new("collection", "notes"),
            ]
        );
        assert_eq!(meta.numeric_annotations.len(), 1);
    }

    #[tokio::test]
    async fn run_query_decodes_payloads() {
        let (_store, svc) = setup();
        svc.create(EntityDraft {
            collection: Some("notes".into()),
            ..draft(r#"{"a":1}"#)
        })
        .await
        .unwrap();
        svc.create(EntityDraft {
            collection: Some("notes".into()),
            ..draft("plain text")
        })
        .await
        .unwrap();

        let rows = svc.run_query(r#"collection = "notes""#).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].payload, Payload::Json(json!({"a": 1})));
        assert_eq!(rows[1].payload, Payload::Text("plain text".into()));
        assert_eq!(svc.ctx.log.last().as_deref(), Some("Query OK (2 rows)"));

        assert!(svc.run_query("collection =").await.is_err());
    }

    #[tokio::test]
    async fn selected_schema_gates_create_and_update() {
        let (store, svc) = setup();
        svc.collections
            .create_schema(
                "notes",
                "note",
                1,
                json!({"type": "object", "properties": {"title": {"type": "string"}}, "required": ["title"]}),
            )
            .await
            .unwrap();

        let err = svc
            .create(EntityDraft {
                schema_id: Some("notes:note@1".into()),
                ..draft("{}")
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ConsoleError::InvalidPayload { .. }));
        assert_eq!(svc.ctx.log.last().as_deref(), Some("Schema error: missing required: title"));

        let not_json = svc
            .create(EntityDraft {
                schema_id: Some("notes:note@1".into()),
                ..draft("nope")
            })
            .await
            .unwrap_err();
        assert!(matches!(not_json, ConsoleError::InvalidJson(_)));

        let receipt = svc
            .create(EntityDraft {
                schema_id: Some(" notes:note@1 ".into()),
                ..draft(r#"{"title":"t"}"#)
            })
            .await
            .unwrap();
        let meta = store.get_entity_metadata(&receipt.entity_key).await.unwrap();
        assert_eq!(meta.string_annotations, vec![StringAnnotation::new("schemaId", "notes:note@1")]);

        let err = svc
            .update(
                &receipt.entity_key,
                EntityDraft {
                    schema_id: Some("notes:note@1".into()),
                    ..draft(r#"{"title":3}"#)
                },
            )
            .await
            .unwrap_err();
        let ConsoleError::InvalidPayload { errors } = err else {
            panic!("expected InvalidPayload, got {err:?}");
        };
        assert_eq!(errors, vec!["title: expected string, got number"]);
    }

    #[tokio::test]
    async fn unknown_schema_skips_validation() {
        let (_store, svc) = setup();
        svc.create(EntityDraft {
            schema_id: Some("nowhere:x@1".into()),
            ..draft("not even json")
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn update_extend_delete_lifecycle() {
        let (store, svc) = setup();
        let key = svc.create(draft("v1")).await.unwrap().entity_key;

        store.advance_blocks(50);
        let updated = svc
            .update(&key, EntityDraft { btl: Some(20), ..draft("v2") })
            .await
            .unwrap();
        assert_eq!(updated.expiration_block, 70);

        let extended = svc.extend(&key, None).await.unwrap();
        assert_eq!(extended.new_expiration_block, 190);
        let extended = svc.extend(&key, Some(10)).await.unwrap();
        assert_eq!(extended.new_expiration_block, 200);

        let loaded = svc.load_by_key(&format!(" {key} ")).await.unwrap();
        assert_eq!(loaded.payload, "v2");
        assert_eq!(loaded.metadata.expires_at_block, 200);
        assert_eq!(loaded.metadata.owner.as_deref(), Some("0xowner"));

        svc.delete(&key).await.unwrap();
        assert!(svc.load_by_key(&key).await.is_err());
        assert!(svc.extend(&key, None).await.is_err());
    }

    #[tokio::test]
    async fn load_by_key_pretty_prints_json() {
        let (_store, svc) = setup();
        let key = svc.create(draft(r#"{"a":[1,2]}"#)).await.unwrap().entity_key;
        let loaded = svc.load_by_key(&key).await.unwrap();
        assert_eq!(loaded.payload, "{\n  \"a\": [\n    1,\n    2\n  ]\n}");
    }

    #[tokio::test]
    async fn blank_keys_are_rejected() {
        let (_store, svc) = setup();
        assert!(matches!(
            svc.delete("  ").await,
            Err(ConsoleError::MissingInput("entity key"))
        ));
        assert!(matches!(
            svc.update("", draft("{}")).await,
            Err(ConsoleError::MissingInput(_))
        ));
        assert!(matches!(
            svc.load_by_key("").await,
            Err(ConsoleError::MissingInput(_))
        ));
    }
}
