//! In-memory [`EntityStore`] backed by [`DashMap`].
//!
//! Stands in for the remote store in tests and offline sessions. Entities
//! live for a number of blocks; the block height only moves when
//! [`MemoryEntityStore::advance_blocks`] is called.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use dashmap::DashMap;
use golemdb_core::{
    CreateReceipt, DeleteReceipt, EntityCreate, EntityExtend, EntityMetadata, EntityStore,
    EntityUpdate, ExtendReceipt, FilterExpr, NumericAnnotation, Row, StringAnnotation,
    UpdateReceipt,
};
use parking_lot::RwLock;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct StoredEntity {
    data: Vec<u8>,
    string_annotations: Vec<StringAnnotation>,
    numeric_annotations: Vec<NumericAnnotation>,
    expires_at_block: u64,
    /// Creation order, used to return query results deterministically.
    seq: u64,
}

/// In-memory entity store.
///
/// Reads never see entities whose expiry block has been reached. Metadata
/// reads can be made to fail per key with
/// [`fail_metadata_for`](MemoryEntityStore::fail_metadata_for).
pub struct MemoryEntityStore {
    entities: DashMap<String, StoredEntity>,
    block: AtomicU64,
    next_seq: AtomicU64,
    owner: Option<String>,
    failing_metadata: RwLock<HashSet<String>>,
}

impl MemoryEntityStore {
    /// Creates an empty store at block 0.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entities: DashMap::new(),
            block: AtomicU64::new(0),
            next_seq: AtomicU64::new(0),
            owner: None,
            failing_metadata: RwLock::new(HashSet::new()),
        }
    }

    /// Reports `owner` as the creator of every entity.
    #[must_use]
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// Moves the block height forward.
    pub fn advance_blocks(&self, blocks: u64) {
        self.block.fetch_add(blocks, Ordering::SeqCst);
    }

    /// Makes `get_entity_metadata` fail for `entity_key`.
    pub fn fail_metadata_for(&self, entity_key: impl Into<String>) {
        self.failing_metadata.write().insert(entity_key.into());
    }

    /// Number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        let block = self.block();
        self.entities
            .iter()
            .filter(|e| e.value().expires_at_block > block)
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn block(&self) -> u64 {
        self.block.load(Ordering::SeqCst)
    }

    fn live(&self, entity_key: &str) -> anyhow::Result<StoredEntity> {
        let block = self.block();
        self.entities
            .get(entity_key)
            .map(|e| e.value().clone())
            .filter(|e| e.expires_at_block > block)
            .ok_or_else(|| anyhow!("entity {entity_key} not found or expired"))
    }
}

fn expiry(from_block: u64, blocks: u64) -> anyhow::Result<u64> {
    from_block
        .checked_add(blocks)
        .ok_or_else(|| anyhow!("expiry overflows the block height: {from_block} + {blocks}"))
}

impl Default for MemoryEntityStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntityStore for MemoryEntityStore {
    async fn query_entities(&self, filter: &str) -> anyhow::Result<Vec<Row>> {
        let expr = FilterExpr::parse(filter)?;
        let block = self.block();
        let mut hits: Vec<(u64, Row)> = self
            .entities
            .iter()
            .filter(|e| e.value().expires_at_block > block)
            .filter(|e| expr.matches(&e.value().string_annotations, &e.value().numeric_annotations))
            .map(|e| {
                (
                    e.value().seq,
                    Row {
                        entity_key: e.key().clone(),
                        storage_value: e.value().data.clone(),
                        ..Row::default()
                    },
                )
            })
            .collect();
        hits.sort_by_key(|(seq, _)| *seq);
        debug!(filter, hits = hits.len(), "query");
        Ok(hits.into_iter().map(|(_, row)| row).collect())
    }

    async fn create_entities(&self, creates: Vec<EntityCreate>) -> anyhow::Result<Vec<CreateReceipt>> {
        if creates.iter().any(|c| c.btl == 0) {
            bail!("btl must be at least one block");
        }
        let block = self.block();
        let expirations = creates
            .iter()
            .map(|c| expiry(block, c.btl))
            .collect::<anyhow::Result<Vec<_>>>()?;
        let receipts = creates
            .into_iter()
            .zip(expirations)
            .map(|(create, expiration_block)| {
                let entity_key = format!("0x{}", Uuid::new_v4().simple());
                self.entities.insert(
                    entity_key.clone(),
                    StoredEntity {
                        data: create.data,
                        string_annotations: create.string_annotations,
                        numeric_annotations: create.numeric_annotations,
                        expires_at_block: expiration_block,
                        seq: self.next_seq.fetch_add(1, Ordering::SeqCst),
                    },
                );
                CreateReceipt {
                    entity_key,
                    expiration_block,
                }
            })
            .collect();
        Ok(receipts)
    }

    async fn update_entities(&self, updates: Vec<EntityUpdate>) -> anyhow::Result<Vec<UpdateReceipt>> {
        let block = self.block();
        let mut expirations = Vec::with_capacity(updates.len());
        for update in &updates {
            self.live(&update.entity_key)?;
            if update.btl == 0 {
                bail!("btl must be at least one block");
            }
            expirations.push(expiry(block, update.btl)?);
        }
        let receipts = updates
            .into_iter()
            .zip(expirations)
            .map(|(update, expiration_block)| {
                if let Some(mut entity) = self.entities.get_mut(&update.entity_key) {
                    entity.data = update.data;
                    entity.string_annotations = update.string_annotations;
                    entity.numeric_annotations = update.numeric_annotations;
                    entity.expires_at_block = expiration_block;
                }
                UpdateReceipt {
                    entity_key: update.entity_key,
                    expiration_block,
                }
            })
            .collect();
        Ok(receipts)
    }

    async fn extend_entities(&self, extends: Vec<EntityExtend>) -> anyhow::Result<Vec<ExtendReceipt>> {
        let mut expirations = Vec::with_capacity(extends.len());
        for extend in &extends {
            let entity = self.live(&extend.entity_key)?;
            expirations.push(expiry(entity.expires_at_block, extend.number_of_blocks)?);
        }
        let receipts = extends
            .into_iter()
            .zip(expirations)
            .map(|(extend, new_expiration_block)| {
                if let Some(mut entity) = self.entities.get_mut(&extend.entity_key) {
                    entity.expires_at_block = new_expiration_block;
                }
                ExtendReceipt {
                    entity_key: extend.entity_key,
                    new_expiration_block,
                }
            })
            .collect();
        Ok(receipts)
    }

    async fn delete_entities(&self, entity_keys: Vec<String>) -> anyhow::Result<Vec<DeleteReceipt>> {
        for key in &entity_keys {
            self.live(key)?;
        }
        Ok(entity_keys
            .into_iter()
            .map(|entity_key| {
                self.entities.remove(&entity_key);
                DeleteReceipt { entity_key }
            })
            .collect())
    }

    async fn get_entity_metadata(&self, entity_key: &str) -> anyhow::Result<EntityMetadata> {
        if self.failing_metadata.read().contains(entity_key) {
            bail!("metadata unavailable for {entity_key}");
        }
        let entity = self.live(entity_key)?;
        Ok(EntityMetadata {
            string_annotations: entity.string_annotations,
            numeric_annotations: entity.numeric_annotations,
            expires_at_block: entity.expires_at_block,
            owner: self.owner.clone(),
        })
    }

    async fn get_storage_value(&self, entity_key: &str) -> anyhow::Result<Vec<u8>> {
        Ok(self.live(entity_key)?.data)
    }

    async fn current_block(&self) -> anyhow::Result<u64> {
        Ok(self.block())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(payload: &str, btl: u64, strings: &[(&str, &str)]) -> EntityCreate {
        EntityCreate {
            data: payload.as_bytes().to_vec(),
            btl,
            string_annotations: strings
                .iter()
                .map(|(k, v)| StringAnnotation::new(*k, *v))
                .collect(),
            numeric_annotations: vec![NumericAnnotation::new("version", 1.0)],
        }
    }

    #[tokio::test]
    async fn create_then_query_in_creation_order() {
        let store = MemoryEntityStore::new();
        let receipts = store
            .create_entities(vec![
                create("1", 10, &[("collection", "a")]),
                create("2", 10, &[("collection", "b")]),
                create("3", 10, &[("collection", "a")]),
            ])
            .await
            .unwrap();
        assert_eq!(receipts.len(), 3);
        assert!(receipts[0].entity_key.starts_with("0x"));
        assert_eq!(receipts[0].expiration_block, 10);

        let rows = store.query_entities(r#"collection = "a""#).await.unwrap();
        let payloads: Vec<&[u8]> = rows.iter().map(|r| r.storage_value.as_slice()).collect();
        assert_eq!(payloads, vec![b"1".as_slice(), b"3".as_slice()]);
        // Query rows do not carry annotations.
        assert!(rows[0].string_annotations.is_empty());
    }

    #[tokio::test]
    async fn numeric_filters_match_numeric_annotations() {
        let store = MemoryEntityStore::new();
        store
            .create_entities(vec![create("x", 5, &[])])
            .await
            .unwrap();
        assert_eq!(store.query_entities("version = 1").await.unwrap().len(), 1);
        assert!(store.query_entities("version = 2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_filter_is_an_error() {
        let store = MemoryEntityStore::new();
        assert!(store.query_entities("collection ==").await.is_err());
    }

    #[tokio::test]
    async fn entities_expire_after_btl() {
        let store = MemoryEntityStore::new();
        let [receipt] = store
            .create_entities(vec![create("x", 3, &[])])
            .await
            .unwrap()
            .try_into()
            .unwrap();
        store.advance_blocks(2);
        assert_eq!(store.len(), 1);
        store.advance_blocks(1);
        assert!(store.is_empty());
        assert!(store.get_storage_value(&receipt.entity_key).await.is_err());
        assert!(store.get_entity_metadata(&receipt.entity_key).await.is_err());
    }

    #[tokio::test]
    async fn zero_btl_is_rejected() {
        let store = MemoryEntityStore::new();
        assert!(store.create_entities(vec![create("x", 0, &[])]).await.is_err());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn expiry_past_u64_is_rejected() {
        let store = MemoryEntityStore::new();
        store.advance_blocks(1);
        let err = store
            .create_entities(vec![create("ok", 5, &[]), create("x", u64::MAX, &[])])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("overflows"));
        // Nothing from the batch was written.
        assert!(store.is_empty());

        let key = store
            .create_entities(vec![create("a", 5, &[])])
            .await
            .unwrap()
            .remove(0)
            .entity_key;
        let update = EntityUpdate {
            entity_key: key.clone(),
            data: b"b".to_vec(),
            btl: u64::MAX,
            string_annotations: vec![],
            numeric_annotations: vec![],
        };
        assert!(store.update_entities(vec![update]).await.is_err());
        assert_eq!(store.get_storage_value(&key).await.unwrap(), b"a");

        let extend = EntityExtend {
            entity_key: key.clone(),
            number_of_blocks: u64::MAX,
        };
        assert!(store.extend_entities(vec![extend]).await.is_err());
        let meta = store.get_entity_metadata(&key).await.unwrap();
        assert_eq!(meta.expires_at_block, 6);
    }

    #[tokio::test]
    async fn update_extend_delete() {
        let store = MemoryEntityStore::new().with_owner("0xowner");
        let key = store
            .create_entities(vec![create("old", 10, &[("collection", "a")])])
            .await
            .unwrap()
            .remove(0)
            .entity_key;

        store.advance_blocks(4);
        let updated = store
            .update_entities(vec![EntityUpdate {
                entity_key: key.clone(),
                data: b"new".to_vec(),
                btl: 10,
                string_annotations: vec![StringAnnotation::new("collection", "b")],
                numeric_annotations: vec![],
            }])
            .await
            .unwrap();
        assert_eq!(updated[0].expiration_block, 14);
        assert_eq!(store.get_storage_value(&key).await.unwrap(), b"new");
        assert!(store.query_entities(r#"collection = "a""#).await.unwrap().is_empty());

        let extended = store
            .extend_entities(vec![EntityExtend {
                entity_key: key.clone(),
                number_of_blocks: 6,
            }])
            .await
            .unwrap();
        assert_eq!(extended[0].new_expiration_block, 20);

        let meta = store.get_entity_metadata(&key).await.unwrap();
        assert_eq!(meta.expires_at_block, 20);
        assert_eq!(meta.owner.as_deref(), Some("0xowner"));
        assert_eq!(meta.string_annotations[0].value, "b");

        store.delete_entities(vec![key.clone()]).await.unwrap();
        assert!(store.is_empty());
        assert!(store.delete_entities(vec![key]).await.is_err());
    }

    #[tokio::test]
    async fn unknown_keys_fail() {
        let store = MemoryEntityStore::new();
        let err = store
            .extend_entities(vec![EntityExtend {
                entity_key: "0xmissing".into(),
                number_of_blocks: 1,
            }])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("0xmissing"));
    }

    #[tokio::test]
    async fn injected_metadata_failure() {
        let store = MemoryEntityStore::new();
        let key = store
            .create_entities(vec![create("x", 5, &[])])
            .await
            .unwrap()
            .remove(0)
            .entity_key;
        store.fail_metadata_for(key.clone());
        assert!(store.get_entity_metadata(&key).await.is_err());
        // Payload reads are unaffected.
        assert!(store.get_storage_value(&key).await.is_ok());
    }
}
