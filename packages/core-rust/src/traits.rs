use async_trait::async_trait;

use crate::types::{
    CreateReceipt, DeleteReceipt, EntityCreate, EntityExtend, EntityMetadata, EntityUpdate,
    ExtendReceipt, Row, UpdateReceipt,
};

/// Remote entity store the console talks to.
///
/// Implementations wrap the network client (or an in-memory stand-in for
/// tests). Every call may fail with a transport or RPC error; retries and
/// timeouts are the implementation's concern.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Returns every live entity matching `filter`, in the store's order.
    ///
    /// Rows carry the entity key and payload only; annotations must be read
    /// with [`get_entity_metadata`](EntityStore::get_entity_metadata).
    async fn query_entities(&self, filter: &str) -> anyhow::Result<Vec<Row>>;

    /// Creates entities in one batch, returning one receipt per request.
    async fn create_entities(&self, creates: Vec<EntityCreate>) -> anyhow::Result<Vec<CreateReceipt>>;

    /// Replaces payload and annotations of existing entities.
    async fn update_entities(&self, updates: Vec<EntityUpdate>) -> anyhow::Result<Vec<UpdateReceipt>>;

    /// Extends the lifetime of existing entities.
    async fn extend_entities(&self, extends: Vec<EntityExtend>) -> anyhow::Result<Vec<ExtendReceipt>>;

    /// Deletes entities by key.
    async fn delete_entities(&self, entity_keys: Vec<String>) -> anyhow::Result<Vec<DeleteReceipt>>;

    /// Annotations and lifetime of one entity.
    async fn get_entity_metadata(&self, entity_key: &str) -> anyhow::Result<EntityMetadata>;

    /// Raw payload bytes of one entity.
    async fn get_storage_value(&self, entity_key: &str) -> anyhow::Result<Vec<u8>>;

    /// Current block height.
    async fn current_block(&self) -> anyhow::Result<u64>;
}
