//! Fetch-then-decide primary-key resolution for collection inserts.
//!
//! The check reads the collection's current payloads and then decides with
//! [`resolve_against_existing`]. Nothing is held between the read and the
//! caller's subsequent write, so concurrent inserts into the same collection
//! can both pass. Stores without conditional writes cannot close that window.

use golemdb_core::{collection_filter, detect_primary, resolve_against_existing, EntityStore};
use serde_json::Value;
use tracing::debug;

use crate::error::ConsoleResult;
use crate::service::enrich::enrich_rows;

/// Resolves candidate rows against the existing objects of a collection.
pub struct UniquenessResolver<'a, S: EntityStore + ?Sized> {
    store: &'a S,
    concurrency: usize,
}

impl<'a, S: EntityStore + ?Sized> UniquenessResolver<'a, S> {
    /// `concurrency` bounds the metadata fetches made while loading objects.
    pub fn new(store: &'a S, concurrency: usize) -> Self {
        Self { store, concurrency }
    }

    /// Decoded payloads of the non-reserved rows in `collection`, optionally
    /// narrowed to one schema id.
    ///
    /// # Errors
    ///
    /// Returns the store error when the query itself fails. Individual
    /// metadata failures do not fail the call.
    pub async fn fetch_existing(
        &self,
        collection: &str,
        schema_id: Option<&str>,
    ) -> anyhow::Result<Vec<Value>> {
        let filter = collection_filter(collection, schema_id);
        let rows = self.store.query_entities(&filter.to_string()).await?;
        let enriched = enrich_rows(self.store, rows, self.concurrency).await;
        let existing: Vec<Value> = enriched
            .into_iter()
            .filter(|e| !e.row.is_reserved())
            .map(|e| e.row.decode_payload().into_value())
            .collect();
        debug!(collection, existing = existing.len(), "fetched existing objects");
        Ok(existing)
    }

    /// Checks `candidate` against `schema`'s primary key and the objects
    /// already stored under `schema_id`, filling in an autoincrement value when
    /// one is needed.
    ///
    /// Schemas without a primary key skip the fetch entirely.
    ///
    /// # Errors
    ///
    /// [`ConsoleError::Conflict`](crate::error::ConsoleError::Conflict) for a
    /// missing or duplicate key, or `Store` when the fetch fails.
    pub async fn resolve_insert(
        &self,
        collection: &str,
        schema_id: &str,
        candidate: Value,
        schema: &Value,
    ) -> ConsoleResult<Value> {
        let Some(primary) = detect_primary(schema) else {
            return Ok(candidate);
        };
        let existing = self.fetch_existing(collection, Some(schema_id)).await?;
        Ok(resolve_against_existing(Some(&primary), candidate, &existing)?)
    }
}
