//! Concurrent per-row metadata enrichment.
//!
//! Query results carry only the entity key and payload. [`enrich_rows`] fetches
//! each row's metadata with a fixed number of workers that pull indices from
//! one shared cursor and write into pre-sized slots, so the output order is the
//! input order regardless of completion order.

use std::sync::atomic::{AtomicUsize, Ordering};

use futures_util::future::join_all;
use golemdb_core::{EntityMetadata, EntityStore, Row};
use parking_lot::Mutex;
use tracing::{debug, warn};

/// A row with its annotations filled in from metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedRow {
    /// The row, with annotations replaced by the fetched ones (or emptied on
    /// failure).
    pub row: Row,
    /// Full metadata, when the fetch succeeded.
    pub meta: Option<EntityMetadata>,
    /// Fetch failure message, when it did not.
    pub meta_error: Option<String>,
}

impl EnrichedRow {
    fn with_meta(mut row: Row, meta: EntityMetadata) -> Self {
        row.string_annotations.clone_from(&meta.string_annotations);
        row.numeric_annotations.clone_from(&meta.numeric_annotations);
        Self {
            row,
            meta: Some(meta),
            meta_error: None,
        }
    }

    fn failed(mut row: Row, error: String) -> Self {
        row.string_annotations.clear();
        row.numeric_annotations.clear();
        Self {
            row,
            meta: None,
            meta_error: Some(error),
        }
    }
}

/// Fetches metadata for every row with at most `concurrency` requests in flight.
///
/// The result has one element per input row, in input order. A failed fetch
/// marks only its own element; it never aborts the batch.
pub async fn enrich_rows<S>(store: &S, rows: Vec<Row>, concurrency: usize) -> Vec<EnrichedRow>
where
    S: EntityStore + ?Sized,
{
    let total = rows.len();
    if total == 0 {
        return Vec::new();
    }
    let workers = concurrency.clamp(1, total);
    debug!(rows = total, workers, "enriching rows");

    let cursor = AtomicUsize::new(0);
    let slots: Mutex<Vec<Option<EnrichedRow>>> = Mutex::new((0..total).map(|_| None).collect());

    let (cursor, slots, rows) = (&cursor, &slots, &rows);
    let worker = || async move {
        loop {
            let i = cursor.fetch_add(1, Ordering::Relaxed);
            let Some(row) = rows.get(i) else {
                break;
            };
            let enriched = match store.get_entity_metadata(&row.entity_key).await {
                Ok(meta) => EnrichedRow::with_meta(row.clone(), meta),
                Err(err) => {
                    warn!(entity_key = %row.entity_key, error = %err, "metadata fetch failed");
                    EnrichedRow::failed(row.clone(), err.to_string())
                }
            };
            slots.lock()[i] = Some(enriched);
        }
    };
    join_all((0..workers).map(|_| worker())).await;

    let slots = std::mem::take(&mut *slots.lock());
    slots.into_iter().flatten().collect()
}
