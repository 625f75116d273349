//! Console services over an [`EntityStore`](golemdb_core::EntityStore).
//!
//! - [`enrich`]: bounded concurrent metadata fetches for query results
//! - [`resolver`]: primary-key uniqueness and autoincrement for inserts
//! - [`collections`]: collections, schemas, and schema-checked inserts
//! - [`entities`]: raw create/update/extend/delete/query/load
//!
//! All services share one [`ConsoleContext`].

pub mod collections;
pub mod config;
pub mod context;
pub mod enrich;
pub mod entities;
pub mod log;
pub mod resolver;

pub use collections::{CollectionInsert, CollectionService, CollectionSummary};
pub use config::ConsoleConfig;
pub use context::ConsoleContext;
pub use enrich::{enrich_rows, EnrichedRow};
pub use entities::{EntityDraft, EntityService, LoadedEntity, QueryRow};
pub use log::ConsoleLog;
pub use resolver::UniquenessResolver;
