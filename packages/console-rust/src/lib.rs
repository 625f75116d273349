//! `GolemDB` Console: collections, schemas, and schema-checked inserts over an
//! entity store.

pub mod error;
pub mod service;
pub mod storage;

pub use error::{ConsoleError, ConsoleResult};
pub use service::{
    CollectionService, ConsoleConfig, ConsoleContext, EntityDraft, EntityService,
    UniquenessResolver,
};
pub use storage::MemoryEntityStore;
