//! Entity store implementations.
//!
//! The console talks to its backing store only through
//! [`EntityStore`](golemdb_core::EntityStore). [`MemoryEntityStore`] is the
//! in-process implementation used by tests and the CLI sandbox.

pub mod memory;

pub use memory::MemoryEntityStore;
