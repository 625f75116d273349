use std::sync::Arc;

use golemdb_core::{ClockSource, EntityStore, SystemClock};

use crate::service::config::ConsoleConfig;
use crate::service::log::ConsoleLog;

/// Shared state handed to every console service.
///
/// Cheap to clone; all members are reference counted.
#[derive(Clone)]
pub struct ConsoleContext {
    pub store: Arc<dyn EntityStore>,
    pub config: Arc<ConsoleConfig>,
    /// Source of `createdAt` timestamps.
    pub clock: Arc<dyn ClockSource>,
    pub log: Arc<ConsoleLog>,
}

impl ConsoleContext {
    pub fn new(store: Arc<dyn EntityStore>, config: ConsoleConfig) -> Self {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<dyn EntityStore>,
        config: ConsoleConfig,
        clock: Arc<dyn ClockSource>,
    ) -> Self {
        let log = Arc::new(ConsoleLog::new(config.log_capacity));
        Self {
            store,
            config: Arc::new(config),
            clock,
            log,
        }
    }
}

impl std::fmt::Debug for ConsoleContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
