/// Console-level configuration.
///
/// Controls entity lifetimes, metadata fetch concurrency, and the activity log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleConfig {
    /// Blocks-to-live for data entities when the caller does not pick one.
    pub default_btl: u64,
    /// Blocks-to-live for collection and schema records.
    pub long_btl: u64,
    /// Concurrent metadata fetches when enriching query results.
    pub enrich_concurrency: usize,
    /// Concurrent metadata fetches when loading a collection's objects.
    pub collection_enrich_concurrency: usize,
    /// Blocks added by an extend when the caller does not pick a number.
    pub extend_blocks: u64,
    /// Number of activity log lines retained.
    pub log_capacity: usize,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            default_btl: 300,
            long_btl: 100_000,
            enrich_concurrency: 6,
            collection_enrich_concurrency: 8,
            extend_blocks: 120,
            log_capacity: 500,
        }
    }
}
