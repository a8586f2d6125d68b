//! Configuration for the store.

/// Default entry bound (none - the store grows with its callers).
pub const DEFAULT_MAX_ENTRIES: Option<usize> = None;

/// Configuration for a [`TtlStore`](crate::TtlStore).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Maximum number of entries. New keys beyond this bound are rejected;
    /// existing entries are never evicted to make room.
    pub max_entries: Option<usize>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

impl StoreConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound the number of entries.
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = Some(max);
        self
    }
}
