//! Error types for store operations.

/// Error type for store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// `insert` was called for a key that is already present.
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// The key is not present in the store.
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Adding a new key would exceed the configured bound.
    #[error("Store is at capacity ({capacity} entries)")]
    CapacityExceeded { capacity: usize },
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
