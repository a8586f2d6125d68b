//! Stored values with their creation timestamps.

use chrono::{DateTime, Utc};

/// A value held by the store together with the moment it was first inserted.
///
/// `created_at` is fixed when the key first appears. Overwrites through
/// [`TtlStore::put`](crate::TtlStore::put) replace `value` only.
#[derive(Debug, Clone)]
pub(crate) struct Entry<V> {
    pub(crate) value: V,
    pub(crate) created_at: DateTime<Utc>,
}

impl<V> Entry<V> {
    /// Create an entry stamped with the current time.
    pub(crate) fn new(value: V) -> Self {
        Self {
            value,
            created_at: Utc::now(),
        }
    }
}
