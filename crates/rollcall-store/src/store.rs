//! Generic timestamped store with atomic updates and predicate sweeps.

use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, trace};

use crate::config::StoreConfig;
use crate::entry::Entry;
use crate::error::{Result, StoreError};

/// Thread-safe key/value store that records when each key first appeared.
///
/// This store provides:
/// - Insert/upsert/lookup/remove with per-entry creation timestamps
/// - Atomic read-modify-write via [`try_update`](Self::try_update) and
///   [`upsert_with`](Self::upsert_with)
/// - Predicate sweeps for background expiry
/// - Thread-safe access via RwLock
///
/// Values never leave the store by reference: every read returns a clone
/// that the caller may treat as a snapshot.
pub struct TtlStore<K, V> {
    inner: Arc<RwLock<HashMap<K, Entry<V>>>>,
    config: StoreConfig,
}

impl<K, V> TtlStore<K, V>
where
    K: Eq + Hash + Clone + Display + Send + Sync,
    V: Clone + Send + Sync,
{
    /// Create an empty store.
    pub fn new(config: StoreConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    /// Get the store configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Get the current number of entries.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Insert a new entry stamped with the current time.
    ///
    /// Fails with [`StoreError::DuplicateKey`] if the key already exists.
    pub async fn insert(&self, key: K, value: V) -> Result<()> {
        let mut inner = self.inner.write().await;

        if inner.contains_key(&key) {
            return Err(StoreError::DuplicateKey(key.to_string()));
        }
        self.check_capacity(inner.len())?;

        trace!(key = %key, size = inner.len() + 1, "Entry inserted");
        inner.insert(key, Entry::new(value));
        Ok(())
    }

    /// Insert or overwrite a value.
    ///
    /// Overwriting keeps the original creation timestamp so expiry stays
    /// anchored to first insertion.
    pub async fn put(&self, key: K, value: V) -> Result<()> {
        let mut inner = self.inner.write().await;

        if let Some(entry) = inner.get_mut(&key) {
            entry.value = value;
            trace!(key = %key, "Entry overwritten");
            return Ok(());
        }

        self.check_capacity(inner.len())?;
        trace!(key = %key, size = inner.len() + 1, "Entry inserted");
        inner.insert(key, Entry::new(value));
        Ok(())
    }

    /// Get a copy of the value, or [`StoreError::NotFound`].
    pub async fn select(&self, key: &K) -> Result<V> {
        self.get(key)
            .await
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    /// Get a copy of the value if present.
    pub async fn get(&self, key: &K) -> Option<V> {
        self.inner.read().await.get(key).map(|e| e.value.clone())
    }

    /// Check if a key is present.
    pub async fn contains(&self, key: &K) -> bool {
        self.inner.read().await.contains_key(key)
    }

    /// Remove an entry, returning its value if it was present.
    pub async fn remove(&self, key: &K) -> Option<V> {
        let removed = self.inner.write().await.remove(key);
        if removed.is_some() {
            debug!(key = %key, "Entry removed");
        }
        removed.map(|e| e.value)
    }

    /// Snapshot of all keys currently stored.
    pub async fn keys(&self) -> Vec<K> {
        self.inner.read().await.keys().cloned().collect()
    }

    /// Remove every entry for which `predicate(key, value, created_at)` holds.
    ///
    /// Returns the removed keys. Entries inserted after the sweep acquires the
    /// lock are seen by the next sweep.
    pub async fn sweep<F>(&self, mut predicate: F) -> Vec<K>
    where
        F: FnMut(&K, &V, DateTime<Utc>) -> bool,
    {
        let mut inner = self.inner.write().await;
        let mut removed = Vec::new();

        inner.retain(|key, entry| {
            if predicate(key, &entry.value, entry.created_at) {
                removed.push(key.clone());
                false
            } else {
                true
            }
        });

        if !removed.is_empty() {
            debug!(count = removed.len(), remaining = inner.len(), "Swept entries");
        }

        removed
    }

    /// Apply a fallible mutation to an existing value atomically.
    ///
    /// `f` runs against a working copy while the write lock is held. The copy
    /// is committed only when `f` returns `Ok`, so a rejected mutation leaves
    /// the stored value untouched. Returns the committed value.
    pub async fn try_update<F, E>(&self, key: &K, f: F) -> std::result::Result<V, E>
    where
        F: FnOnce(&mut V) -> std::result::Result<(), E>,
        E: From<StoreError>,
    {
        let mut inner = self.inner.write().await;
        let entry = inner
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;

        let mut working = entry.value.clone();
        f(&mut working)?;
        entry.value = working.clone();

        trace!(key = %key, "Entry updated");
        Ok(working)
    }

    /// Create the value with `init` if the key is absent, otherwise mutate it
    /// with `f` as in [`try_update`](Self::try_update). Both paths run under
    /// one lock acquisition.
    pub async fn upsert_with<I, F, E>(&self, key: K, init: I, f: F) -> std::result::Result<V, E>
    where
        I: FnOnce() -> V,
        F: FnOnce(&mut V) -> std::result::Result<(), E>,
        E: From<StoreError>,
    {
        let mut inner = self.inner.write().await;

        if let Some(entry) = inner.get_mut(&key) {
            let mut working = entry.value.clone();
            f(&mut working)?;
            entry.value = working.clone();
            trace!(key = %key, "Entry updated");
            return Ok(working);
        }

        self.check_capacity(inner.len())?;
        let value = init();
        trace!(key = %key, size = inner.len() + 1, "Entry created");
        inner.insert(key, Entry::new(value.clone()));
        Ok(value)
    }

    /// Get store statistics.
    pub async fn stats(&self) -> StoreStats {
        let inner = self.inner.read().await;
        StoreStats {
            size: inner.len(),
            capacity: self.config.max_entries,
            oldest: inner.values().map(|e| e.created_at).min(),
        }
    }

    fn check_capacity(&self, len: usize) -> Result<()> {
        match self.config.max_entries {
            Some(capacity) if len >= capacity => Err(StoreError::CapacityExceeded { capacity }),
            _ => Ok(()),
        }
    }
}

impl<K, V> Clone for TtlStore<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            config: self.config.clone(),
        }
    }
}

/// Store statistics.
#[derive(Debug, Clone)]
pub struct StoreStats {
    /// Current number of entries.
    pub size: usize,

    /// Configured entry bound, if any.
    pub capacity: Option<usize>,

    /// Creation timestamp of the oldest entry.
    pub oldest: Option<DateTime<Utc>>,
}
