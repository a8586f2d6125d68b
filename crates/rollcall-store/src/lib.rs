//! Timestamped key/value store with predicate sweeps.
//!
//! This crate provides a generic in-memory container with:
//! - A creation timestamp per entry, anchored to first insertion
//! - Atomic read-modify-write primitives for exactly-once state changes
//! - Predicate-driven sweeps for background expiry
//!
//! # Example
//!
//! ```rust,ignore
//! use rollcall_store::{StoreConfig, TtlStore};
//!
//! let store: TtlStore<String, u32> = TtlStore::new(StoreConfig::default());
//! store.insert("a".to_string(), 1).await?;
//! let removed = store.sweep(|_, v, _| *v > 0).await;
//! ```

mod config;
mod entry;
mod error;
mod store;

pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use store::{StoreStats, TtlStore};
