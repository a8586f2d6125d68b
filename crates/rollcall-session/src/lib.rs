//! Session lifecycle engine for Rollcall.
//!
//! Participants join a named session, the session activates once a target is
//! set, and it resolves to success or failure. This crate provides:
//! - [`Session`]: the per-session state machine
//! - [`SessionCoordinator`]: validated operations with exactly-once transitions
//! - [`spawn_reaper`]: a background task evicting expired, non-active sessions
//! - [`UserDirectory`]: the seam for resolving usernames to user records
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use rollcall_session::{InMemoryDirectory, SessionConfig, SessionCoordinator, User};
//!
//! let directory = Arc::new(InMemoryDirectory::with_users([User::new("alice")]));
//! let coordinator = SessionCoordinator::new(SessionConfig::default(), directory)?;
//!
//! coordinator.join(User::new("alice"), "abc-1").await?;
//! coordinator.start("abc-1", 100).await?;
//! coordinator.success("abc-1").await?;
//! ```

mod config;
mod coordinator;
mod directory;
mod error;
mod reaper;
mod session;

pub use config::{
    DEFAULT_REAP_INTERVAL_SECS, DEFAULT_RETENTION_SECS, DEFAULT_SESSION_ID_PATTERN, RollcallConfig,
    SessionConfig, config_dir, default_config_path,
};
pub use coordinator::SessionCoordinator;
pub use directory::{InMemoryDirectory, User, UserDirectory};
pub use error::{ConfigError, Result, SessionError};
pub use reaper::{run_reaper, spawn_reaper};
pub use session::{Session, SessionStatus};

pub use rollcall_store::{StoreStats, TtlStore};
