//! Error types for session coordination and configuration.

use rollcall_store::StoreError;

use crate::session::SessionStatus;

/// Error type for coordinator and state machine operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The session id does not match the configured pattern.
    #[error("Invalid session id: {0:?}")]
    InvalidIdentifier(String),

    /// The operation needs an existing session.
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// A join was attempted while the session is running.
    #[error("Session is active and cannot be joined: {0}")]
    SessionBusy(String),

    /// The state machine rejected the operation from the current status.
    #[error("Cannot {action} session {session_id} while {status}")]
    InvalidTransition {
        session_id: String,
        status: SessionStatus,
        action: &'static str,
    },

    /// The user directory has no record for this username.
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// A session was inserted twice. Indicates a coordinator bug.
    #[error("Duplicate session: {0}")]
    DuplicateKey(String),

    /// The session table is full.
    #[error("Session table is at capacity ({capacity} sessions)")]
    CapacityExceeded { capacity: usize },

    /// The user directory failed to answer.
    #[error("User directory error: {0}")]
    Directory(String),
}

impl SessionError {
    /// Whether the error was caused by the caller's input or ordering.
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            SessionError::DuplicateKey(_)
                | SessionError::CapacityExceeded { .. }
                | SessionError::Directory(_)
        )
    }

    /// Whether the same call may succeed if retried later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SessionError::SessionBusy(_)
                | SessionError::CapacityExceeded { .. }
                | SessionError::Directory(_)
        )
    }
}

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => SessionError::SessionNotFound(id),
            StoreError::DuplicateKey(id) => SessionError::DuplicateKey(id),
            StoreError::CapacityExceeded { capacity } => SessionError::CapacityExceeded { capacity },
        }
    }
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors that can occur while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read a config file.
    #[error("failed to read config file '{path}': {source}")]
    ReadFile {
        path: String,
        source: std::io::Error,
    },

    /// Failed to parse TOML.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The session id pattern is not a valid regular expression.
    #[error("invalid session id pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        source: regex::Error,
    },

    /// A duration setting must be positive.
    #[error("'{field}' must be greater than zero")]
    ZeroDuration { field: &'static str },
}
