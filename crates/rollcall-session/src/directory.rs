//! User records and the directory used to resolve them.
//!
//! The coordinator only consults the directory when attributing a failure to
//! a named user. Backends (a database, an identity service) implement
//! [`UserDirectory`]; [`InMemoryDirectory`] serves tests and standalone runs.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A participant identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    /// Unique username.
    pub username: String,

    /// Optional human-readable name supplied by the directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl User {
    /// Create a user with just a username.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            display_name: None,
        }
    }

    /// Set the display name.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

/// Resolves usernames to user records.
pub trait UserDirectory: Send + Sync {
    /// Look up a user.
    ///
    /// Return `Ok(None)` if the user doesn't exist. Return
    /// [`SessionError::Directory`](crate::SessionError::Directory) when the
    /// backend itself fails.
    fn resolve(&self, username: &str) -> Result<Option<User>>;
}

/// A directory held entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    users: RwLock<HashMap<String, User>>,
}

impl InMemoryDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a directory pre-populated with `users`.
    pub fn with_users(users: impl IntoIterator<Item = User>) -> Self {
        let directory = Self::new();
        for user in users {
            directory.register(user);
        }
        directory
    }

    /// Add or replace a user.
    pub fn register(&self, user: User) {
        self.users.write().insert(user.username.clone(), user);
    }

    /// Number of registered users.
    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    /// Check if no users are registered.
    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }
}

impl UserDirectory for InMemoryDirectory {
    fn resolve(&self, username: &str) -> Result<Option<User>> {
        Ok(self.users.read().get(username).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_registered_user() {
        let directory =
            InMemoryDirectory::with_users([User::new("alice").with_display_name("Alice")]);

        let user = directory.resolve("alice").unwrap().unwrap();
        assert_eq!(user.display_name.as_deref(), Some("Alice"));
    }

    #[test]
    fn test_resolve_unknown_user() {
        let directory = InMemoryDirectory::new();
        assert_eq!(directory.resolve("nobody").unwrap(), None);
    }

    #[test]
    fn test_register_replaces_existing_user() {
        let directory = InMemoryDirectory::new();
        assert!(directory.is_empty());

        directory.register(User::new("bob"));
        directory.register(User::new("bob").with_display_name("Robert"));
        assert_eq!(directory.len(), 1);

        let user = directory.resolve("bob").unwrap().unwrap();
        assert_eq!(user.display_name.as_deref(), Some("Robert"));
    }
}
