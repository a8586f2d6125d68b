//! The readiness-handshake state machine.
//!
//! ```text
//! WAITING ──start──▶ ACTIVE ──succeed──▶ SUCCESS
//!    ▲                  │                   │
//!    │                  └──fail──▶ FAIL     │
//!    └──────────reset───────────────┴───────┘
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::directory::User;
use crate::error::{Result, SessionError};

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SessionStatus {
    /// Gathering participants.
    Waiting,
    /// Running toward its target.
    Active,
    /// Finished successfully.
    Success,
    /// Finished with a blamed participant.
    Fail,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Waiting => write!(f, "WAITING"),
            SessionStatus::Active => write!(f, "ACTIVE"),
            SessionStatus::Success => write!(f, "SUCCESS"),
            SessionStatus::Fail => write!(f, "FAIL"),
        }
    }
}

/// One instance of the readiness handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    id: String,
    status: SessionStatus,
    participants: BTreeMap<String, User>,
    target: Option<i64>,
    created: DateTime<Utc>,
    blamed_user: Option<User>,
}

impl Session {
    /// Create a WAITING session with `user` as its only participant.
    pub fn new(id: impl Into<String>, user: User) -> Self {
        let mut participants = BTreeMap::new();
        participants.insert(user.username.clone(), user);
        Self {
            id: id.into(),
            status: SessionStatus::Waiting,
            participants,
            target: None,
            created: Utc::now(),
            blamed_user: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn participants(&self) -> &BTreeMap<String, User> {
        &self.participants
    }

    /// The target set by `start`. `None` unless ACTIVE or finished.
    pub fn target(&self) -> Option<i64> {
        self.target
    }

    /// Creation time. Reset does not change it.
    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    pub fn blamed_user(&self) -> Option<&User> {
        self.blamed_user.as_ref()
    }

    pub fn has_participant(&self, username: &str) -> bool {
        self.participants.contains_key(username)
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    /// Add a participant. Re-adding an existing username is a no-op.
    pub fn add_participant(&mut self, user: User) {
        self.participants
            .entry(user.username.clone())
            .or_insert(user);
    }

    /// Remove a participant if present.
    pub fn remove_participant(&mut self, username: &str) {
        self.participants.remove(username);
    }

    /// WAITING → ACTIVE with the given target.
    pub fn start(&mut self, target: i64) -> Result<()> {
        self.require(SessionStatus::Waiting, "start")?;
        self.target = Some(target);
        self.status = SessionStatus::Active;
        Ok(())
    }

    /// ACTIVE → SUCCESS.
    pub fn succeed(&mut self) -> Result<()> {
        self.require(SessionStatus::Active, "succeed")?;
        self.status = SessionStatus::Success;
        Ok(())
    }

    /// ACTIVE → FAIL, blaming `user`.
    pub fn fail(&mut self, user: User) -> Result<()> {
        self.require(SessionStatus::Active, "fail")?;
        self.blamed_user = Some(user);
        self.status = SessionStatus::Fail;
        Ok(())
    }

    /// SUCCESS/FAIL → WAITING, clearing target and blame but keeping the
    /// roster. A no-op when already WAITING.
    pub fn reset(&mut self) -> Result<()> {
        match self.status {
            SessionStatus::Waiting => Ok(()),
            SessionStatus::Success | SessionStatus::Fail => {
                self.status = SessionStatus::Waiting;
                self.target = None;
                self.blamed_user = None;
                Ok(())
            }
            SessionStatus::Active => Err(self.invalid("reset")),
        }
    }

    fn require(&self, expected: SessionStatus, action: &'static str) -> Result<()> {
        if self.status == expected {
            Ok(())
        } else {
            Err(self.invalid(action))
        }
    }

    fn invalid(&self, action: &'static str) -> SessionError {
        SessionError::InvalidTransition {
            session_id: self.id.clone(),
            status: self.status,
            action,
        }
    }
}
