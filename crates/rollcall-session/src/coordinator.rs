//! Session coordinator: validated, atomic operations over the session table.
//!
//! Every operation validates the session id, then performs its whole
//! read-modify-write against the [`TtlStore`] under a single lock
//! acquisition. Concurrent calls on one id therefore behave as if they ran
//! one after another, and a repeated `start`/`success`/`fail` sees the state
//! the first call left behind and fails with
//! [`SessionError::InvalidTransition`].

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use regex::Regex;
use rollcall_store::{StoreConfig, StoreStats, TtlStore};
use tracing::{debug, info};

use crate::config::SessionConfig;
use crate::directory::{User, UserDirectory};
use crate::error::{ConfigError, Result, SessionError};
use crate::session::{Session, SessionStatus};

/// Service façade over the session table.
///
/// Cheap to clone; clones share the same table and directory.
#[derive(Clone)]
pub struct SessionCoordinator {
    store: TtlStore<String, Session>,
    directory: Arc<dyn UserDirectory>,
    id_pattern: Regex,
    retention: TimeDelta,
    config: SessionConfig,
}

impl SessionCoordinator {
    /// Create a coordinator with a fresh session table.
    pub fn new(
        config: SessionConfig,
        directory: Arc<dyn UserDirectory>,
    ) -> std::result::Result<Self, ConfigError> {
        let mut store_config = StoreConfig::new();
        if let Some(max) = config.max_sessions {
            store_config = store_config.with_max_entries(max);
        }
        Self::with_store(config, TtlStore::new(store_config), directory)
    }

    /// Create a coordinator over an existing session table.
    pub fn with_store(
        config: SessionConfig,
        store: TtlStore<String, Session>,
        directory: Arc<dyn UserDirectory>,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let id_pattern = config.compile_id_pattern()?;
        let retention = TimeDelta::from_std(config.retention()).unwrap_or(TimeDelta::MAX);

        Ok(Self {
            store,
            directory,
            id_pattern,
            retention,
            config,
        })
    }

    /// Get the coordinator configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Join a session, creating it if needed.
    ///
    /// A finished (SUCCESS/FAIL) session is reset to WAITING before the user
    /// is added. Joining an ACTIVE session fails with
    /// [`SessionError::SessionBusy`] and leaves it untouched.
    pub async fn join(&self, user: User, session_id: &str) -> Result<Session> {
        self.validate_id(session_id)?;
        let username = user.username.clone();
        let founder = user.clone();

        let session = self
            .store
            .upsert_with(
                session_id.to_string(),
                || Session::new(session_id, founder),
                |session: &mut Session| -> Result<()> {
                    match session.status() {
                        SessionStatus::Active => {
                            return Err(SessionError::SessionBusy(session_id.to_string()));
                        }
                        previous @ (SessionStatus::Success | SessionStatus::Fail) => {
                            session.reset()?;
                            debug!(session_id = %session_id, previous = %previous, "Recycled finished session");
                        }
                        SessionStatus::Waiting => {}
                    }
                    session.add_participant(user);
                    Ok(())
                },
            )
            .await?;

        info!(
            session_id = %session_id,
            username = %username,
            participants = session.participant_count(),
            "User joined session"
        );
        Ok(session)
    }

    /// Leave a session.
    ///
    /// A non-participant leaving is a no-op. A participant leaving an ACTIVE
    /// session fails it with that participant blamed; otherwise they are
    /// removed from the roster.
    pub async fn leave(&self, user: &User, session_id: &str) -> Result<Session> {
        self.validate_id(session_id)?;

        let session = self
            .store
            .try_update(&session_id.to_string(), |session: &mut Session| -> Result<()> {
                if !session.has_participant(&user.username) {
                    return Ok(());
                }
                if session.status() == SessionStatus::Active {
                    session.fail(user.clone())
                } else {
                    session.remove_participant(&user.username);
                    Ok(())
                }
            })
            .await?;

        info!(
            session_id = %session_id,
            username = %user.username,
            status = %session.status(),
            "User left session"
        );
        Ok(session)
    }

    /// Look up a session.
    pub async fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        self.validate_id(session_id)?;
        Ok(self.store.get(&session_id.to_string()).await)
    }

    /// Look up a session, failing with [`SessionError::SessionNotFound`] if absent.
    pub async fn get_session_required(&self, session_id: &str) -> Result<Session> {
        self.validate_id(session_id)?;
        Ok(self.store.select(&session_id.to_string()).await?)
    }

    /// WAITING → ACTIVE with `target`.
    pub async fn start(&self, session_id: &str, target: i64) -> Result<Session> {
        self.validate_id(session_id)?;
        let session = self
            .store
            .try_update(&session_id.to_string(), |session| session.start(target))
            .await?;

        info!(session_id = %session_id, target, "Session started");
        Ok(session)
    }

    /// ACTIVE → SUCCESS.
    pub async fn success(&self, session_id: &str) -> Result<Session> {
        self.validate_id(session_id)?;
        let session = self
            .store
            .try_update(&session_id.to_string(), Session::succeed)
            .await?;

        info!(session_id = %session_id, "Session succeeded");
        Ok(session)
    }

    /// ACTIVE → FAIL, blaming `username` as resolved by the user directory.
    pub async fn fail(&self, session_id: &str, username: &str) -> Result<Session> {
        self.validate_id(session_id)?;
        let user = self
            .directory
            .resolve(username)?
            .ok_or_else(|| SessionError::UserNotFound(username.to_string()))?;

        let session = self
            .store
            .try_update(&session_id.to_string(), |session| session.fail(user))
            .await?;

        info!(session_id = %session_id, blamed = %username, "Session failed");
        Ok(session)
    }

    /// SUCCESS/FAIL → WAITING. Tolerated as a no-op when already WAITING.
    pub async fn reset(&self, session_id: &str) -> Result<Session> {
        self.validate_id(session_id)?;
        let session = self
            .store
            .try_update(&session_id.to_string(), Session::reset)
            .await?;

        debug!(session_id = %session_id, "Session reset");
        Ok(session)
    }

    /// Snapshot of all stored session ids.
    pub async fn session_ids(&self) -> Vec<String> {
        self.store.keys().await
    }

    /// Number of stored sessions.
    pub async fn session_count(&self) -> usize {
        self.store.len().await
    }

    /// Size, bound and oldest creation time of the session table.
    pub async fn stats(&self) -> StoreStats {
        self.store.stats().await
    }

    /// Drop every non-active session older than the retention period.
    ///
    /// Age is measured from the moment the id first entered the table, so a
    /// reset or recycle never extends a session's life. ACTIVE sessions are
    /// kept regardless of age. Returns the number of sessions removed.
    pub async fn collect_expired_sessions(&self) -> usize {
        self.collect_expired_sessions_at(Utc::now()).await
    }

    /// [`collect_expired_sessions`](Self::collect_expired_sessions) evaluated at `now`.
    pub async fn collect_expired_sessions_at(&self, now: DateTime<Utc>) -> usize {
        info!("Starting session GC");
        let retention = self.retention;

        let dropped = self
            .store
            .sweep(|_, session, created_at| {
                session.status() != SessionStatus::Active
                    && now.signed_duration_since(created_at) > retention
            })
            .await;

        for session_id in &dropped {
            debug!(session_id = %session_id, "Dropped expired session");
        }
        info!(count = dropped.len(), "Session GC completed");

        dropped.len()
    }

    fn validate_id(&self, session_id: &str) -> Result<()> {
        if self.id_pattern.is_match(session_id) {
            Ok(())
        } else {
            Err(SessionError::InvalidIdentifier(session_id.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::InMemoryDirectory;
    use chrono::Duration;

    fn coordinator() -> SessionCoordinator {
        let directory = InMemoryDirectory::with_users([
            User::new("alice"),
            User::new("bob"),
            User::new("carol"),
        ]);
        SessionCoordinator::new(SessionConfig::default(), Arc::new(directory)).unwrap()
    }

    async fn active_session(coord: &SessionCoordinator, id: &str) -> Session {
        coord.join(User::new("alice"), id).await.unwrap();
        coord.start(id, 100).await.unwrap()
    }

    #[tokio::test]
    async fn test_invalid_identifier_rejected_everywhere() {
        let coord = coordinator();
        let bad = "not valid!";

        assert_eq!(
            coord.join(User::new("alice"), bad).await.unwrap_err(),
            SessionError::InvalidIdentifier(bad.to_string())
        );
        assert!(matches!(
            coord.leave(&User::new("alice"), bad).await,
            Err(SessionError::InvalidIdentifier(_))
        ));
        assert!(matches!(coord.get_session(bad).await, Err(SessionError::InvalidIdentifier(_))));
        assert!(matches!(coord.start(bad, 1).await, Err(SessionError::InvalidIdentifier(_))));
        assert!(matches!(coord.success(bad).await, Err(SessionError::InvalidIdentifier(_))));
        assert!(matches!(coord.fail(bad, "alice").await, Err(SessionError::InvalidIdentifier(_))));
        assert!(matches!(coord.reset(bad).await, Err(SessionError::InvalidIdentifier(_))));
        assert_eq!(coord.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_join_creates_waiting_session() {
        let coord = coordinator();
        let session = coord.join(User::new("alice"), "room-1").await.unwrap();

        assert_eq!(session.status(), SessionStatus::Waiting);
        assert_eq!(session.participant_count(), 1);
        assert!(session.has_participant("alice"));
    }

    #[tokio::test]
    async fn test_join_active_is_busy_and_unmodified() {
        let coord = coordinator();
        let before = active_session(&coord, "room-1").await;

        let err = coord.join(User::new("bob"), "room-1").await.unwrap_err();
        assert_eq!(err, SessionError::SessionBusy("room-1".to_string()));
        assert!(err.is_retryable());

        let after = coord.get_session_required("room-1").await.unwrap();
        assert_eq!(after, before);
    }

    #[tokio::test]
    async fn test_join_finished_session_recycles_it() {
        let coord = coordinator();
        active_session(&coord, "room-1").await;
        coord.success("room-1").await.unwrap();

        let session = coord.join(User::new("bob"), "room-1").await.unwrap();
        assert_eq!(session.status(), SessionStatus::Waiting);
        assert_eq!(session.target(), None);
        assert_eq!(session.participant_count(), 2);
    }

    #[tokio::test]
    async fn test_leave_missing_session() {
        let coord = coordinator();
        let err = coord.leave(&User::new("alice"), "nowhere").await.unwrap_err();
        assert_eq!(err, SessionError::SessionNotFound("nowhere".to_string()));
    }

    #[tokio::test]
    async fn test_leave_by_non_participant_is_noop() {
        let coord = coordinator();
        let before = active_session(&coord, "room-1").await;

        let after = coord.leave(&User::new("bob"), "room-1").await.unwrap();
        assert_eq!(after, before);
    }

    #[tokio::test]
    async fn test_leave_by_non_participant_is_noop_in_every_state() {
        let coord = coordinator();
        let outsider = User::new("zed");

        // WAITING
        let waiting = coord.join(User::new("alice"), "room-w").await.unwrap();
        assert_eq!(coord.leave(&outsider, "room-w").await.unwrap(), waiting);

        // SUCCESS
        active_session(&coord, "room-s").await;
        let succeeded = coord.success("room-s").await.unwrap();
        assert_eq!(coord.leave(&outsider, "room-s").await.unwrap(), succeeded);

        // FAIL
        active_session(&coord, "room-f").await;
        let failed = coord.fail("room-f", "bob").await.unwrap();
        assert_eq!(coord.leave(&outsider, "room-f").await.unwrap(), failed);

        for id in ["room-w", "room-s", "room-f"] {
            let stored = coord.get_session_required(id).await.unwrap();
            assert!(!stored.has_participant("zed"));
        }
        assert_eq!(
            coord.get_session_required("room-f").await.unwrap(),
            failed
        );
    }

    #[tokio::test]
    async fn test_leave_waiting_removes_participant() {
        let coord = coordinator();
        coord.join(User::new("alice"), "room-1").await.unwrap();
        coord.join(User::new("bob"), "room-1").await.unwrap();

        let session = coord.leave(&User::new("alice"), "room-1").await.unwrap();
        assert_eq!(session.status(), SessionStatus::Waiting);
        assert!(!session.has_participant("alice"));
        assert!(session.has_participant("bob"));
    }

    #[tokio::test]
    async fn test_last_participant_leaving_keeps_session() {
        let coord = coordinator();
        coord.join(User::new("alice"), "room-1").await.unwrap();

        let session = coord.leave(&User::new("alice"), "room-1").await.unwrap();
        assert_eq!(session.participant_count(), 0);
        assert!(coord.get_session("room-1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_leave_active_fails_session() {
        let coord = coordinator();
        active_session(&coord, "room-1").await;

        let session = coord.leave(&User::new("alice"), "room-1").await.unwrap();
        assert_eq!(session.status(), SessionStatus::Fail);
        assert_eq!(session.blamed_user().map(|u| u.username.as_str()), Some("alice"));
        assert!(session.has_participant("alice"));
    }

    #[tokio::test]
    async fn test_get_session_variants() {
        let coord = coordinator();
        assert_eq!(coord.get_session("room-1").await.unwrap(), None);
        assert_eq!(
            coord.get_session_required("room-1").await.unwrap_err(),
            SessionError::SessionNotFound("room-1".to_string())
        );
    }

    #[tokio::test]
    async fn test_start_requires_existing_session() {
        let coord = coordinator();
        assert_eq!(
            coord.start("room-1", 5).await.unwrap_err(),
            SessionError::SessionNotFound("room-1".to_string())
        );
    }

    #[tokio::test]
    async fn test_start_is_one_shot() {
        let coord = coordinator();
        let session = active_session(&coord, "room-1").await;
        assert_eq!(session.status(), SessionStatus::Active);
        assert_eq!(session.target(), Some(100));

        let err = coord.start("room-1", 200).await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidTransition { action: "start", .. }));
        assert_eq!(coord.get_session_required("room-1").await.unwrap().target(), Some(100));
    }

    #[tokio::test]
    async fn test_success_is_one_shot() {
        let coord = coordinator();
        coord.join(User::new("alice"), "room-1").await.unwrap();
        assert!(coord.success("room-1").await.is_err());

        coord.start("room-1", 1).await.unwrap();
        let session = coord.success("room-1").await.unwrap();
        assert_eq!(session.status(), SessionStatus::Success);

        let err = coord.success("room-1").await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::InvalidTransition {
                status: SessionStatus::Success,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_fail_unknown_user() {
        let coord = coordinator();
        active_session(&coord, "room-1").await;

        let err = coord.fail("room-1", "mallory").await.unwrap_err();
        assert_eq!(err, SessionError::UserNotFound("mallory".to_string()));
        assert_eq!(
            coord.get_session_required("room-1").await.unwrap().status(),
            SessionStatus::Active
        );
    }

    #[tokio::test]
    async fn test_fail_is_one_shot() {
        let coord = coordinator();
        active_session(&coord, "room-1").await;

        let session = coord.fail("room-1", "bob").await.unwrap();
        assert_eq!(session.status(), SessionStatus::Fail);
        assert_eq!(session.blamed_user().map(|u| u.username.as_str()), Some("bob"));

        let err = coord.fail("room-1", "alice").await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidTransition { action: "fail", .. }));
        let stored = coord.get_session_required("room-1").await.unwrap();
        assert_eq!(stored.blamed_user().map(|u| u.username.as_str()), Some("bob"));
    }

    #[tokio::test]
    async fn test_reset_transitions() {
        let coord = coordinator();
        coord.join(User::new("alice"), "room-1").await.unwrap();
        coord.join(User::new("bob"), "room-1").await.unwrap();

        // WAITING: no-op
        let waiting = coord.reset("room-1").await.unwrap();
        assert_eq!(waiting.participant_count(), 2);

        // ACTIVE: rejected
        coord.start("room-1", 7).await.unwrap();
        assert!(matches!(
            coord.reset("room-1").await,
            Err(SessionError::InvalidTransition { action: "reset", .. })
        ));

        // FAIL: back to WAITING with roster intact
        coord.fail("room-1", "alice").await.unwrap();
        let session = coord.reset("room-1").await.unwrap();
        assert_eq!(session.status(), SessionStatus::Waiting);
        assert_eq!(session.target(), None);
        assert!(session.blamed_user().is_none());
        assert_eq!(session.participant_count(), 2);
    }

    #[tokio::test]
    async fn test_reaper_skips_active_sessions() {
        let coord = coordinator();
        active_session(&coord, "running").await;
        coord.join(User::new("bob"), "idle").await.unwrap();

        let far_future = Utc::now() + Duration::days(30);
        let dropped = coord.collect_expired_sessions_at(far_future).await;

        assert_eq!(dropped, 1);
        assert!(coord.get_session("running").await.unwrap().is_some());
        assert!(coord.get_session("idle").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reaper_keeps_young_sessions() {
        let coord = coordinator();
        coord.join(User::new("alice"), "fresh").await.unwrap();

        assert_eq!(coord.collect_expired_sessions().await, 0);
        assert_eq!(coord.session_ids().await, vec!["fresh".to_string()]);
    }

    #[tokio::test]
    async fn test_reaper_measures_from_creation_not_reset() {
        let coord = coordinator();
        active_session(&coord, "room-1").await;
        coord.success("room-1").await.unwrap();
        let created = coord.get_session_required("room-1").await.unwrap().created();

        let recycled = coord.join(User::new("bob"), "room-1").await.unwrap();
        assert_eq!(recycled.created(), created);

        let just_past_retention = created + Duration::days(1) + Duration::minutes(1);
        assert_eq!(coord.collect_expired_sessions_at(just_past_retention).await, 1);
    }

    #[tokio::test]
    async fn test_reaper_drops_expired_failed_session() {
        let coord = coordinator();
        active_session(&coord, "room-1").await;
        coord.fail("room-1", "bob").await.unwrap();

        let now = Utc::now();
        assert_eq!(coord.collect_expired_sessions_at(now).await, 0);
        assert_eq!(coord.collect_expired_sessions_at(now + Duration::days(2)).await, 1);
        assert!(coord.get_session("room-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reaper_uses_table_insertion_time() {
        let coord = coordinator();
        coord.join(User::new("alice"), "room-1").await.unwrap();
        let inserted = coord.stats().await.oldest.unwrap();

        // One second short of retention from the table timestamp: kept
        let almost = inserted + Duration::days(1) - Duration::seconds(1);
        assert_eq!(coord.collect_expired_sessions_at(almost).await, 0);

        let past = inserted + Duration::days(1) + Duration::seconds(1);
        assert_eq!(coord.collect_expired_sessions_at(past).await, 1);
    }

    #[tokio::test]
    async fn test_stats_reports_bound_and_size() {
        let config = SessionConfig::default().with_max_sessions(4);
        let coord = SessionCoordinator::new(config, Arc::new(InMemoryDirectory::new())).unwrap();
        assert_eq!(coord.stats().await.oldest, None);

        coord.join(User::new("alice"), "room-1").await.unwrap();
        coord.join(User::new("alice"), "room-2").await.unwrap();

        let stats = coord.stats().await;
        assert_eq!(stats.size, 2);
        assert_eq!(stats.capacity, Some(4));
        assert!(stats.oldest.is_some());
    }

    #[tokio::test]
    async fn test_capacity_bound() {
        let config = SessionConfig::default().with_max_sessions(1);
        let coord = SessionCoordinator::new(config, Arc::new(InMemoryDirectory::new())).unwrap();
        coord.join(User::new("alice"), "room-1").await.unwrap();

        let err = coord.join(User::new("bob"), "room-2").await.unwrap_err();
        assert_eq!(err, SessionError::CapacityExceeded { capacity: 1 });
        assert!(!err.is_client_error());

        // Existing sessions can still be joined
        coord.join(User::new("bob"), "room-1").await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let config = SessionConfig::default().with_id_pattern("(");
        let result = SessionCoordinator::new(config, Arc::new(InMemoryDirectory::new()));
        assert!(matches!(result, Err(ConfigError::InvalidPattern { .. })));
    }

    #[tokio::test]
    async fn test_custom_id_pattern() {
        let config = SessionConfig::default().with_id_pattern("^[a-z]{3}$");
        let coord = SessionCoordinator::new(config, Arc::new(InMemoryDirectory::new())).unwrap();

        assert!(coord.join(User::new("alice"), "abc").await.is_ok());
        assert!(matches!(
            coord.join(User::new("alice"), "abcd").await,
            Err(SessionError::InvalidIdentifier(_))
        ));
    }
}
