//! Repository trait for session data access.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    Error,
    account::AccountId,
    session::{Session, SessionId, SessionToken},
};

/// Result of a capped session insert.
#[derive(Debug, Clone)]
pub struct SessionCreation {
    pub session: Session,
    /// Sessions evicted to make room, oldest `created_at` first.
    pub evicted: Vec<SessionId>,
}

/// Repository for session data access.
#[async_trait]
pub trait SessionRepository: Send + Sync + 'static {
    /// Insert a session, enforcing the per-account concurrency cap.
    ///
    /// When the account already holds `max_sessions` or more unexpired
    /// sessions, the oldest-created sessions are evicted until the new
    /// session fits. Check, eviction and insert must form one serialized
    /// critical section per account: two simultaneous logins must never
    /// both observe a free slot and jointly exceed the cap.
    async fn create(&self, session: Session, max_sessions: u32) -> Result<SessionCreation, Error>;

    /// Find a session by its bearer token.
    async fn find_by_token(&self, token: &SessionToken) -> Result<Option<Session>, Error>;

    /// Unexpired sessions for an account, newest first.
    async fn find_active_by_user(
        &self,
        user_id: &AccountId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Session>, Error>;

    /// Recent session history for an account (expired included), newest
    /// first, bounded by `since` and `limit`. Feeds the login anomaly
    /// detector.
    async fn find_recent_by_user(
        &self,
        user_id: &AccountId,
        since: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Session>, Error>;

    /// Update the activity timestamp and extend the expiry.
    async fn touch(
        &self,
        token: &SessionToken,
        last_activity: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<(), Error>;

    /// Delete by token. Returns whether a row was actually removed.
    async fn delete_by_token(&self, token: &SessionToken) -> Result<bool, Error>;

    /// Delete by ID, but only when the session belongs to `owner`.
    /// Returns `false` (leaving the session intact) otherwise.
    async fn delete_by_id(&self, id: &SessionId, owner: &AccountId) -> Result<bool, Error>;

    /// Delete all sessions for an account. Returns the number removed.
    async fn delete_by_user(&self, user_id: &AccountId) -> Result<u64, Error>;

    /// Delete all sessions for an account except the one holding `keep`.
    /// Used when a password change must end every other session.
    async fn delete_by_user_except(
        &self,
        user_id: &AccountId,
        keep: &SessionToken,
    ) -> Result<u64, Error>;

    /// Remove every session with `expires_at <= now`. Safe to run
    /// concurrently and repeatedly; returns the number removed.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, Error>;
}
