//! Session lifecycle service.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::{
    Error,
    account::AccountId,
    events::{AuditCategory, AuditEvent, AuditKind, AuditSeverity, SecurityReporter},
    repositories::{SessionCreation, SessionRepository},
    session::{DeviceClass, Session, SessionId, SessionSummary, SessionToken},
};

/// Session lifetime and concurrency configuration.
#[derive(Debug, Clone)]
pub struct SessionLimits {
    /// Maximum concurrent unexpired sessions per account.
    pub max_concurrent: u32,
    /// Lifetime of a session from creation or last explicit extension.
    pub expires_in: Duration,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            expires_in: Duration::hours(24),
        }
    }
}

/// Service for session management operations.
pub struct SessionService<R: SessionRepository> {
    repository: Arc<R>,
    limits: SessionLimits,
    reporter: SecurityReporter,
}

impl<R: SessionRepository> SessionService<R> {
    pub fn new(repository: Arc<R>, limits: SessionLimits, reporter: SecurityReporter) -> Self {
        Self {
            repository,
            limits,
            reporter,
        }
    }

    pub fn limits(&self) -> &SessionLimits {
        &self.limits
    }

    /// Create a new session for an account.
    ///
    /// When the account is at the concurrency cap, the oldest-created
    /// session is evicted first (FIFO by `created_at`, not least-recently
    /// active). The check-evict-insert sequence is atomic in the
    /// repository, so concurrent logins cannot jointly exceed the cap.
    pub async fn create_session(
        &self,
        user_id: &AccountId,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Result<Session, Error> {
        let now = Utc::now();
        let device_class = user_agent
            .as_deref()
            .map(DeviceClass::from_user_agent)
            .unwrap_or(DeviceClass::Unknown);

        let session = Session {
            id: SessionId::new_random(),
            user_id: user_id.clone(),
            token: SessionToken::new_random(),
            ip_address,
            user_agent,
            device_class,
            created_at: now,
            last_activity: now,
            expires_at: now + self.limits.expires_in,
        };

        let SessionCreation { session, evicted } = self
            .repository
            .create(session, self.limits.max_concurrent)
            .await?;

        for evicted_id in &evicted {
            self.reporter
                .audit(
                    AuditEvent::new(
                        AuditKind::SessionEvicted,
                        AuditCategory::Security,
                        AuditSeverity::Info,
                    )
                    .extra(serde_json::json!({
                        "user_id": user_id,
                        "session_id": evicted_id,
                        "cap": self.limits.max_concurrent,
                    })),
                )
                .await;
        }

        self.reporter
            .audit(
                AuditEvent::new(
                    AuditKind::SessionCreated,
                    AuditCategory::Authentication,
                    AuditSeverity::Info,
                )
                .ip_address(session.ip_address.as_deref())
                .user_agent(session.user_agent.as_deref())
                .extra(serde_json::json!({
                    "user_id": user_id,
                    "session_id": session.id,
                    "device_class": session.device_class.as_str(),
                })),
            )
            .await;

        Ok(session)
    }

    /// Look up a session by token. Returns `None` when the token is unknown
    /// or the session has expired. This is a pure read: validation never
    /// silently extends the expiry, extension is [`touch_session`].
    ///
    /// [`touch_session`]: SessionService::touch_session
    pub async fn validate_session(&self, token: &SessionToken) -> Result<Option<Session>, Error> {
        let session = self.repository.find_by_token(token).await?;

        if let Some(ref s) = session
            && s.is_expired(Utc::now())
        {
            return Ok(None);
        }

        Ok(session)
    }

    /// Explicitly refresh a session's activity timestamp and extend its
    /// expiry by the configured lifetime.
    pub async fn touch_session(&self, token: &SessionToken) -> Result<(), Error> {
        let now = Utc::now();
        self.repository
            .touch(token, now, now + self.limits.expires_in)
            .await
    }

    /// Unexpired sessions for an account, newest first, tokens masked.
    /// The full token never leaves the manager after creation.
    pub async fn list_active_sessions(
        &self,
        user_id: &AccountId,
    ) -> Result<Vec<SessionSummary>, Error> {
        let sessions = self
            .repository
            .find_active_by_user(user_id, Utc::now())
            .await?;
        Ok(sessions.iter().map(Session::summarize).collect())
    }

    /// Terminate a session by token. Idempotent; reports whether a session
    /// was actually removed.
    pub async fn terminate_session(&self, token: &SessionToken) -> Result<bool, Error> {
        let removed = self.repository.delete_by_token(token).await?;
        if removed {
            self.reporter
                .audit(AuditEvent::new(
                    AuditKind::SessionTerminated,
                    AuditCategory::Authentication,
                    AuditSeverity::Info,
                ))
                .await;
        }
        Ok(removed)
    }

    /// Terminate a session by its public ID, requiring ownership. A caller
    /// guessing another account's session ID gets `false` and the session
    /// stays intact.
    pub async fn terminate_session_by_id(
        &self,
        session_id: &SessionId,
        owner: &AccountId,
    ) -> Result<bool, Error> {
        let removed = self.repository.delete_by_id(session_id, owner).await?;
        if removed {
            self.reporter
                .audit(
                    AuditEvent::new(
                        AuditKind::ForcedLogout,
                        AuditCategory::Security,
                        AuditSeverity::Info,
                    )
                    .extra(serde_json::json!({
                        "user_id": owner,
                        "session_id": session_id,
                    })),
                )
                .await;
        }
        Ok(removed)
    }

    /// Terminate every session for an account ("log out everywhere").
    pub async fn terminate_all_sessions(&self, user_id: &AccountId) -> Result<u64, Error> {
        let count = self.repository.delete_by_user(user_id).await?;
        if count > 0 {
            self.reporter
                .audit(
                    AuditEvent::new(
                        AuditKind::SessionTerminated,
                        AuditCategory::Authentication,
                        AuditSeverity::Info,
                    )
                    .extra(serde_json::json!({
                        "user_id": user_id,
                        "sessions_terminated": count,
                    })),
                )
                .await;
        }
        Ok(count)
    }

    /// Terminate every session for an account except the one holding
    /// `keep`. Used when a password change ends all other sessions.
    pub async fn terminate_other_sessions(
        &self,
        user_id: &AccountId,
        keep: &SessionToken,
    ) -> Result<u64, Error> {
        self.repository.delete_by_user_except(user_id, keep).await
    }

    /// Sweep expired sessions. Idempotent and safe to run concurrently.
    pub async fn cleanup_expired_sessions(&self) -> Result<u64, Error> {
        self.cleanup_expired_at(Utc::now()).await
    }

    pub(crate) async fn cleanup_expired_at(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        let removed = self.repository.delete_expired(now).await?;
        if removed > 0 {
            tracing::info!(count = removed, "Cleaned up expired sessions");
        }
        Ok(removed)
    }
}
