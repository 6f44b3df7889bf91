//! # Ngome
//!
//! Ngome is the account security and session lifecycle core of the
//! civil-service HR system: password lifecycle (expiry, grace periods,
//! temporary passwords, strength scoring), account lockout (automatic with
//! escalating windows, manual with verified unlock), concurrent session
//! limiting with FIFO eviction, inactivity timeout, suspicious-login
//! heuristics, and a double-submit CSRF guard.
//!
//! [`Ngome`] is the coordinator: it wires the repository provider into the
//! individual services and owns the login orchestration: lockout check
//! before credential verification, failed-attempt recording, expiry and
//! grace evaluation, capped session creation, anomaly inspection, and
//! activity reset.
//!
//! ## Example
//!
//! ```rust,no_run
//! use ngome::Ngome;
//! use ngome_storage_sqlite::SqliteRepositoryProvider;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
//!     let repositories = Arc::new(SqliteRepositoryProvider::new(pool));
//!
//!     let ngome = Ngome::new(repositories);
//!     ngome.migrate().await.unwrap();
//! }
//! ```

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use ngome_core::{
    error::{AuthError, NotFoundError, StorageError},
    events::{AuditCategory, AuditEvent, AuditKind, AuditSeverity},
    password::{self, StrengthReport},
    repositories::{AccountRepository, RepositoryProvider},
    services::{
        ActivityService, ActivityStatus, AnomalyService, LockoutService, PasswordService,
        SessionService,
    },
};

/// Re-export core types commonly used alongside the coordinator.
pub use ngome_core::{
    Account, AccountId, DeviceClass, Error, LockoutKind, LockoutPolicy, LockoutStatus, Role,
    Session, SessionId, SessionSummary, SessionToken, csrf,
    events::SecurityReporter,
    password::{ExpirationStatus, PasswordPolicy},
    services::{ActivityWindow, AnomalyConfig, LoginInspection, SessionLimits},
};

/// Re-export the SQLite storage backend when the feature is enabled.
#[cfg(feature = "sqlite")]
pub use ngome_storage_sqlite::SqliteRepositoryProvider;

/// Configuration for every security component, with the deployed defaults:
/// 5-attempt lockout threshold, 3 concurrent sessions, 7-minute inactivity
/// timeout, 90-day password expiry with a 7-day grace window.
#[derive(Debug, Clone, Default)]
pub struct NgomeConfig {
    pub lockout: LockoutPolicy,
    pub sessions: SessionLimits,
    pub activity: ActivityWindow,
    pub anomaly: AnomalyConfig,
    pub passwords: PasswordPolicy,
}

/// Everything a successful login produces.
#[derive(Debug, Clone, Serialize)]
pub struct LoginOutcome {
    pub account_id: AccountId,
    pub username: String,
    pub role: Role,
    pub session: Session,
    /// Set when a temporary password or an expired password forces a change.
    pub must_change_password: bool,
    pub password_status: ExpirationStatus,
    pub inspection: LoginInspection,
}

/// The central coordinator wiring repositories into the security services.
pub struct Ngome<R: RepositoryProvider> {
    repositories: Arc<R>,
    accounts: Arc<R::AccountRepo>,
    lockout: LockoutService<R::AccountRepo, R::SessionRepo>,
    sessions: SessionService<R::SessionRepo>,
    activity: ActivityService<R::AccountRepo>,
    anomaly: AnomalyService<R::SessionRepo>,
    passwords: PasswordService<R::AccountRepo, R::SessionRepo>,
    reporter: SecurityReporter,
}

impl<R: RepositoryProvider> Ngome<R> {
    /// Create a coordinator with default configuration and no event sinks.
    pub fn new(repositories: Arc<R>) -> Self {
        Self::with_config(repositories, NgomeConfig::default(), SecurityReporter::disabled())
    }

    /// Create a coordinator with explicit configuration and event sinks.
    pub fn with_config(
        repositories: Arc<R>,
        config: NgomeConfig,
        reporter: SecurityReporter,
    ) -> Self {
        let accounts = repositories.account();
        let session_repo = repositories.session();

        Self {
            accounts: accounts.clone(),
            lockout: LockoutService::new(
                accounts.clone(),
                session_repo.clone(),
                config.lockout,
                reporter.clone(),
            ),
            sessions: SessionService::new(session_repo.clone(), config.sessions, reporter.clone()),
            activity: ActivityService::new(accounts.clone(), config.activity),
            anomaly: AnomalyService::new(session_repo.clone(), config.anomaly),
            passwords: PasswordService::new(
                accounts,
                session_repo,
                config.passwords,
                reporter.clone(),
            ),
            reporter,
            repositories,
        }
    }

    /// The best-effort audit/notification emitter, for callers (HTTP
    /// middleware) that log violations outside any service operation.
    pub fn reporter(&self) -> &SecurityReporter {
        &self.reporter
    }

    pub fn session_limits(&self) -> &SessionLimits {
        self.sessions.limits()
    }

    /// Run migrations for all repositories
    pub async fn migrate(&self) -> Result<(), Error> {
        self.repositories.migrate().await
    }

    /// Health check for all repositories, bounded so a wedged store cannot
    /// hang the caller.
    pub async fn health_check(&self) -> Result<(), Error> {
        const HEALTH_CHECK_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(15);

        match tokio::time::timeout(HEALTH_CHECK_TIMEOUT, self.repositories.health_check()).await {
            Ok(result) => result,
            Err(_) => Err(StorageError::Connection(
                "Connectivity check timed out".to_string(),
            )
            .into()),
        }
    }

    // ------------------------------------------------------------------
    // Login and logout
    // ------------------------------------------------------------------

    /// Authenticate a user and open a session.
    ///
    /// Order matters and is part of the contract: a locked account is
    /// rejected (with remaining lockout time for automatic locks) before
    /// the password is even checked; a failed password records the attempt
    /// and may arm the lockout; a success resets the counter, evaluates
    /// password expiry and grace, inspects the login against session
    /// history (failing open), creates the capped session, and resets the
    /// inactivity clock.
    pub async fn login(
        &self,
        username: &str,
        password_input: &str,
        ip: Option<String>,
        user_agent: Option<String>,
    ) -> Result<LoginOutcome, Error> {
        let now = Utc::now();

        let Some(account) = self.accounts.find_by_username(username).await? else {
            self.reporter
                .audit(
                    AuditEvent::new(
                        AuditKind::LoginFailed,
                        AuditCategory::Authentication,
                        AuditSeverity::Info,
                    )
                    .ip_address(ip.as_deref())
                    .user_agent(user_agent.as_deref())
                    .extra(serde_json::json!({ "username": username, "known_account": false })),
                )
                .await;
            return Err(AuthError::InvalidCredentials.into());
        };

        // Lockout gate, before any credential work.
        let lock_state = account.lockout_status(now);
        if lock_state.is_locked {
            self.reporter
                .audit(
                    AuditEvent::new(
                        AuditKind::LoginRejectedLocked,
                        AuditCategory::Authentication,
                        AuditSeverity::Warning,
                    )
                    .ip_address(ip.as_deref())
                    .blocked(
                        lock_state
                            .reason
                            .clone()
                            .unwrap_or_else(|| "Account is locked".to_string()),
                    )
                    .extra(serde_json::json!({ "username": account.username })),
                )
                .await;
            return Err(Self::locked_error(&lock_state));
        }

        if !password::verify_password(password_input, &account.password_hash) {
            let status = self
                .lockout
                .record_failed_login(&account, ip.as_deref())
                .await?;
            if status.is_locked {
                return Err(Self::locked_error(&status));
            }
            return Err(AuthError::InvalidCredentials.into());
        }

        // A temporary password that has sat unused past its window is dead.
        if account.is_temporary_password
            && account
                .temporary_password_expiry
                .is_some_and(|expiry| expiry <= now)
        {
            return Err(AuthError::TemporaryPasswordExpired.into());
        }

        // Expiry and grace evaluation.
        let mut password_status = self.passwords.policy().expiration_status(&account, now);
        if password_status.is_expired {
            if password_status.grace_period_expired {
                return Err(AuthError::PasswordExpired.into());
            }
            if account.grace_period_started_at.is_none() {
                self.accounts.set_grace_period_start(&account.id, now).await?;
                let mut entered = account.clone();
                entered.grace_period_started_at = Some(now);
                password_status = self.passwords.policy().expiration_status(&entered, now);
            }
        }

        self.lockout.reset_after_success(&account.id).await?;

        // Inspect against history before the new session joins it; the
        // detector reasons about prior sessions.
        let inspection = self
            .anomaly
            .inspect_login(&account.id, ip.as_deref(), user_agent.as_deref())
            .await;

        let session = self
            .sessions
            .create_session(&account.id, ip.clone(), user_agent.clone())
            .await?;

        if inspection.should_notify {
            let reasons: Vec<&str> = inspection.reasons.iter().map(|r| r.describe()).collect();
            self.reporter
                .audit(
                    AuditEvent::new(
                        AuditKind::SuspiciousLogin,
                        AuditCategory::Security,
                        AuditSeverity::Warning,
                    )
                    .ip_address(ip.as_deref())
                    .user_agent(user_agent.as_deref())
                    .extra(serde_json::json!({
                        "username": account.username,
                        "reasons": reasons,
                    })),
                )
                .await;
            self.reporter
                .notify(
                    &account.id,
                    &format!(
                        "A new sign-in to your account looked unusual ({}). If this was not you, change your password immediately.",
                        reasons.join(", ")
                    ),
                    None,
                )
                .await;
        }

        self.activity.record_activity(&account.id).await?;

        // Warning ladder delivery must not block a successful login.
        if let Err(e) = self.passwords.check_expiration_warning(&account).await {
            tracing::warn!(error = %e, "Could not deliver password expiration warning");
        }

        self.reporter
            .audit(
                AuditEvent::new(
                    AuditKind::LoginSucceeded,
                    AuditCategory::Authentication,
                    AuditSeverity::Info,
                )
                .actor(&account.id, &account.username, account.role.as_str())
                .ip_address(ip.as_deref())
                .user_agent(user_agent.as_deref()),
            )
            .await;

        Ok(LoginOutcome {
            account_id: account.id.clone(),
            username: account.username.clone(),
            role: account.role,
            must_change_password: account.must_change_password || password_status.is_expired,
            password_status,
            inspection,
            session,
        })
    }

    /// Terminate one session (or all of them) and clear the activity
    /// timestamp so it cannot be replayed as "still active".
    pub async fn logout(
        &self,
        user_id: &AccountId,
        token: &SessionToken,
        logout_all: bool,
    ) -> Result<u64, Error> {
        let count = if logout_all {
            self.sessions.terminate_all_sessions(user_id).await?
        } else {
            u64::from(self.sessions.terminate_session(token).await?)
        };
        self.activity.clear_activity(user_id).await?;
        Ok(count)
    }

    // ------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------

    /// Resolve a bearer token to a live session, or `None`.
    pub async fn validate_session(&self, token: &SessionToken) -> Result<Option<Session>, Error> {
        self.sessions.validate_session(token).await
    }

    /// Explicitly extend a session's lifetime.
    pub async fn touch_session(&self, token: &SessionToken) -> Result<(), Error> {
        self.sessions.touch_session(token).await
    }

    /// Active sessions for an account, tokens masked.
    pub async fn list_sessions(&self, user_id: &AccountId) -> Result<Vec<SessionSummary>, Error> {
        self.sessions.list_active_sessions(user_id).await
    }

    /// Ownership-checked targeted termination.
    pub async fn force_logout(
        &self,
        session_id: &SessionId,
        user_id: &AccountId,
    ) -> Result<bool, Error> {
        self.sessions.terminate_session_by_id(session_id, user_id).await
    }

    /// Sweep expired sessions; invoked by the external periodic job.
    pub async fn cleanup_expired_sessions(&self) -> Result<u64, Error> {
        self.sessions.cleanup_expired_sessions().await
    }

    // ------------------------------------------------------------------
    // Activity
    // ------------------------------------------------------------------

    pub async fn activity_status(&self, user_id: &AccountId) -> Result<ActivityStatus, Error> {
        self.activity.status(user_id).await
    }

    pub async fn record_activity(
        &self,
        user_id: &AccountId,
    ) -> Result<chrono::DateTime<Utc>, Error> {
        self.activity.record_activity(user_id).await
    }

    // ------------------------------------------------------------------
    // Lockout administration
    // ------------------------------------------------------------------

    pub async fn account_lockout_status(&self, user_id: &AccountId) -> Result<LockoutStatus, Error> {
        self.lockout.status(user_id).await
    }

    /// Manually lock an account on behalf of `admin_id`.
    pub async fn lock_account(
        &self,
        user_id: &AccountId,
        admin_id: &AccountId,
        reason: &str,
        notes: Option<&str>,
    ) -> Result<(), Error> {
        let admin = self.require_account(admin_id).await?;
        self.lockout.lock_manually(user_id, &admin, reason, notes).await
    }

    /// Unlock an account after the administrator verified the holder's
    /// identity.
    pub async fn unlock_account(
        &self,
        user_id: &AccountId,
        admin_id: &AccountId,
        verification_notes: &str,
        identity_verified: bool,
    ) -> Result<(), Error> {
        let admin = self.require_account(admin_id).await?;
        self.lockout
            .unlock(user_id, &admin, verification_notes, identity_verified)
            .await
    }

    // ------------------------------------------------------------------
    // Passwords
    // ------------------------------------------------------------------

    pub async fn password_status(&self, user_id: &AccountId) -> Result<ExpirationStatus, Error> {
        self.passwords.expiration_status(user_id).await
    }

    pub async fn change_password(
        &self,
        user_id: &AccountId,
        current_password: &str,
        new_password: &str,
        current_token: Option<&SessionToken>,
    ) -> Result<(), Error> {
        self.passwords
            .change_password(user_id, current_password, new_password, current_token)
            .await
    }

    /// Administrative reset: returns the one-time plaintext temporary
    /// password.
    pub async fn issue_temporary_password(
        &self,
        user_id: &AccountId,
        admin_id: &AccountId,
    ) -> Result<String, Error> {
        let admin = self.require_account(admin_id).await?;
        self.passwords.issue_temporary_password(user_id, &admin).await
    }

    /// Strength estimate for a candidate password (no state involved).
    pub fn score_password(&self, candidate: &str) -> StrengthReport {
        password::score_strength(candidate)
    }

    pub async fn get_account(&self, user_id: &AccountId) -> Result<Option<Account>, Error> {
        self.accounts.find_by_id(user_id).await
    }

    async fn require_account(&self, id: &AccountId) -> Result<Account, Error> {
        self.accounts
            .find_by_id(id)
            .await?
            .ok_or(NotFoundError::Account.into())
    }

    fn locked_error(status: &LockoutStatus) -> Error {
        AuthError::AccountLocked {
            reason: status
                .reason
                .clone()
                .unwrap_or_else(|| "Account is locked".to_string()),
            remaining_seconds: status.remaining_seconds,
        }
        .into()
    }
}
