//! Account lockout service.
//!
//! Drives the per-account lockout state machine: `Unlocked`, `AutoLocked`
//! (armed when the failed-attempt counter crosses the policy threshold,
//! self-expiring), and `ManuallyLocked` (administrator action, cleared only
//! by a verified unlock). Every transition emits an audit event and a user
//! notification through the best-effort reporter; the emission is part of
//! the operation, not a caller obligation.

use std::sync::Arc;

use chrono::Utc;

use crate::{
    Error,
    account::{Account, AccountId, LockoutPolicy, LockoutStatus, Role},
    error::{AuthorizationError, ConflictError, NotFoundError},
    events::{AuditCategory, AuditEvent, AuditKind, AuditSeverity, SecurityReporter},
    repositories::{AccountRepository, ManualLock, SessionRepository},
    validation::validate_justification,
};

/// Service coordinating lockout state transitions.
///
/// Thread-safe; the repositories serialize the concurrent-update cases.
pub struct LockoutService<A: AccountRepository, S: SessionRepository> {
    accounts: Arc<A>,
    sessions: Arc<S>,
    policy: LockoutPolicy,
    reporter: SecurityReporter,
}

impl<A: AccountRepository, S: SessionRepository> LockoutService<A, S> {
    pub fn new(
        accounts: Arc<A>,
        sessions: Arc<S>,
        policy: LockoutPolicy,
        reporter: SecurityReporter,
    ) -> Self {
        Self {
            accounts,
            sessions,
            policy,
            reporter,
        }
    }

    pub fn policy(&self) -> &LockoutPolicy {
        &self.policy
    }

    /// Current lockout state of an account.
    pub async fn status(&self, id: &AccountId) -> Result<LockoutStatus, Error> {
        let account = self
            .accounts
            .find_by_id(id)
            .await?
            .ok_or(NotFoundError::Account)?;
        Ok(account.lockout_status(Utc::now()))
    }

    /// Record a failed login attempt against an account.
    ///
    /// The attempt counter and the lockout decision are applied atomically
    /// by the repository. Returns the post-update status; when the account
    /// transitioned into `AutoLocked` on this attempt, the security event
    /// and user notification have already been emitted.
    pub async fn record_failed_login(
        &self,
        account: &Account,
        ip: Option<&str>,
    ) -> Result<LockoutStatus, Error> {
        let was_locked = account.is_locked(Utc::now());
        let updated = self
            .accounts
            .record_failed_login(&account.id, &self.policy)
            .await?;

        let now = Utc::now();
        let status = updated.lockout_status(now);

        self.reporter
            .audit(
                AuditEvent::new(
                    AuditKind::LoginFailed,
                    AuditCategory::Authentication,
                    AuditSeverity::Info,
                )
                .ip_address(ip)
                .extra(serde_json::json!({
                    "username": updated.username,
                    "failed_attempts": updated.failed_login_attempts,
                })),
            )
            .await;

        if status.is_locked && !was_locked {
            let reason = status
                .reason
                .clone()
                .unwrap_or_else(|| "Too many failed login attempts".to_string());
            self.reporter
                .audit(
                    AuditEvent::new(
                        AuditKind::AccountAutoLocked,
                        AuditCategory::Security,
                        AuditSeverity::Warning,
                    )
                    .ip_address(ip)
                    .blocked(reason)
                    .extra(serde_json::json!({
                        "username": updated.username,
                        "failed_attempts": updated.failed_login_attempts,
                        "locked_until": updated.login_locked_until,
                    })),
                )
                .await;
            self.reporter
                .notify(
                    &updated.id,
                    "Your account has been temporarily locked after repeated failed sign-in attempts.",
                    None,
                )
                .await;
        }

        Ok(status)
    }

    /// Reset the failed-attempt counter after a successful authentication.
    pub async fn reset_after_success(&self, id: &AccountId) -> Result<(), Error> {
        self.accounts.reset_failed_logins(id).await
    }

    /// Manually lock an account.
    ///
    /// Preconditions: the justification carries at least 10 characters, the
    /// caller holds the lock capability, the target is not an administrator,
    /// and the target is not already manually locked. All of the target's
    /// sessions are terminated as part of the lock.
    pub async fn lock_manually(
        &self,
        target_id: &AccountId,
        admin: &Account,
        reason: &str,
        notes: Option<&str>,
    ) -> Result<(), Error> {
        validate_justification(reason, "reason")?;

        if !admin.capabilities().can_lock_accounts {
            self.audit_unauthorized(admin, "can_lock_accounts").await;
            return Err(AuthorizationError::MissingCapability {
                role: admin.role.as_str(),
                capability: "can_lock_accounts",
            }
            .into());
        }

        let target = self
            .accounts
            .find_by_id(target_id)
            .await?
            .ok_or(NotFoundError::Account)?;

        if target.role == Role::Admin {
            self.audit_unauthorized(admin, "lock_admin_target").await;
            return Err(AuthorizationError::AdminTargetProtected.into());
        }
        if target.is_manually_locked {
            return Err(ConflictError::AlreadyManuallyLocked.into());
        }

        let now = Utc::now();
        self.accounts
            .apply_manual_lock(
                &target.id,
                ManualLock {
                    locked_by: admin.id.clone(),
                    locked_at: now,
                    reason: reason.to_string(),
                    notes: notes.map(str::to_string),
                },
            )
            .await?;

        let ended_sessions = self.sessions.delete_by_user(&target.id).await?;

        self.reporter
            .audit(
                AuditEvent::new(
                    AuditKind::AccountManuallyLocked,
                    AuditCategory::Administration,
                    AuditSeverity::Critical,
                )
                .actor(&admin.id, &admin.username, admin.role.as_str())
                .blocked(reason)
                .extra(serde_json::json!({
                    "target": target.id,
                    "target_username": target.username,
                    "sessions_terminated": ended_sessions,
                })),
            )
            .await;
        self.reporter
            .notify(
                &target.id,
                "Your account has been locked by an administrator. Contact HR support for assistance.",
                None,
            )
            .await;

        Ok(())
    }

    /// Unlock an account after identity verification.
    ///
    /// Clears both manual and automatic lockout state and resets the
    /// failed-attempt counter to zero.
    pub async fn unlock(
        &self,
        target_id: &AccountId,
        admin: &Account,
        verification_notes: &str,
        identity_verified: bool,
    ) -> Result<(), Error> {
        validate_justification(verification_notes, "verification notes")?;
        if !identity_verified {
            return Err(crate::error::ValidationError::IdentityNotVerified.into());
        }

        if !admin.capabilities().can_unlock_accounts {
            self.audit_unauthorized(admin, "can_unlock_accounts").await;
            return Err(AuthorizationError::MissingCapability {
                role: admin.role.as_str(),
                capability: "can_unlock_accounts",
            }
            .into());
        }

        let target = self
            .accounts
            .find_by_id(target_id)
            .await?
            .ok_or(NotFoundError::Account)?;

        if !target.is_locked(Utc::now()) {
            return Err(ConflictError::NotLocked.into());
        }

        self.accounts.clear_lockout(&target.id).await?;

        self.reporter
            .audit(
                AuditEvent::new(
                    AuditKind::AccountUnlocked,
                    AuditCategory::Administration,
                    AuditSeverity::Warning,
                )
                .actor(&admin.id, &admin.username, admin.role.as_str())
                .extra(serde_json::json!({
                    "target": target.id,
                    "target_username": target.username,
                    "verification_notes": verification_notes,
                })),
            )
            .await;
        self.reporter
            .notify(&target.id, "Your account has been unlocked.", None)
            .await;

        Ok(())
    }

    async fn audit_unauthorized(&self, actor: &Account, capability: &str) {
        self.reporter
            .audit(
                AuditEvent::new(
                    AuditKind::UnauthorizedAccess,
                    AuditCategory::Authorization,
                    AuditSeverity::Warning,
                )
                .actor(&actor.id, &actor.username, actor.role.as_str())
                .blocked(format!("missing capability: {capability}")),
            )
            .await;
    }
}
