//! Password lifecycle service.
//!
//! Change-password with wrong-current-password throttling, administrative
//! temporary password issuance, and the expiration warning ladder. The
//! complexity and strength rules themselves live in [`crate::password`];
//! this service owns the stateful transitions around them.

use std::sync::Arc;

use chrono::Utc;

use crate::{
    Error,
    account::{Account, AccountId},
    error::{AuthError, AuthorizationError, NotFoundError, ValidationError},
    events::{AuditCategory, AuditEvent, AuditKind, AuditSeverity, SecurityReporter},
    password::{self, ExpirationStatus, PasswordPolicy, is_common_password},
    repositories::{AccountRepository, PasswordUpdate, SessionRepository},
    session::SessionToken,
};

/// Service for password lifecycle operations.
pub struct PasswordService<A: AccountRepository, S: SessionRepository> {
    accounts: Arc<A>,
    sessions: Arc<S>,
    policy: PasswordPolicy,
    reporter: SecurityReporter,
}

impl<A: AccountRepository, S: SessionRepository> PasswordService<A, S> {
    pub fn new(
        accounts: Arc<A>,
        sessions: Arc<S>,
        policy: PasswordPolicy,
        reporter: SecurityReporter,
    ) -> Self {
        Self {
            accounts,
            sessions,
            policy,
            reporter,
        }
    }

    pub fn policy(&self) -> &PasswordPolicy {
        &self.policy
    }

    /// Change an account's password after verifying the current one.
    ///
    /// Wrong-current-password attempts are throttled: at the policy limit
    /// the change operation locks for the configured window. On success
    /// every other session for the account is terminated; `current_token`
    /// identifies the session to keep.
    pub async fn change_password(
        &self,
        user_id: &AccountId,
        current_password: &str,
        new_password: &str,
        current_token: Option<&SessionToken>,
    ) -> Result<(), Error> {
        let account = self
            .accounts
            .find_by_id(user_id)
            .await?
            .ok_or(NotFoundError::Account)?;

        let now = Utc::now();
        if let Some(until) = account.password_change_lockout_until
            && until > now
        {
            return Err(AuthError::PasswordChangeLocked {
                remaining_seconds: (until - now).num_seconds().max(1),
            }
            .into());
        }

        if !password::verify_password(current_password, &account.password_hash) {
            let lock_until = self
                .policy
                .change_lockout_after(account.failed_password_change_attempts + 1, now);
            let updated = self
                .accounts
                .record_failed_password_change(user_id, lock_until)
                .await?;

            if lock_until.is_some() {
                self.reporter
                    .audit(
                        AuditEvent::new(
                            AuditKind::PasswordChangeLocked,
                            AuditCategory::Security,
                            AuditSeverity::Warning,
                        )
                        .blocked("too many wrong current-password attempts")
                        .extra(serde_json::json!({
                            "username": updated.username,
                            "attempts": updated.failed_password_change_attempts,
                        })),
                    )
                    .await;
            }
            return Err(AuthError::InvalidCredentials.into());
        }

        self.validate_new_password(new_password)?;

        let hash = password::hash_password(new_password)?;
        self.accounts
            .update_password(
                user_id,
                PasswordUpdate {
                    password_hash: hash,
                    is_temporary: false,
                    temporary_expiry: None,
                    must_change: false,
                    expires_at: Some(self.policy.next_expiry(now)),
                },
            )
            .await?;

        // Every other session ends with the old credential.
        let ended = match current_token {
            Some(keep) => self.sessions.delete_by_user_except(user_id, keep).await?,
            None => self.sessions.delete_by_user(user_id).await?,
        };

        self.reporter
            .audit(
                AuditEvent::new(
                    AuditKind::PasswordChanged,
                    AuditCategory::Security,
                    AuditSeverity::Info,
                )
                .extra(serde_json::json!({
                    "username": account.username,
                    "other_sessions_terminated": ended,
                })),
            )
            .await;
        self.reporter
            .notify(user_id, "Your password was changed.", None)
            .await;

        Ok(())
    }

    /// Issue a temporary password for an account (administrative reset).
    ///
    /// Returns the plaintext exactly once; only the hash is stored. The
    /// account is flagged to change the password at next login, and the
    /// temporary credential expires after the policy window.
    pub async fn issue_temporary_password(
        &self,
        target_id: &AccountId,
        admin: &Account,
    ) -> Result<String, Error> {
        if !admin.capabilities().can_reset_passwords {
            return Err(AuthorizationError::MissingCapability {
                role: admin.role.as_str(),
                capability: "can_reset_passwords",
            }
            .into());
        }

        let target = self
            .accounts
            .find_by_id(target_id)
            .await?
            .ok_or(NotFoundError::Account)?;

        let now = Utc::now();
        let temporary = self.policy.generate_temporary_password();
        let hash = password::hash_password(&temporary)?;

        self.accounts
            .update_password(
                target_id,
                PasswordUpdate {
                    password_hash: hash,
                    is_temporary: true,
                    temporary_expiry: Some(self.policy.temporary_password_expiry(now)),
                    must_change: true,
                    expires_at: None,
                },
            )
            .await?;

        // The old credential is gone; so are its sessions.
        self.sessions.delete_by_user(target_id).await?;

        self.reporter
            .audit(
                AuditEvent::new(
                    AuditKind::TemporaryPasswordIssued,
                    AuditCategory::Administration,
                    AuditSeverity::Warning,
                )
                .actor(&admin.id, &admin.username, admin.role.as_str())
                .extra(serde_json::json!({
                    "target": target.id,
                    "target_username": target.username,
                })),
            )
            .await;
        self.reporter
            .notify(
                target_id,
                "A temporary password has been issued for your account. It expires in 24 hours.",
                None,
            )
            .await;

        Ok(temporary)
    }

    /// Expiry projection for an account's password.
    pub async fn expiration_status(&self, user_id: &AccountId) -> Result<ExpirationStatus, Error> {
        let account = self
            .accounts
            .find_by_id(user_id)
            .await?
            .ok_or(NotFoundError::Account)?;
        Ok(self.policy.expiration_status(&account, Utc::now()))
    }

    /// Deliver an expiration warning if the account crossed a new ladder
    /// level since the last one delivered. Each level fires once.
    pub async fn check_expiration_warning(&self, account: &Account) -> Result<(), Error> {
        let status = self.policy.expiration_status(account, Utc::now());
        if status.is_expired || status.warning_level <= account.last_expiration_warning_level {
            return Ok(());
        }

        self.accounts
            .set_expiration_warning_level(&account.id, status.warning_level)
            .await?;

        let days = status.days_until_expiration.unwrap_or(0);
        self.reporter
            .notify(
                &account.id,
                &format!("Your password expires in {days} day(s). Please change it soon."),
                None,
            )
            .await;
        Ok(())
    }

    fn validate_new_password(&self, candidate: &str) -> Result<(), Error> {
        let failures = self.policy.complexity_failures(candidate);
        if !failures.is_empty() {
            let message = failures
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ValidationError::InvalidPassword(message).into());
        }
        if is_common_password(candidate) {
            return Err(ValidationError::CommonPassword.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Role;
    use crate::testing::{MemoryAccountRepository, MemorySessionRepository, make_session};
    use chrono::Duration;

    const INITIAL: &str = "original_password_9";

    async fn seeded() -> (
        Arc<MemoryAccountRepository>,
        Arc<MemorySessionRepository>,
        Account,
        PasswordService<MemoryAccountRepository, MemorySessionRepository>,
    ) {
        let accounts = Arc::new(MemoryAccountRepository::new());
        let sessions = Arc::new(MemorySessionRepository::new());
        let account = accounts
            .create(
                Account::builder()
                    .username("jkhamis")
                    .role(Role::Employee)
                    .password_hash(password::hash_password(INITIAL).unwrap())
                    .build()
                    .unwrap(),
            )
            .await
            .unwrap();
        let service = PasswordService::new(
            accounts.clone(),
            sessions.clone(),
            PasswordPolicy::default(),
            SecurityReporter::disabled(),
        );
        (accounts, sessions, account, service)
    }

    #[tokio::test]
    async fn test_change_password_happy_path() {
        let (accounts, _, account, service) = seeded().await;

        service
            .change_password(&account.id, INITIAL, "new_password_42", None)
            .await
            .unwrap();

        let stored = accounts.find_by_id(&account.id).await.unwrap().unwrap();
        assert!(password::verify_password("new_password_42", &stored.password_hash));
        assert!(!password::verify_password(INITIAL, &stored.password_hash));
        assert!(!stored.is_temporary_password);
        assert!(!stored.must_change_password);
        assert!(stored.password_expires_at.unwrap() > Utc::now());
        assert_eq!(stored.failed_password_change_attempts, 0);
    }

    #[tokio::test]
    async fn test_change_password_rejects_weak_candidate() {
        let (accounts, _, account, service) = seeded().await;

        let err = service
            .change_password(&account.id, INITIAL, "short", None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::InvalidPassword(_))
        ));

        // Old password still in place
        let stored = accounts.find_by_id(&account.id).await.unwrap().unwrap();
        assert!(password::verify_password(INITIAL, &stored.password_hash));
    }

    #[tokio::test]
    async fn test_change_password_rejects_common_candidate() {
        let (_, _, account, service) = seeded().await;

        let err = service
            .change_password(&account.id, INITIAL, "password123", None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::CommonPassword)
        ));
    }

    #[tokio::test]
    async fn test_wrong_current_password_counts_and_locks() {
        let (accounts, _, account, service) = seeded().await;

        for _ in 0..5 {
            let err = service
                .change_password(&account.id, "not the password", "new_password_42", None)
                .await
                .unwrap_err();
            assert!(matches!(err, Error::Auth(AuthError::InvalidCredentials)));
        }

        let stored = accounts.find_by_id(&account.id).await.unwrap().unwrap();
        assert_eq!(stored.failed_password_change_attempts, 5);
        assert!(stored.password_change_lockout_until.unwrap() > Utc::now());

        // Even the correct current password is refused while locked
        let err = service
            .change_password(&account.id, INITIAL, "new_password_42", None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Auth(AuthError::PasswordChangeLocked { .. })
        ));
    }

    #[tokio::test]
    async fn test_change_password_ends_other_sessions() {
        let (_, sessions, account, service) = seeded().await;
        let now = Utc::now();

        let current = make_session(&account.id, "10.0.0.1", "agent", now, now + Duration::hours(8));
        let other = make_session(&account.id, "10.0.0.2", "agent", now, now + Duration::hours(8));
        sessions.create(current.clone(), 3).await.unwrap();
        sessions.create(other.clone(), 3).await.unwrap();

        service
            .change_password(&account.id, INITIAL, "new_password_42", Some(&current.token))
            .await
            .unwrap();

        assert!(sessions.find_by_token(&current.token).await.unwrap().is_some());
        assert!(sessions.find_by_token(&other.token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_temporary_password_issuance() {
        let (accounts, sessions, account, service) = seeded().await;
        let admin = accounts
            .create(
                Account::builder()
                    .username("asalim")
                    .role(Role::Admin)
                    .password_hash("$argon2id$x")
                    .build()
                    .unwrap(),
            )
            .await
            .unwrap();
        let now = Utc::now();
        sessions
            .create(
                make_session(&account.id, "10.0.0.1", "agent", now, now + Duration::hours(8)),
                3,
            )
            .await
            .unwrap();

        let temporary = service
            .issue_temporary_password(&account.id, &admin)
            .await
            .unwrap();

        let stored = accounts.find_by_id(&account.id).await.unwrap().unwrap();
        assert!(password::verify_password(&temporary, &stored.password_hash));
        assert!(stored.is_temporary_password);
        assert!(stored.must_change_password);
        let expiry = stored.temporary_password_expiry.unwrap();
        assert!(expiry > Utc::now() + Duration::hours(23));
        assert!(expiry <= Utc::now() + Duration::hours(24));
        // Old sessions are gone along with the old credential
        assert_eq!(sessions.count().await, 0);
    }

    #[tokio::test]
    async fn test_temporary_password_requires_capability() {
        let (accounts, _, account, service) = seeded().await;
        let officer = accounts
            .create(
                Account::builder()
                    .username("mhassan")
                    .role(Role::HrOfficer)
                    .password_hash("$argon2id$x")
                    .build()
                    .unwrap(),
            )
            .await
            .unwrap();

        let err = service
            .issue_temporary_password(&account.id, &officer)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Authorization(AuthorizationError::MissingCapability { .. })
        ));
    }

    #[tokio::test]
    async fn test_expiration_warning_fires_once_per_level() {
        use crate::events::Notifier;
        use async_trait::async_trait;
        use std::sync::Mutex as StdMutex;

        struct Recorder {
            messages: StdMutex<Vec<String>>,
        }

        #[async_trait]
        impl Notifier for Recorder {
            async fn notify(
                &self,
                _user_id: &AccountId,
                message: &str,
                _link: Option<&str>,
            ) -> Result<(), Error> {
                self.messages.lock().unwrap().push(message.to_string());
                Ok(())
            }
        }

        let recorder = Arc::new(Recorder {
            messages: StdMutex::new(Vec::new()),
        });
        let accounts = Arc::new(MemoryAccountRepository::new());
        let sessions = Arc::new(MemorySessionRepository::new());
        let account = accounts
            .create(
                Account::builder()
                    .username("jkhamis")
                    .password_hash("$argon2id$x")
                    .password_expires_at(Some(Utc::now() + Duration::days(10)))
                    .build()
                    .unwrap(),
            )
            .await
            .unwrap();
        let service = PasswordService::new(
            accounts.clone(),
            sessions,
            PasswordPolicy::default(),
            SecurityReporter::disabled().with_notifier(recorder.clone()),
        );

        // 10 days out: level 2 (30 and 14 day thresholds crossed)
        service.check_expiration_warning(&account).await.unwrap();
        assert_eq!(recorder.messages.lock().unwrap().len(), 1);

        // Same level again: nothing new
        let refreshed = accounts.find_by_id(&account.id).await.unwrap().unwrap();
        assert_eq!(refreshed.last_expiration_warning_level, 2);
        service.check_expiration_warning(&refreshed).await.unwrap();
        assert_eq!(recorder.messages.lock().unwrap().len(), 1);
    }
}
