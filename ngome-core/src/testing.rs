//! In-memory repository implementations for service tests.
//!
//! These mirror the transactional contract a real backend provides: every
//! read-modify-write runs under one mutex guard, so the increment-and-lock
//! and cap-check-evict-insert sequences are atomic the way the repository
//! traits require.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::{
    Error,
    account::{Account, AccountId, LockoutKind, LockoutPolicy},
    error::NotFoundError,
    repositories::{
        AccountRepository, ManualLock, PasswordUpdate, SessionCreation, SessionRepository,
    },
    session::{Session, SessionId, SessionToken},
};

#[derive(Default)]
pub(crate) struct MemoryAccountRepository {
    accounts: Mutex<HashMap<AccountId, Account>>,
}

impl MemoryAccountRepository {
    pub(crate) fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountRepository for MemoryAccountRepository {
    async fn create(&self, account: Account) -> Result<Account, Error> {
        self.accounts
            .lock()
            .await
            .insert(account.id.clone(), account.clone());
        Ok(account)
    }

    async fn find_by_id(&self, id: &AccountId) -> Result<Option<Account>, Error> {
        Ok(self.accounts.lock().await.get(id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, Error> {
        Ok(self
            .accounts
            .lock()
            .await
            .values()
            .find(|a| a.username == username)
            .cloned())
    }

    async fn record_failed_login(
        &self,
        id: &AccountId,
        policy: &LockoutPolicy,
    ) -> Result<Account, Error> {
        let mut accounts = self.accounts.lock().await;
        let account = accounts.get_mut(id).ok_or(NotFoundError::Account)?;

        account.failed_login_attempts += 1;
        let now = Utc::now();
        if let Some((until, reason)) = policy.lockout_after(account.failed_login_attempts, now) {
            account.login_locked_until = Some(until);
            account.login_lockout_reason = Some(reason);
            account.login_lockout_kind = Some(LockoutKind::Automatic);
        }
        account.updated_at = now;
        Ok(account.clone())
    }

    async fn reset_failed_logins(&self, id: &AccountId) -> Result<(), Error> {
        let mut accounts = self.accounts.lock().await;
        let account = accounts.get_mut(id).ok_or(NotFoundError::Account)?;
        account.failed_login_attempts = 0;
        account.login_locked_until = None;
        account.login_lockout_reason = None;
        account.login_lockout_kind = None;
        Ok(())
    }

    async fn apply_manual_lock(&self, id: &AccountId, lock: ManualLock) -> Result<(), Error> {
        let mut accounts = self.accounts.lock().await;
        let account = accounts.get_mut(id).ok_or(NotFoundError::Account)?;
        account.is_manually_locked = true;
        account.locked_by = Some(lock.locked_by);
        account.locked_at = Some(lock.locked_at);
        account.login_lockout_reason = Some(lock.reason);
        account.login_lockout_kind = Some(LockoutKind::Manual);
        account.lockout_notes = lock.notes;
        Ok(())
    }

    async fn clear_lockout(&self, id: &AccountId) -> Result<(), Error> {
        let mut accounts = self.accounts.lock().await;
        let account = accounts.get_mut(id).ok_or(NotFoundError::Account)?;
        account.failed_login_attempts = 0;
        account.login_locked_until = None;
        account.login_lockout_reason = None;
        account.login_lockout_kind = None;
        account.is_manually_locked = false;
        account.locked_by = None;
        account.locked_at = None;
        account.lockout_notes = None;
        Ok(())
    }

    async fn set_last_activity(
        &self,
        id: &AccountId,
        at: Option<DateTime<Utc>>,
    ) -> Result<(), Error> {
        let mut accounts = self.accounts.lock().await;
        let account = accounts.get_mut(id).ok_or(NotFoundError::Account)?;
        account.last_activity = at;
        Ok(())
    }

    async fn update_password(&self, id: &AccountId, update: PasswordUpdate) -> Result<(), Error> {
        let mut accounts = self.accounts.lock().await;
        let account = accounts.get_mut(id).ok_or(NotFoundError::Account)?;
        account.password_hash = update.password_hash;
        account.is_temporary_password = update.is_temporary;
        account.temporary_password_expiry = update.temporary_expiry;
        account.must_change_password = update.must_change;
        account.password_expires_at = update.expires_at;
        account.grace_period_started_at = None;
        account.last_expiration_warning_level = 0;
        account.failed_password_change_attempts = 0;
        account.password_change_lockout_until = None;
        Ok(())
    }

    async fn record_failed_password_change(
        &self,
        id: &AccountId,
        lock_until: Option<DateTime<Utc>>,
    ) -> Result<Account, Error> {
        let mut accounts = self.accounts.lock().await;
        let account = accounts.get_mut(id).ok_or(NotFoundError::Account)?;
        account.failed_password_change_attempts += 1;
        if lock_until.is_some() {
            account.password_change_lockout_until = lock_until;
        }
        Ok(account.clone())
    }

    async fn set_grace_period_start(
        &self,
        id: &AccountId,
        at: DateTime<Utc>,
    ) -> Result<(), Error> {
        let mut accounts = self.accounts.lock().await;
        let account = accounts.get_mut(id).ok_or(NotFoundError::Account)?;
        if account.grace_period_started_at.is_none() {
            account.grace_period_started_at = Some(at);
        }
        Ok(())
    }

    async fn set_expiration_warning_level(&self, id: &AccountId, level: u8) -> Result<(), Error> {
        let mut accounts = self.accounts.lock().await;
        let account = accounts.get_mut(id).ok_or(NotFoundError::Account)?;
        account.last_expiration_warning_level = level;
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct MemorySessionRepository {
    sessions: Mutex<Vec<Session>>,
}

impl MemorySessionRepository {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn count(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

#[async_trait]
impl SessionRepository for MemorySessionRepository {
    async fn create(&self, session: Session, max_sessions: u32) -> Result<SessionCreation, Error> {
        let mut sessions = self.sessions.lock().await;
        let now = Utc::now();

        let mut active: Vec<(usize, DateTime<Utc>, SessionId)> = sessions
            .iter()
            .enumerate()
            .filter(|(_, s)| s.user_id == session.user_id && !s.is_expired(now))
            .map(|(i, s)| (i, s.created_at, s.id.clone()))
            .collect();
        active.sort_by_key(|(_, created_at, _)| *created_at);

        let mut evicted = Vec::new();
        let over = (active.len() as i64) - (max_sessions as i64 - 1);
        if over > 0 {
            let mut doomed: Vec<usize> = active
                .iter()
                .take(over as usize)
                .map(|(i, _, id)| {
                    evicted.push(id.clone());
                    *i
                })
                .collect();
            doomed.sort_unstable_by(|a, b| b.cmp(a));
            for i in doomed {
                sessions.remove(i);
            }
        }

        sessions.push(session.clone());
        Ok(SessionCreation { session, evicted })
    }

    async fn find_by_token(&self, token: &SessionToken) -> Result<Option<Session>, Error> {
        Ok(self
            .sessions
            .lock()
            .await
            .iter()
            .find(|s| &s.token == token)
            .cloned())
    }

    async fn find_active_by_user(
        &self,
        user_id: &AccountId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Session>, Error> {
        let mut result: Vec<Session> = self
            .sessions
            .lock()
            .await
            .iter()
            .filter(|s| &s.user_id == user_id && !s.is_expired(now))
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }

    async fn find_recent_by_user(
        &self,
        user_id: &AccountId,
        since: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Session>, Error> {
        let mut result: Vec<Session> = self
            .sessions
            .lock()
            .await
            .iter()
            .filter(|s| &s.user_id == user_id && s.created_at >= since)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        result.truncate(limit as usize);
        Ok(result)
    }

    async fn touch(
        &self,
        token: &SessionToken,
        last_activity: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<(), Error> {
        let mut sessions = self.sessions.lock().await;
        if let Some(session) = sessions.iter_mut().find(|s| &s.token == token) {
            session.last_activity = last_activity;
            session.expires_at = expires_at;
        }
        Ok(())
    }

    async fn delete_by_token(&self, token: &SessionToken) -> Result<bool, Error> {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|s| &s.token != token);
        Ok(sessions.len() < before)
    }

    async fn delete_by_id(&self, id: &SessionId, owner: &AccountId) -> Result<bool, Error> {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|s| !(&s.id == id && &s.user_id == owner));
        Ok(sessions.len() < before)
    }

    async fn delete_by_user(&self, user_id: &AccountId) -> Result<u64, Error> {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|s| &s.user_id != user_id);
        Ok((before - sessions.len()) as u64)
    }

    async fn delete_by_user_except(
        &self,
        user_id: &AccountId,
        keep: &SessionToken,
    ) -> Result<u64, Error> {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|s| &s.user_id != user_id || &s.token == keep);
        Ok((before - sessions.len()) as u64)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|s| !s.is_expired(now));
        Ok((before - sessions.len()) as u64)
    }
}

/// Build a plain account with a hashed marker password.
pub(crate) fn make_account(username: &str, role: crate::account::Role) -> Account {
    Account::builder()
        .username(username)
        .role(role)
        .password_hash("$argon2id$test-hash")
        .build()
        .unwrap()
}

/// Build a session owned by `user_id`, created at `created_at`.
pub(crate) fn make_session(
    user_id: &AccountId,
    ip: &str,
    user_agent: &str,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> Session {
    Session {
        id: SessionId::new_random(),
        user_id: user_id.clone(),
        token: SessionToken::new_random(),
        ip_address: Some(ip.to_string()),
        user_agent: Some(user_agent.to_string()),
        device_class: crate::session::DeviceClass::from_user_agent(user_agent),
        created_at,
        last_activity: created_at,
        expires_at,
    }
}
