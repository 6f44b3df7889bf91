//! Repository trait for account security state.
//!
//! Every mutation here is a read-modify-write over shared state reached by
//! concurrent requests (two tabs polling activity, a double-submitted
//! login), so implementations must express each method as a single
//! conditional update or a transaction spanning the read-check-write.
//! No method may cache account state across calls; each request starts
//! from a fresh read.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    Error,
    account::{Account, AccountId, LockoutPolicy},
};

/// Fields applied by a manual administrative lock.
#[derive(Debug, Clone)]
pub struct ManualLock {
    pub locked_by: AccountId,
    pub locked_at: DateTime<Utc>,
    pub reason: String,
    pub notes: Option<String>,
}

/// Fields applied by a password update.
#[derive(Debug, Clone)]
pub struct PasswordUpdate {
    pub password_hash: String,
    pub is_temporary: bool,
    pub temporary_expiry: Option<DateTime<Utc>>,
    pub must_change: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Repository for account security state.
#[async_trait]
pub trait AccountRepository: Send + Sync + 'static {
    /// Create an account record.
    async fn create(&self, account: Account) -> Result<Account, Error>;

    /// Find an account by its ID.
    async fn find_by_id(&self, id: &AccountId) -> Result<Option<Account>, Error>;

    /// Find an account by its unique username.
    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, Error>;

    /// Record a failed login attempt: atomically increment the counter and,
    /// when the post-increment count crosses the policy threshold, arm the
    /// automatic lockout in the same update.
    ///
    /// Returns the account as it stands after the update. The increment and
    /// the lockout decision must not be separable by a concurrent attempt
    /// (no two attempts may observe the same pre-increment count).
    async fn record_failed_login(
        &self,
        id: &AccountId,
        policy: &LockoutPolicy,
    ) -> Result<Account, Error>;

    /// Reset the failed-login counter and drop any expired automatic
    /// lockout remnants. Called on successful authentication.
    async fn reset_failed_logins(&self, id: &AccountId) -> Result<(), Error>;

    /// Apply a manual administrative lock.
    async fn apply_manual_lock(&self, id: &AccountId, lock: ManualLock) -> Result<(), Error>;

    /// Clear every lockout field (manual and automatic) and reset the
    /// failed-login counter to zero.
    async fn clear_lockout(&self, id: &AccountId) -> Result<(), Error>;

    /// Persist the inactivity-tracking timestamp. `None` clears it so a
    /// stale value cannot be replayed to look active after logout.
    async fn set_last_activity(
        &self,
        id: &AccountId,
        at: Option<DateTime<Utc>>,
    ) -> Result<(), Error>;

    /// Replace the password material and lifecycle flags in one update.
    /// Also resets the grace period, warning level and change-attempt
    /// counter, which are only meaningful for the previous password.
    async fn update_password(&self, id: &AccountId, update: PasswordUpdate) -> Result<(), Error>;

    /// Record a wrong-current-password attempt during a password change:
    /// atomic increment, optionally arming the change-operation lockout.
    async fn record_failed_password_change(
        &self,
        id: &AccountId,
        lock_until: Option<DateTime<Utc>>,
    ) -> Result<Account, Error>;

    /// Mark the start of the post-expiry grace period, only if not already
    /// set (first-writer-wins under concurrent logins).
    async fn set_grace_period_start(&self, id: &AccountId, at: DateTime<Utc>)
    -> Result<(), Error>;

    /// Persist the highest expiration-warning level delivered so far.
    async fn set_expiration_warning_level(&self, id: &AccountId, level: u8) -> Result<(), Error>;
}
