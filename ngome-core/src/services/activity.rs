//! Inactivity timeout tracking.
//!
//! The tracker maintains a per-account `last_activity` timestamp and
//! projects timeout/warning state from it. It is independent of session
//! expiry: a session can hold a perfectly valid token and still be timed
//! out by inactivity, so callers check both.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::{
    Error,
    account::AccountId,
    error::NotFoundError,
    repositories::AccountRepository,
};

/// Inactivity window configuration.
#[derive(Debug, Clone)]
pub struct ActivityWindow {
    /// Inactivity period after which the user is timed out.
    pub timeout: Duration,
    /// Window before timeout during which clients show a warning.
    pub warning: Duration,
}

impl Default for ActivityWindow {
    fn default() -> Self {
        Self {
            timeout: Duration::minutes(7),
            warning: Duration::seconds(60),
        }
    }
}

impl ActivityWindow {
    /// A never-active account (`None`) is timed out immediately: a cleared
    /// timestamp must not be replayable as "still active".
    pub fn is_timed_out(&self, last_activity: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match last_activity {
            None => true,
            Some(at) => now - at > self.timeout,
        }
    }

    /// Milliseconds until timeout, clamped at zero.
    pub fn remaining_ms(&self, last_activity: Option<DateTime<Utc>>, now: DateTime<Utc>) -> i64 {
        match last_activity {
            None => 0,
            Some(at) => (self.timeout - (now - at)).num_milliseconds().max(0),
        }
    }

    /// True iff the remaining time is within `(0, warning]`.
    pub fn is_in_warning(&self, last_activity: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        let remaining = self.remaining_ms(last_activity, now);
        remaining > 0 && remaining <= self.warning.num_milliseconds()
    }
}

/// Activity state projection for clients polling the timeout.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityStatus {
    pub last_activity: Option<DateTime<Utc>>,
    pub session_expired: bool,
    pub remaining_ms: i64,
    pub in_warning: bool,
}

/// Service persisting the per-account activity timestamp.
pub struct ActivityService<A: AccountRepository> {
    accounts: Arc<A>,
    window: ActivityWindow,
}

impl<A: AccountRepository> ActivityService<A> {
    pub fn new(accounts: Arc<A>, window: ActivityWindow) -> Self {
        Self { accounts, window }
    }

    pub fn window(&self) -> &ActivityWindow {
        &self.window
    }

    /// Persist `now` as the account's latest activity and return it.
    pub async fn record_activity(&self, id: &AccountId) -> Result<DateTime<Utc>, Error> {
        let now = Utc::now();
        self.accounts.set_last_activity(id, Some(now)).await?;
        Ok(now)
    }

    /// Clear the activity timestamp (logout), so the account reads as
    /// timed out until the next login.
    pub async fn clear_activity(&self, id: &AccountId) -> Result<(), Error> {
        self.accounts.set_last_activity(id, None).await
    }

    /// Current timeout state for an account.
    pub async fn status(&self, id: &AccountId) -> Result<ActivityStatus, Error> {
        let account = self
            .accounts
            .find_by_id(id)
            .await?
            .ok_or(NotFoundError::Account)?;
        let now = Utc::now();
        Ok(ActivityStatus {
            last_activity: account.last_activity,
            session_expired: self.window.is_timed_out(account.last_activity, now),
            remaining_ms: self.window.remaining_ms(account.last_activity, now),
            in_warning: self.window.is_in_warning(account.last_activity, now),
        })
    }
}
