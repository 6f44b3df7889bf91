//! Account security state
//!
//! An [`Account`] is the login-capable subset of the wider employee record:
//! identity fields plus the security metadata the lockout, password and
//! activity machinery operates on. The broader HR profile lives elsewhere
//! and is not this crate's concern.
//!
//! | Field                    | Type               | Description                                      |
//! | ------------------------ | ------------------ | ------------------------------------------------ |
//! | `id`                     | `AccountId`        | Opaque `usr_`-prefixed identifier.               |
//! | `username`               | `String`           | Unique login name.                               |
//! | `role`                   | `Role`             | Closed role enumeration.                         |
//! | `failed_login_attempts`  | `u32`              | Consecutive failed logins, kept across lockouts. |
//! | `login_locked_until`     | `Option<DateTime>` | End of an automatic lockout window.              |
//! | `is_manually_locked`     | `bool`             | Administrator lock, only cleared by an unlock.   |
//! | `last_activity`          | `Option<DateTime>` | Inactivity-timeout anchor.                       |

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    error::ValidationError,
    id::{generate_prefixed_id, validate_prefixed_id},
};

/// A unique, stable identifier for an account.
///
/// Treat the value as opaque; it is not a UUID even where it may look like one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: &str) -> Self {
        AccountId(id.to_string())
    }

    pub fn new_random() -> Self {
        AccountId(generate_prefixed_id("usr"))
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validate that this ID has the correct format for an account ID
    pub fn is_valid(&self) -> bool {
        validate_prefixed_id(&self.0, "usr")
    }
}

impl From<String> for AccountId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Closed enumeration of system roles.
///
/// Authorization decisions go through [`Role::capabilities`] rather than
/// comparing role names, so every permission an endpoint relies on is
/// visible in one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub enum Role {
    Admin,
    HrOfficer,
    HrManager,
    DisciplineOfficer,
    Employee,
}

impl Role {
    pub fn capabilities(&self) -> Capabilities {
        match self {
            Role::Admin => Capabilities {
                can_lock_accounts: true,
                can_unlock_accounts: true,
                can_reset_passwords: true,
                can_view_all_institutions: true,
            },
            Role::HrOfficer | Role::HrManager => Capabilities {
                can_lock_accounts: false,
                can_unlock_accounts: false,
                can_reset_passwords: false,
                can_view_all_institutions: false,
            },
            Role::DisciplineOfficer => Capabilities {
                can_lock_accounts: false,
                can_unlock_accounts: false,
                can_reset_passwords: false,
                can_view_all_institutions: true,
            },
            Role::Employee => Capabilities::none(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::HrOfficer => "HrOfficer",
            Role::HrManager => "HrManager",
            Role::DisciplineOfficer => "DisciplineOfficer",
            Role::Employee => "Employee",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Admin" => Ok(Role::Admin),
            "HrOfficer" => Ok(Role::HrOfficer),
            "HrManager" => Ok(Role::HrManager),
            "DisciplineOfficer" => Ok(Role::DisciplineOfficer),
            "Employee" => Ok(Role::Employee),
            other => Err(ValidationError::InvalidField(format!("Unknown role: {other}")).into()),
        }
    }
}

/// Capability table computed once per role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub can_lock_accounts: bool,
    pub can_unlock_accounts: bool,
    pub can_reset_passwords: bool,
    pub can_view_all_institutions: bool,
}

impl Capabilities {
    pub fn none() -> Self {
        Self {
            can_lock_accounts: false,
            can_unlock_accounts: false,
            can_reset_passwords: false,
            can_view_all_institutions: false,
        }
    }
}

/// How a lockout came into effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockoutKind {
    Automatic,
    Manual,
}

impl LockoutKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockoutKind::Automatic => "automatic",
            LockoutKind::Manual => "manual",
        }
    }
}

impl std::str::FromStr for LockoutKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "automatic" => Ok(LockoutKind::Automatic),
            "manual" => Ok(LockoutKind::Manual),
            other => Err(
                ValidationError::InvalidField(format!("Unknown lockout kind: {other}")).into(),
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub username: String,
    pub role: Role,
    pub institution_id: Option<String>,

    pub password_hash: String,

    // Lockout state
    pub failed_login_attempts: u32,
    pub login_locked_until: Option<DateTime<Utc>>,
    pub login_lockout_reason: Option<String>,
    pub login_lockout_kind: Option<LockoutKind>,
    pub is_manually_locked: bool,
    pub locked_by: Option<AccountId>,
    pub locked_at: Option<DateTime<Utc>>,
    pub lockout_notes: Option<String>,

    // Password lifecycle
    pub is_temporary_password: bool,
    pub temporary_password_expiry: Option<DateTime<Utc>>,
    pub must_change_password: bool,
    pub password_expires_at: Option<DateTime<Utc>>,
    pub grace_period_started_at: Option<DateTime<Utc>>,
    pub last_expiration_warning_level: u8,
    pub failed_password_change_attempts: u32,
    pub password_change_lockout_until: Option<DateTime<Utc>>,

    // Inactivity tracking
    pub last_activity: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn builder() -> AccountBuilder {
        AccountBuilder::default()
    }

    pub fn capabilities(&self) -> Capabilities {
        self.role.capabilities()
    }

    /// An account is locked iff it is manually locked, or an automatic
    /// lockout window is still open.
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.is_manually_locked || self.login_locked_until.is_some_and(|until| until > now)
    }

    /// Pure projection of the lockout state, used both for login-time
    /// rejection and for status display.
    pub fn lockout_status(&self, now: DateTime<Utc>) -> LockoutStatus {
        if self.is_manually_locked {
            return LockoutStatus {
                is_locked: true,
                kind: Some(LockoutKind::Manual),
                remaining_seconds: None,
                reason: self.login_lockout_reason.clone(),
                failed_attempts: self.failed_login_attempts,
            };
        }

        match self.login_locked_until {
            Some(until) if until > now => LockoutStatus {
                is_locked: true,
                kind: Some(LockoutKind::Automatic),
                remaining_seconds: Some((until - now).num_seconds().max(1)),
                reason: self.login_lockout_reason.clone(),
                failed_attempts: self.failed_login_attempts,
            },
            _ => LockoutStatus {
                is_locked: false,
                kind: None,
                remaining_seconds: None,
                reason: None,
                failed_attempts: self.failed_login_attempts,
            },
        }
    }
}

/// Lockout state projection.
#[derive(Debug, Clone, Serialize)]
pub struct LockoutStatus {
    pub is_locked: bool,
    pub kind: Option<LockoutKind>,
    /// Seconds until an automatic lockout expires. `None` for manual locks
    /// and unlocked accounts.
    pub remaining_seconds: Option<i64>,
    pub reason: Option<String>,
    pub failed_attempts: u32,
}

/// Automatic lockout policy: attempt threshold and the escalation schedule.
///
/// The backoff doubles for every failed attempt past the threshold, capped
/// at `max_lockout`, so repeat offenders wait progressively longer.
#[derive(Debug, Clone)]
pub struct LockoutPolicy {
    pub max_failed_attempts: u32,
    pub base_lockout: Duration,
    pub max_lockout: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_failed_attempts: 5,
            base_lockout: Duration::minutes(30),
            max_lockout: Duration::hours(24),
        }
    }
}

impl LockoutPolicy {
    /// Lockout duration for the given (post-increment) attempt count.
    pub fn backoff_for(&self, attempts: u32) -> Duration {
        if attempts < self.max_failed_attempts {
            return Duration::zero();
        }
        let exponent = (attempts - self.max_failed_attempts).min(16);
        let window = self.base_lockout * 2_i32.pow(exponent);
        window.min(self.max_lockout)
    }

    /// Compute the lockout that should be armed after a failed attempt, or
    /// `None` if the attempt count is still below the threshold.
    pub fn lockout_after(
        &self,
        attempts: u32,
        now: DateTime<Utc>,
    ) -> Option<(DateTime<Utc>, String)> {
        if attempts < self.max_failed_attempts {
            return None;
        }
        let until = now + self.backoff_for(attempts);
        let reason = format!("Too many failed login attempts ({attempts})");
        Some((until, reason))
    }
}

#[derive(Default)]
pub struct AccountBuilder {
    id: Option<AccountId>,
    username: Option<String>,
    role: Option<Role>,
    institution_id: Option<String>,
    password_hash: Option<String>,
    password_expires_at: Option<DateTime<Utc>>,
    created_at: Option<DateTime<Utc>>,
}

impl AccountBuilder {
    pub fn id(mut self, id: AccountId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn institution_id(mut self, institution_id: Option<String>) -> Self {
        self.institution_id = institution_id;
        self
    }

    pub fn password_hash(mut self, password_hash: impl Into<String>) -> Self {
        self.password_hash = Some(password_hash.into());
        self
    }

    pub fn password_expires_at(mut self, password_expires_at: Option<DateTime<Utc>>) -> Self {
        self.password_expires_at = password_expires_at;
        self
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn build(self) -> Result<Account, Error> {
        let now = Utc::now();
        Ok(Account {
            id: self.id.unwrap_or_default(),
            username: self.username.ok_or(ValidationError::MissingField(
                "Username is required".to_string(),
            ))?,
            role: self.role.unwrap_or(Role::Employee),
            institution_id: self.institution_id,
            password_hash: self.password_hash.ok_or(ValidationError::MissingField(
                "Password hash is required".to_string(),
            ))?,
            failed_login_attempts: 0,
            login_locked_until: None,
            login_lockout_reason: None,
            login_lockout_kind: None,
            is_manually_locked: false,
            locked_by: None,
            locked_at: None,
            lockout_notes: None,
            is_temporary_password: false,
            temporary_password_expiry: None,
            must_change_password: false,
            password_expires_at: self.password_expires_at,
            grace_period_started_at: None,
            last_expiration_warning_level: 0,
            failed_password_change_attempts: 0,
            password_change_lockout_until: None,
            last_activity: None,
            created_at: self.created_at.unwrap_or(now),
            updated_at: self.created_at.unwrap_or(now),
        })
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new_random()
    }
}
