//! Password policy engine
//!
//! Pure functions over a password string and an account's stored password
//! metadata: complexity validation, the known-weak list, strength scoring,
//! temporary password generation, hashing, and expiration arithmetic.
//!
//! Complexity and common-password checks return plain booleans so callers
//! can assemble user-facing messages; they never fail. Hashing and token
//! generation treat an unavailable entropy source as fatal.

pub mod common;
pub mod strength;

use chrono::{DateTime, Duration, Utc};
use rand::{TryRngCore, rngs::OsRng};
use serde::Serialize;

use crate::{Error, account::Account};

pub use common::is_common_password;
pub use strength::{Feedback, Strength, StrengthReport, score_strength};

/// Length of generated temporary passwords.
const TEMP_PASSWORD_LEN: usize = 12;

/// Alphabet for temporary passwords. Excludes visually ambiguous characters
/// (O/0, l/1) since these passwords are read to users over the phone.
const TEMP_PASSWORD_ALPHABET: &[u8] =
    b"ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnpqrstuvwxyz23456789!@#$%&*-+=?";

/// Password lifecycle configuration.
#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    /// Minimum password length for the complexity check.
    pub min_length: usize,
    /// Validity window of an admin-issued temporary password.
    pub temporary_password_ttl: Duration,
    /// How long a freshly set password remains valid.
    pub expiry_interval: Duration,
    /// Login window after expiry during which the user is flagged but
    /// still admitted.
    pub grace_period: Duration,
    /// Days-before-expiry thresholds at which warnings escalate.
    pub warning_ladder_days: [i64; 5],
    /// Wrong-current-password attempts before the change operation locks.
    pub change_attempt_limit: u32,
    /// How long the change operation stays locked.
    pub change_lockout: Duration,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            temporary_password_ttl: Duration::hours(24),
            expiry_interval: Duration::days(90),
            grace_period: Duration::days(7),
            warning_ladder_days: [30, 14, 7, 3, 1],
            change_attempt_limit: 5,
            change_lockout: Duration::minutes(30),
        }
    }
}

/// A complexity rule a candidate password failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ComplexityRule {
    TooShort { min: usize, actual: usize },
    NoCharacterClass,
}

impl std::fmt::Display for ComplexityRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComplexityRule::TooShort { min, actual } => {
                write!(f, "must be at least {min} characters (got {actual})")
            }
            ComplexityRule::NoCharacterClass => write!(
                f,
                "must contain at least one letter, digit or special character"
            ),
        }
    }
}

/// Internally consistent projection of an account's password expiry state.
#[derive(Debug, Clone, Serialize)]
pub struct ExpirationStatus {
    pub expires_at: Option<DateTime<Utc>>,
    /// Whole days until expiry. `Some(0)` once expired; `None` when the
    /// password never expires.
    pub days_until_expiration: Option<i64>,
    pub is_expired: bool,
    pub is_in_grace_period: bool,
    pub grace_period_days_remaining: Option<i64>,
    pub grace_period_expired: bool,
    /// Number of warning-ladder thresholds crossed (0 = none yet).
    pub warning_level: u8,
}

impl PasswordPolicy {
    /// Complexity check: length at or above the minimum AND at least one
    /// recognized character class present.
    ///
    /// The single-class rule (OR across classes, not AND) mirrors the
    /// deployed policy; tightening it is a stakeholder decision, not a code
    /// change to make silently.
    pub fn validate_complexity(&self, password: &str) -> bool {
        self.complexity_failures(password).is_empty()
    }

    /// Concrete rule failures, for user-facing enumeration.
    pub fn complexity_failures(&self, password: &str) -> Vec<ComplexityRule> {
        let mut failures = Vec::new();

        let length = password.chars().count();
        if length < self.min_length {
            failures.push(ComplexityRule::TooShort {
                min: self.min_length,
                actual: length,
            });
        }

        let has_class = password.chars().any(|c| c.is_ascii_uppercase())
            || password.chars().any(|c| c.is_ascii_lowercase())
            || password.chars().any(|c| c.is_ascii_digit())
            || password
                .chars()
                .any(|c| !c.is_alphanumeric() && !c.is_whitespace());
        if !has_class {
            failures.push(ComplexityRule::NoCharacterClass);
        }

        failures
    }

    /// Generate a temporary password that passes [`validate_complexity`]
    /// and the common-password check by construction.
    ///
    /// # Panics
    ///
    /// Panics if the OS random number generator fails; there is no safe
    /// fallback for credential material.
    ///
    /// [`validate_complexity`]: PasswordPolicy::validate_complexity
    pub fn generate_temporary_password(&self) -> String {
        loop {
            let mut bytes = [0u8; TEMP_PASSWORD_LEN];
            OsRng
                .try_fill_bytes(&mut bytes)
                .expect("OS RNG failure - system entropy source unavailable");

            let candidate: String = bytes
                .iter()
                .map(|b| TEMP_PASSWORD_ALPHABET[*b as usize % TEMP_PASSWORD_ALPHABET.len()] as char)
                .collect();

            // Require all four classes, well past the minimum the
            // complexity rule asks for.
            let all_classes = candidate.chars().any(|c| c.is_ascii_uppercase())
                && candidate.chars().any(|c| c.is_ascii_lowercase())
                && candidate.chars().any(|c| c.is_ascii_digit())
                && candidate.chars().any(|c| !c.is_alphanumeric());

            if all_classes && self.validate_complexity(&candidate) && !is_common_password(&candidate)
            {
                return candidate;
            }
        }
    }

    /// Expiry timestamp for a temporary password issued now.
    pub fn temporary_password_expiry(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + self.temporary_password_ttl
    }

    /// Expiry timestamp for a regular password set now.
    pub fn next_expiry(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + self.expiry_interval
    }

    /// Lockout deadline for the change operation after a wrong-current-password
    /// attempt, or `None` while under the limit.
    pub fn change_lockout_after(&self, attempts: u32, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if attempts >= self.change_attempt_limit {
            Some(now + self.change_lockout)
        } else {
            None
        }
    }

    /// Project the expiry state of an account's password.
    ///
    /// The returned fields are mutually consistent: an expired password
    /// reports zero days remaining, and grace fields are only populated
    /// once expiry has occurred.
    pub fn expiration_status(&self, account: &Account, now: DateTime<Utc>) -> ExpirationStatus {
        let Some(expires_at) = account.password_expires_at else {
            return ExpirationStatus {
                expires_at: None,
                days_until_expiration: None,
                is_expired: false,
                is_in_grace_period: false,
                grace_period_days_remaining: None,
                grace_period_expired: false,
                warning_level: 0,
            };
        };

        if now < expires_at {
            let days = (expires_at - now).num_days();
            return ExpirationStatus {
                expires_at: Some(expires_at),
                days_until_expiration: Some(days),
                is_expired: false,
                is_in_grace_period: false,
                grace_period_days_remaining: None,
                grace_period_expired: false,
                warning_level: self.warning_level_for(days),
            };
        }

        // Expired: the grace window is anchored at the first post-expiry
        // login when one has been recorded, else at the expiry itself.
        let grace_start = account.grace_period_started_at.unwrap_or(expires_at);
        let grace_deadline = grace_start + self.grace_period;

        if now < grace_deadline {
            ExpirationStatus {
                expires_at: Some(expires_at),
                days_until_expiration: Some(0),
                is_expired: true,
                is_in_grace_period: true,
                grace_period_days_remaining: Some((grace_deadline - now).num_days()),
                grace_period_expired: false,
                warning_level: self.warning_ladder_days.len() as u8,
            }
        } else {
            ExpirationStatus {
                expires_at: Some(expires_at),
                days_until_expiration: Some(0),
                is_expired: true,
                is_in_grace_period: false,
                grace_period_days_remaining: None,
                grace_period_expired: true,
                warning_level: self.warning_ladder_days.len() as u8,
            }
        }
    }

    fn warning_level_for(&self, days_until: i64) -> u8 {
        self.warning_ladder_days
            .iter()
            .filter(|&&threshold| days_until <= threshold)
            .count() as u8
    }
}

/// Hash a password with an adaptive one-way function (argon2).
pub fn hash_password(password: &str) -> Result<String, Error> {
    use password_auth::generate_hash;
    Ok(generate_hash(password))
}

/// Verify a password against a stored hash.
///
/// Verification time does not depend on where the candidate diverges from
/// the stored value; the comparison happens over the derived hash.
pub fn verify_password(password: &str, hash: &str) -> bool {
    password_auth::verify_password(password, hash).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Account;

    fn account_expiring(expires_at: Option<DateTime<Utc>>) -> Account {
        Account::builder()
            .username("jkhamis")
            .password_hash("$argon2id$test")
            .password_expires_at(expires_at)
            .build()
            .unwrap()
    }

    #[test]
    fn test_complexity_requires_min_length() {
        let policy = PasswordPolicy::default();
        assert!(!policy.validate_complexity("shortr7"));
        assert!(policy.validate_complexity("12345678"));
        assert!(policy.validate_complexity("aaaaaaaa"));
    }

    #[test]
    fn test_complexity_single_class_suffices() {
        // Deliberately permissive: one class is enough
        let policy = PasswordPolicy::default();
        assert!(policy.validate_complexity("lowercaseonly"));
        assert!(policy.validate_complexity("UPPERCASEONLY"));
        assert!(policy.validate_complexity("1234567890"));
        assert!(policy.validate_complexity("!!!!!!!!"));
    }

    #[test]
    fn test_complexity_rejects_classless() {
        let policy = PasswordPolicy::default();
        let failures = policy.complexity_failures("        ");
        assert!(failures.contains(&ComplexityRule::NoCharacterClass));
    }

    #[test]
    fn test_complexity_failures_enumerate() {
        let policy = PasswordPolicy::default();
        let failures = policy.complexity_failures("ab1");
        assert_eq!(
            failures,
            vec![ComplexityRule::TooShort { min: 8, actual: 3 }]
        );
        assert!(failures[0].to_string().contains("at least 8"));
    }

    #[test]
    fn test_temporary_password_satisfies_policy() {
        let policy = PasswordPolicy::default();
        for _ in 0..20 {
            let password = policy.generate_temporary_password();
            assert_eq!(password.chars().count(), TEMP_PASSWORD_LEN);
            assert!(policy.validate_complexity(&password));
            assert!(!is_common_password(&password));
        }
    }

    #[test]
    fn test_temporary_passwords_are_unique() {
        let policy = PasswordPolicy::default();
        assert_ne!(
            policy.generate_temporary_password(),
            policy.generate_temporary_password()
        );
    }

    #[test]
    fn test_hash_and_verify_roundtrip() {
        let hash = hash_password("correct horse battery staple").unwrap();
        assert!(verify_password("correct horse battery staple", &hash));
        assert!(!verify_password("wrong password", &hash));
    }

    #[test]
    fn test_expiry_windows() {
        let policy = PasswordPolicy::default();
        let now = Utc::now();
        assert_eq!(policy.temporary_password_expiry(now), now + Duration::hours(24));
        assert_eq!(policy.next_expiry(now), now + Duration::days(90));
    }

    #[test]
    fn test_status_without_expiry() {
        let policy = PasswordPolicy::default();
        let status = policy.expiration_status(&account_expiring(None), Utc::now());
        assert!(!status.is_expired);
        assert!(status.days_until_expiration.is_none());
        assert_eq!(status.warning_level, 0);
    }

    #[test]
    fn test_status_before_expiry() {
        let policy = PasswordPolicy::default();
        let now = Utc::now();
        let account = account_expiring(Some(now + Duration::days(10)));
        let status = policy.expiration_status(&account, now);

        assert!(!status.is_expired);
        assert_eq!(status.days_until_expiration, Some(10));
        assert!(!status.is_in_grace_period);
        // 10 days out crosses the 30- and 14-day thresholds
        assert_eq!(status.warning_level, 2);
    }

    #[test]
    fn test_status_in_grace_period() {
        let policy = PasswordPolicy::default();
        let now = Utc::now();
        let account = account_expiring(Some(now - Duration::days(2)));
        let status = policy.expiration_status(&account, now);

        assert!(status.is_expired);
        assert!(status.is_in_grace_period);
        assert!(!status.grace_period_expired);
        assert_eq!(status.grace_period_days_remaining, Some(5));
        // Never both expired and days remaining
        assert_eq!(status.days_until_expiration, Some(0));
    }

    #[test]
    fn test_status_grace_anchored_at_first_login() {
        let policy = PasswordPolicy::default();
        let now = Utc::now();
        let mut account = account_expiring(Some(now - Duration::days(10)));
        // First post-expiry login happened 3 days ago
        account.grace_period_started_at = Some(now - Duration::days(3));
        let status = policy.expiration_status(&account, now);

        assert!(status.is_in_grace_period);
        assert_eq!(status.grace_period_days_remaining, Some(4));
    }

    #[test]
    fn test_status_after_grace_period() {
        let policy = PasswordPolicy::default();
        let now = Utc::now();
        let account = account_expiring(Some(now - Duration::days(30)));
        let status = policy.expiration_status(&account, now);

        assert!(status.is_expired);
        assert!(!status.is_in_grace_period);
        assert!(status.grace_period_expired);
        assert!(status.grace_period_days_remaining.is_none());
    }

    #[test]
    fn test_warning_ladder() {
        let policy = PasswordPolicy::default();
        assert_eq!(policy.warning_level_for(60), 0);
        assert_eq!(policy.warning_level_for(30), 1);
        assert_eq!(policy.warning_level_for(14), 2);
        assert_eq!(policy.warning_level_for(5), 3);
        assert_eq!(policy.warning_level_for(2), 4);
        assert_eq!(policy.warning_level_for(1), 5);
        assert_eq!(policy.warning_level_for(0), 5);
    }

    #[test]
    fn test_change_lockout_threshold() {
        let policy = PasswordPolicy::default();
        let now = Utc::now();
        assert!(policy.change_lockout_after(4, now).is_none());
        assert_eq!(
            policy.change_lockout_after(5, now),
            Some(now + Duration::minutes(30))
        );
    }
}
