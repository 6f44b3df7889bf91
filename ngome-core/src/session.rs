//! Session records
//!
//! A session binds an opaque bearer token to an account. The token is the
//! only secret; the `sess_`-prefixed id is a public handle that the token
//! can never be derived from. Sessions expire on their own clock
//! (`expires_at`), independently of the inactivity timeout tracked on the
//! account record, so callers must check both.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    account::AccountId,
    crypto::generate_secure_token,
    id::{generate_prefixed_id, validate_prefixed_id},
};

/// Number of token characters exposed in masked renderings.
const MASK_PREFIX_LEN: usize = 8;

/// Public handle for a session record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: &str) -> Self {
        SessionId(id.to_string())
    }

    pub fn new_random() -> Self {
        SessionId(generate_prefixed_id("sess"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_valid(&self) -> bool {
        validate_prefixed_id(&self.0, "sess")
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque session bearer token with 256 bits of entropy.
///
/// The full value leaves the session manager exactly once, at creation time.
/// Every listing surface goes through [`SessionToken::masked`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: &str) -> Self {
        SessionToken(token.to_string())
    }

    pub fn new_random() -> Self {
        SessionToken(generate_secure_token())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    /// Masked rendering: the first characters followed by an ellipsis.
    /// Safe to show in session lists and logs.
    pub fn masked(&self) -> String {
        let prefix: String = self.0.chars().take(MASK_PREFIX_LEN).collect();
        format!("{prefix}…")
    }
}

impl From<String> for SessionToken {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionToken {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Derived device classification, computed from the raw user-agent at
/// session creation. The raw string is kept alongside for audit purposes;
/// anomaly detection compares classes, not strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceClass {
    Mobile,
    Tablet,
    Windows,
    Mac,
    Linux,
    Unknown,
}

impl DeviceClass {
    /// Classify a user-agent by substring match. Order matters: mobile and
    /// tablet markers take precedence over the desktop OS markers they
    /// often embed.
    pub fn from_user_agent(user_agent: &str) -> Self {
        let ua = user_agent.to_lowercase();
        if ua.contains("ipad") || ua.contains("tablet") {
            DeviceClass::Tablet
        } else if ua.contains("mobile") || ua.contains("iphone") || ua.contains("android") {
            DeviceClass::Mobile
        } else if ua.contains("windows") {
            DeviceClass::Windows
        } else if ua.contains("mac os") || ua.contains("macintosh") {
            DeviceClass::Mac
        } else if ua.contains("linux") || ua.contains("x11") {
            DeviceClass::Linux
        } else {
            DeviceClass::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceClass::Mobile => "Mobile",
            DeviceClass::Tablet => "Tablet",
            DeviceClass::Windows => "Windows",
            DeviceClass::Mac => "Mac",
            DeviceClass::Linux => "Linux",
            DeviceClass::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Public handle for the session record.
    pub id: SessionId,

    /// The owning account. A session belongs to exactly one account.
    pub user_id: AccountId,

    /// Opaque bearer secret, independent of `id`.
    pub token: SessionToken,

    /// The IP address of the client that created the session.
    pub ip_address: Option<String>,

    /// The raw user agent of the client that created the session.
    pub user_agent: Option<String>,

    /// Device classification derived from the user agent.
    pub device_class: DeviceClass,

    /// The timestamp when the session was created.
    pub created_at: DateTime<Utc>,

    /// The timestamp of the last validated request on this session.
    pub last_activity: DateTime<Utc>,

    /// The timestamp when the session will expire.
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Client-facing projection with the token masked.
    pub fn summarize(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            token_masked: self.token.masked(),
            ip_address: self.ip_address.clone(),
            user_agent: self.user_agent.clone(),
            device_class: self.device_class,
            created_at: self.created_at,
            last_activity: self.last_activity,
            expires_at: self.expires_at,
        }
    }
}

/// What session listings expose: everything except the bearer secret.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: SessionId,
    pub token_masked: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub device_class: DeviceClass,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_session_token_masking() {
        let token = SessionToken::new("abcdefghijklmnopqrstuvwxyz0123456789ABCDEFG");
        assert_eq!(token.masked(), "abcdefgh…");

        let short = SessionToken::new("abc");
        assert_eq!(short.masked(), "abc…");
    }

    #[test]
    fn test_session_id_is_not_the_token() {
        let id = SessionId::new_random();
        let token = SessionToken::new_random();
        assert!(id.as_str().starts_with("sess_"));
        assert!(!token.as_str().contains(id.as_str()));
    }

    #[test]
    fn test_device_classification() {
        let cases = [
            (
                "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) Mobile/15E148",
                DeviceClass::Mobile,
            ),
            (
                "Mozilla/5.0 (Linux; Android 14; SM-G991B) Mobile Safari/537.36",
                DeviceClass::Mobile,
            ),
            ("Mozilla/5.0 (iPad; CPU OS 17_0)", DeviceClass::Tablet),
            (
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64)",
                DeviceClass::Windows,
            ),
            (
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_2)",
                DeviceClass::Mac,
            ),
            ("Mozilla/5.0 (X11; Linux x86_64)", DeviceClass::Linux),
            ("curl/8.4.0", DeviceClass::Unknown),
        ];

        for (ua, expected) in cases {
            assert_eq!(DeviceClass::from_user_agent(ua), expected, "ua: {ua}");
        }
    }

    #[test]
    fn test_session_expiry() {
        let now = Utc::now();
        let session = Session {
            id: SessionId::new_random(),
            user_id: AccountId::new_random(),
            token: SessionToken::new_random(),
            ip_address: Some("10.0.0.1".to_string()),
            user_agent: None,
            device_class: DeviceClass::Unknown,
            created_at: now,
            last_activity: now,
            expires_at: now + Duration::hours(24),
        };
        assert!(!session.is_expired(now));
        assert!(session.is_expired(now + Duration::hours(25)));
        // Boundary: a session expiring exactly now is expired
        assert!(session.is_expired(session.expires_at));
    }

    #[test]
    fn test_summary_masks_token() {
        let now = Utc::now();
        let session = Session {
            id: SessionId::new_random(),
            user_id: AccountId::new_random(),
            token: SessionToken::new_random(),
            ip_address: None,
            user_agent: Some("Mozilla/5.0 (Windows NT 10.0)".to_string()),
            device_class: DeviceClass::Windows,
            created_at: now,
            last_activity: now,
            expires_at: now + Duration::hours(1),
        };
        let summary = session.summarize();
        assert!(summary.token_masked.ends_with('…'));
        assert!(!summary.token_masked.contains(session.token.as_str()));
    }
}
