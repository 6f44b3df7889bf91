use chrono::{DateTime, Utc};
use ngome_core::{
    account::{AccountId, LockoutStatus, Role},
    password::ExpirationStatus,
    services::{ActivityStatus, LoginInspection},
    session::{SessionId, SessionSummary},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user_id: AccountId,
    pub username: String,
    pub role: Role,
    pub session_token: String,
    pub must_change_password: bool,
    pub password_status: ExpirationStatus,
    pub inspection: LoginInspection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRequest {
    pub user_id: AccountId,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityResponse {
    pub last_activity: DateTime<Utc>,
    pub session_expired: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityQuery {
    pub user_id: AccountId,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityStatusResponse {
    pub last_activity: Option<DateTime<Utc>>,
    pub session_expired: bool,
    pub remaining_ms: i64,
    pub in_warning: bool,
}

impl From<ActivityStatus> for ActivityStatusResponse {
    fn from(status: ActivityStatus) -> Self {
        Self {
            last_activity: status.last_activity,
            session_expired: status.session_expired,
            remaining_ms: status.remaining_ms,
            in_warning: status.in_warning,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    pub user_id: AccountId,
    pub session_token: String,
    #[serde(default)]
    pub logout_all: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionsQuery {
    pub user_id: AccountId,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionsResponse {
    pub sessions: Vec<SessionSummary>,
    pub max_concurrent_sessions: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForceLogoutRequest {
    pub session_id: SessionId,
    pub user_id: AccountId,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForceLogoutResponse {
    pub terminated: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub user_id: AccountId,
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockAccountRequest {
    pub user_id: AccountId,
    pub admin_id: AccountId,
    pub reason: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockAccountRequest {
    pub user_id: AccountId,
    pub admin_id: AccountId,
    pub verification_notes: String,
    pub identity_verified: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRequest {
    pub user_id: AccountId,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LockoutStatusResponse {
    pub is_locked: bool,
    pub lock_type: Option<String>,
    pub remaining_seconds: Option<i64>,
    pub reason: Option<String>,
    pub failed_attempts: u32,
}

impl From<LockoutStatus> for LockoutStatusResponse {
    fn from(status: LockoutStatus) -> Self {
        Self {
            is_locked: status.is_locked,
            lock_type: status.kind.map(|k| k.as_str().to_string()),
            remaining_seconds: status.remaining_seconds,
            reason: status.reason,
            failed_attempts: status.failed_attempts,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordStatusResponse {
    pub expires_at: Option<DateTime<Utc>>,
    pub days_until_expiration: Option<i64>,
    pub is_expired: bool,
    pub is_in_grace_period: bool,
    pub grace_period_days_remaining: Option<i64>,
    pub grace_period_expired: bool,
    pub warning_level: u8,
}

impl From<ExpirationStatus> for PasswordStatusResponse {
    fn from(status: ExpirationStatus) -> Self {
        Self {
            expires_at: status.expires_at,
            days_until_expiration: status.days_until_expiration,
            is_expired: status.is_expired,
            is_in_grace_period: status.is_in_grace_period,
            grace_period_days_remaining: status.grace_period_days_remaining,
            grace_period_expired: status.grace_period_expired,
            warning_level: status.warning_level,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrengthCheckRequest {
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrengthCheckResponse {
    pub score: u8,
    pub strength: String,
    pub crack_time_display: String,
    pub warning: Option<String>,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Client connection details extracted from the request.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

/// Session cookie settings.
#[derive(Debug, Clone)]
pub struct CookieConfig {
    pub name: String,
    pub http_only: bool,
    pub secure: bool,
    pub path: String,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: "ngome_session".to_string(),
            http_only: true,
            secure: true,
            path: "/".to_string(),
        }
    }
}

impl CookieConfig {
    pub fn development() -> Self {
        Self {
            secure: false,
            ..Self::default()
        }
    }
}
