//! Suspicious login detection.
//!
//! A read-only consumer of session history: given the IP and user agent of
//! a fresh login, classify it against the account's recent sessions and
//! decide whether the user should be told. The detector must never take
//! login availability down with it, so storage failures fail open.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::{
    account::AccountId,
    repositories::SessionRepository,
    session::{DeviceClass, Session},
};

/// Detection thresholds.
#[derive(Debug, Clone)]
pub struct AnomalyConfig {
    /// How far back session history is considered.
    pub history_window: Duration,
    /// How many of the most recent sessions feed the known IP/device sets.
    pub recent_considered: u32,
    /// Two logins from different IPs within this window count as rapid.
    pub rapid_window: Duration,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            history_window: Duration::days(30),
            recent_considered: 10,
            rapid_window: Duration::minutes(5),
        }
    }
}

/// One reason a login looked unusual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalySignal {
    NewIpAddress,
    NewDeviceClass,
    ConcurrentDifferentIp,
    RapidDifferentIp,
}

impl AnomalySignal {
    pub fn describe(&self) -> &'static str {
        match self {
            AnomalySignal::NewIpAddress => "new IP address",
            AnomalySignal::NewDeviceClass => "new device type",
            AnomalySignal::ConcurrentDifferentIp => "concurrent login from different IP",
            AnomalySignal::RapidDifferentIp => "rapid login from different IP",
        }
    }
}

/// Verdict on one login attempt.
#[derive(Debug, Clone, Serialize)]
pub struct LoginInspection {
    pub is_suspicious: bool,
    pub reasons: Vec<AnomalySignal>,
    /// Notify only on combinations that suggest takeover, not on every
    /// single-signal travel or device change.
    pub should_notify: bool,
}

impl LoginInspection {
    fn clean() -> Self {
        Self {
            is_suspicious: false,
            reasons: Vec::new(),
            should_notify: false,
        }
    }
}

/// Read-only login anomaly detector.
pub struct AnomalyService<S: SessionRepository> {
    sessions: Arc<S>,
    config: AnomalyConfig,
}

impl<S: SessionRepository> AnomalyService<S> {
    pub fn new(sessions: Arc<S>, config: AnomalyConfig) -> Self {
        Self { sessions, config }
    }

    /// Inspect a login against the account's session history.
    ///
    /// Fails open: if history cannot be read, the attempt is treated as
    /// not suspicious and a warning is logged.
    pub async fn inspect_login(
        &self,
        user_id: &AccountId,
        ip: Option<&str>,
        user_agent: Option<&str>,
    ) -> LoginInspection {
        let now = Utc::now();
        let since = now - self.config.history_window;

        let history = match self
            .sessions
            .find_recent_by_user(user_id, since, self.config.recent_considered)
            .await
        {
            Ok(history) => history,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    user_id = %user_id,
                    "Could not read session history, treating login as not suspicious"
                );
                return LoginInspection::clean();
            }
        };

        self.classify(&history, ip, user_agent, now)
    }

    fn classify(
        &self,
        history: &[Session],
        ip: Option<&str>,
        user_agent: Option<&str>,
        now: DateTime<Utc>,
    ) -> LoginInspection {
        // Cold start: the very first session is never suspicious.
        if history.is_empty() {
            return LoginInspection::clean();
        }

        let mut reasons = Vec::new();

        let known_ips: Vec<&str> = history
            .iter()
            .filter_map(|s| s.ip_address.as_deref())
            .collect();
        let known_devices: Vec<DeviceClass> =
            history.iter().map(|s| s.device_class).collect();

        let new_ip = match ip {
            Some(ip) => !known_ips.contains(&ip),
            None => false,
        };
        if new_ip {
            reasons.push(AnomalySignal::NewIpAddress);
        }

        let new_device = match user_agent {
            Some(ua) => !known_devices.contains(&DeviceClass::from_user_agent(ua)),
            None => false,
        };
        if new_device {
            reasons.push(AnomalySignal::NewDeviceClass);
        }

        let concurrent_other_ip = ip.is_some()
            && history
                .iter()
                .any(|s| !s.is_expired(now) && s.ip_address.as_deref() != ip);
        if concurrent_other_ip {
            reasons.push(AnomalySignal::ConcurrentDifferentIp);
        }

        // History is newest first; the head is the most recent prior session.
        let rapid_other_ip = ip.is_some()
            && history.first().is_some_and(|last| {
                now - last.created_at < self.config.rapid_window
                    && last.ip_address.as_deref() != ip
            });
        if rapid_other_ip {
            reasons.push(AnomalySignal::RapidDifferentIp);
        }

        let should_notify = (new_ip && new_device) || concurrent_other_ip || rapid_other_ip;

        LoginInspection {
            is_suspicious: !reasons.is_empty(),
            reasons,
            should_notify,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemorySessionRepository, make_session};
    use crate::{Error, repositories::SessionCreation, session::{SessionId, SessionToken}};
    use async_trait::async_trait;

    const DESKTOP: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64)";
    const PHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0) Mobile/15E148";

    fn service(sessions: Arc<MemorySessionRepository>) -> AnomalyService<MemorySessionRepository> {
        AnomalyService::new(sessions, AnomalyConfig::default())
    }

    #[tokio::test]
    async fn test_first_session_never_suspicious() {
        let sessions = Arc::new(MemorySessionRepository::new());
        let service = service(sessions);
        let user = AccountId::new_random();

        let inspection = service
            .inspect_login(&user, Some("203.0.113.7"), Some(PHONE))
            .await;
        assert!(!inspection.is_suspicious);
        assert!(!inspection.should_notify);
        assert!(inspection.reasons.is_empty());
    }

    #[tokio::test]
    async fn test_known_ip_and_device_is_clean() {
        let sessions = Arc::new(MemorySessionRepository::new());
        let user = AccountId::new_random();
        let now = Utc::now();
        sessions
            .create(
                make_session(&user, "10.0.0.1", DESKTOP, now - Duration::days(2), now - Duration::days(1)),
                3,
            )
            .await
            .unwrap();

        let service = service(sessions);
        let inspection = service
            .inspect_login(&user, Some("10.0.0.1"), Some(DESKTOP))
            .await;
        assert!(!inspection.is_suspicious);
    }

    #[tokio::test]
    async fn test_new_ip_alone_flags_without_notification() {
        let sessions = Arc::new(MemorySessionRepository::new());
        let user = AccountId::new_random();
        let now = Utc::now();
        // Expired session from a known IP, same device class
        sessions
            .create(
                make_session(&user, "10.0.0.1", DESKTOP, now - Duration::days(2), now - Duration::days(1)),
                3,
            )
            .await
            .unwrap();

        let service = service(sessions);
        let inspection = service
            .inspect_login(&user, Some("198.51.100.9"), Some(DESKTOP))
            .await;
        assert!(inspection.is_suspicious);
        assert_eq!(inspection.reasons, vec![AnomalySignal::NewIpAddress]);
        // Ordinary travel: flag, but do not page the user
        assert!(!inspection.should_notify);
    }

    #[tokio::test]
    async fn test_new_ip_and_new_device_notifies() {
        let sessions = Arc::new(MemorySessionRepository::new());
        let user = AccountId::new_random();
        let now = Utc::now();
        sessions
            .create(
                make_session(&user, "10.0.0.1", DESKTOP, now - Duration::days(2), now - Duration::days(1)),
                3,
            )
            .await
            .unwrap();

        let service = service(sessions);
        let inspection = service
            .inspect_login(&user, Some("198.51.100.9"), Some(PHONE))
            .await;
        assert!(inspection.is_suspicious);
        assert!(inspection.reasons.contains(&AnomalySignal::NewIpAddress));
        assert!(inspection.reasons.contains(&AnomalySignal::NewDeviceClass));
        assert!(inspection.should_notify);
    }

    #[tokio::test]
    async fn test_concurrent_session_from_other_ip_notifies() {
        let sessions = Arc::new(MemorySessionRepository::new());
        let user = AccountId::new_random();
        let now = Utc::now();
        // Live session from another IP
        sessions
            .create(
                make_session(&user, "10.0.0.1", DESKTOP, now - Duration::hours(1), now + Duration::hours(7)),
                3,
            )
            .await
            .unwrap();

        let service = service(sessions);
        let inspection = service
            .inspect_login(&user, Some("198.51.100.9"), Some(DESKTOP))
            .await;
        assert!(
            inspection
                .reasons
                .contains(&AnomalySignal::ConcurrentDifferentIp)
        );
        assert!(inspection.should_notify);
    }

    #[tokio::test]
    async fn test_rapid_relogin_from_other_ip_notifies() {
        let sessions = Arc::new(MemorySessionRepository::new());
        let user = AccountId::new_random();
        let now = Utc::now();
        // Prior session created two minutes ago, already ended
        sessions
            .create(
                make_session(&user, "10.0.0.1", DESKTOP, now - Duration::minutes(2), now - Duration::minutes(1)),
                3,
            )
            .await
            .unwrap();

        let service = service(sessions);
        let inspection = service
            .inspect_login(&user, Some("198.51.100.9"), Some(DESKTOP))
            .await;
        assert!(inspection.reasons.contains(&AnomalySignal::RapidDifferentIp));
        assert!(inspection.should_notify);
    }

    #[tokio::test]
    async fn test_storage_failure_fails_open() {
        struct BrokenRepository;

        #[async_trait]
        impl SessionRepository for BrokenRepository {
            async fn create(
                &self,
                _session: Session,
                _max_sessions: u32,
            ) -> Result<SessionCreation, Error> {
                unimplemented!()
            }
            async fn find_by_token(
                &self,
                _token: &SessionToken,
            ) -> Result<Option<Session>, Error> {
                unimplemented!()
            }
            async fn find_active_by_user(
                &self,
                _user_id: &AccountId,
                _now: DateTime<Utc>,
            ) -> Result<Vec<Session>, Error> {
                unimplemented!()
            }
            async fn find_recent_by_user(
                &self,
                _user_id: &AccountId,
                _since: DateTime<Utc>,
                _limit: u32,
            ) -> Result<Vec<Session>, Error> {
                Err(crate::error::StorageError::Connection("store down".to_string()).into())
            }
            async fn touch(
                &self,
                _token: &SessionToken,
                _last_activity: DateTime<Utc>,
                _expires_at: DateTime<Utc>,
            ) -> Result<(), Error> {
                unimplemented!()
            }
            async fn delete_by_token(&self, _token: &SessionToken) -> Result<bool, Error> {
                unimplemented!()
            }
            async fn delete_by_id(
                &self,
                _id: &SessionId,
                _owner: &AccountId,
            ) -> Result<bool, Error> {
                unimplemented!()
            }
            async fn delete_by_user(&self, _user_id: &AccountId) -> Result<u64, Error> {
                unimplemented!()
            }
            async fn delete_by_user_except(
                &self,
                _user_id: &AccountId,
                _keep: &SessionToken,
            ) -> Result<u64, Error> {
                unimplemented!()
            }
            async fn delete_expired(&self, _now: DateTime<Utc>) -> Result<u64, Error> {
                unimplemented!()
            }
        }

        let service = AnomalyService::new(Arc::new(BrokenRepository), AnomalyConfig::default());
        let inspection = service
            .inspect_login(&AccountId::new_random(), Some("198.51.100.9"), Some(PHONE))
            .await;
        assert!(!inspection.is_suspicious);
        assert!(!inspection.should_notify);
    }
}
