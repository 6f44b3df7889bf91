//! Security event emission
//!
//! Every lockout transition, session mutation and guard violation emits an
//! [`AuditEvent`] to an external append-only sink, and user-facing changes
//! additionally push a [`Notifier`] message. Both sinks are best-effort
//! side channels: [`SecurityReporter`] guarantees that emission never fails
//! and never blocks the primary operation, so a slow or unavailable sink
//! degrades to a warning log, not a failed login.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::{Error, account::AccountId};

/// What happened. The wire value is the snake_case label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    LoginFailed,
    LoginRejectedLocked,
    LoginSucceeded,
    AccountAutoLocked,
    AccountManuallyLocked,
    AccountUnlocked,
    SessionCreated,
    SessionEvicted,
    SessionTerminated,
    ForcedLogout,
    PasswordChanged,
    PasswordChangeLocked,
    TemporaryPasswordIssued,
    SuspiciousLogin,
    CsrfViolation,
    UnauthorizedAccess,
}

impl AuditKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditKind::LoginFailed => "login_failed",
            AuditKind::LoginRejectedLocked => "login_rejected_locked",
            AuditKind::LoginSucceeded => "login_succeeded",
            AuditKind::AccountAutoLocked => "account_auto_locked",
            AuditKind::AccountManuallyLocked => "account_manually_locked",
            AuditKind::AccountUnlocked => "account_unlocked",
            AuditKind::SessionCreated => "session_created",
            AuditKind::SessionEvicted => "session_evicted",
            AuditKind::SessionTerminated => "session_terminated",
            AuditKind::ForcedLogout => "forced_logout",
            AuditKind::PasswordChanged => "password_changed",
            AuditKind::PasswordChangeLocked => "password_change_locked",
            AuditKind::TemporaryPasswordIssued => "temporary_password_issued",
            AuditKind::SuspiciousLogin => "suspicious_login",
            AuditKind::CsrfViolation => "csrf_violation",
            AuditKind::UnauthorizedAccess => "unauthorized_access",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditCategory {
    Authentication,
    Authorization,
    Security,
    Administration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSeverity {
    Info,
    Warning,
    Critical,
}

/// One audit trail entry.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub kind: AuditKind,
    pub category: AuditCategory,
    pub severity: AuditSeverity,
    pub actor_id: Option<AccountId>,
    pub actor_username: Option<String>,
    pub actor_role: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub route: Option<String>,
    pub method: Option<String>,
    pub authenticated: bool,
    pub blocked: bool,
    pub block_reason: Option<String>,
    pub extra: Option<Value>,
}

impl AuditEvent {
    pub fn new(kind: AuditKind, category: AuditCategory, severity: AuditSeverity) -> Self {
        Self {
            kind,
            category,
            severity,
            actor_id: None,
            actor_username: None,
            actor_role: None,
            ip_address: None,
            user_agent: None,
            route: None,
            method: None,
            authenticated: false,
            blocked: false,
            block_reason: None,
            extra: None,
        }
    }

    pub fn actor(mut self, id: &AccountId, username: &str, role: &'static str) -> Self {
        self.actor_id = Some(id.clone());
        self.actor_username = Some(username.to_string());
        self.actor_role = Some(role.to_string());
        self.authenticated = true;
        self
    }

    pub fn ip_address(mut self, ip: Option<&str>) -> Self {
        self.ip_address = ip.map(str::to_string);
        self
    }

    pub fn user_agent(mut self, user_agent: Option<&str>) -> Self {
        self.user_agent = user_agent.map(str::to_string);
        self
    }

    pub fn request(mut self, route: &str, method: &str) -> Self {
        self.route = Some(route.to_string());
        self.method = Some(method.to_string());
        self
    }

    pub fn blocked(mut self, reason: impl Into<String>) -> Self {
        self.blocked = true;
        self.block_reason = Some(reason.into());
        self
    }

    pub fn extra(mut self, extra: Value) -> Self {
        self.extra = Some(extra);
        self
    }
}

/// Append-only audit trail consumer.
#[async_trait]
pub trait AuditSink: Send + Sync + 'static {
    async fn append(&self, event: AuditEvent) -> Result<(), Error>;
}

/// Fire-and-forget user notification delivery.
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn notify(
        &self,
        user_id: &AccountId,
        message: &str,
        link: Option<&str>,
    ) -> Result<(), Error>;
}

/// Best-effort emitter over the audit and notification sinks.
///
/// Contract: [`SecurityReporter::audit`] and [`SecurityReporter::notify`]
/// never return an error and never propagate a sink failure into the
/// calling operation. Sink errors are logged and dropped.
#[derive(Clone)]
pub struct SecurityReporter {
    audit_sink: Option<Arc<dyn AuditSink>>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl SecurityReporter {
    pub fn new(audit_sink: Arc<dyn AuditSink>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            audit_sink: Some(audit_sink),
            notifier: Some(notifier),
        }
    }

    /// Reporter with no sinks attached; every emission is a no-op.
    pub fn disabled() -> Self {
        Self {
            audit_sink: None,
            notifier: None,
        }
    }

    pub fn with_audit_sink(mut self, audit_sink: Arc<dyn AuditSink>) -> Self {
        self.audit_sink = Some(audit_sink);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Append an audit event. Never fails.
    pub async fn audit(&self, event: AuditEvent) {
        if let Some(sink) = &self.audit_sink
            && let Err(e) = sink.append(event).await
        {
            tracing::warn!(error = %e, "Audit sink unavailable, event dropped");
        }
    }

    /// Deliver a user notification. Never fails.
    pub async fn notify(&self, user_id: &AccountId, message: &str, link: Option<&str>) {
        if let Some(notifier) = &self.notifier
            && let Err(e) = notifier.notify(user_id, message, link).await
        {
            tracing::warn!(error = %e, user_id = %user_id, "Notification delivery failed");
        }
    }
}

impl Default for SecurityReporter {
    fn default() -> Self {
        Self::disabled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RecordingSink {
        events: Mutex<Vec<AuditEvent>>,
    }

    #[async_trait]
    impl AuditSink for RecordingSink {
        async fn append(&self, event: AuditEvent) -> Result<(), Error> {
            self.events.lock().unwrap().push(event);
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl AuditSink for FailingSink {
        async fn append(&self, _event: AuditEvent) -> Result<(), Error> {
            Err(StorageError::Connection("sink down".to_string()).into())
        }
    }

    struct CountingNotifier {
        count: AtomicUsize,
    }

    #[async_trait]
    impl Notifier for CountingNotifier {
        async fn notify(
            &self,
            _user_id: &AccountId,
            _message: &str,
            _link: Option<&str>,
        ) -> Result<(), Error> {
            self.count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_audit_event_reaches_sink() {
        let sink = Arc::new(RecordingSink {
            events: Mutex::new(Vec::new()),
        });
        let reporter = SecurityReporter::disabled().with_audit_sink(sink.clone());

        let event = AuditEvent::new(
            AuditKind::AccountAutoLocked,
            AuditCategory::Security,
            AuditSeverity::Warning,
        )
        .blocked("Too many failed login attempts (5)");
        reporter.audit(event).await;

        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, AuditKind::AccountAutoLocked);
        assert!(events[0].blocked);
    }

    #[tokio::test]
    async fn test_sink_failure_is_swallowed() {
        let reporter = SecurityReporter::disabled().with_audit_sink(Arc::new(FailingSink));

        // Must not panic or propagate the error
        reporter
            .audit(AuditEvent::new(
                AuditKind::LoginFailed,
                AuditCategory::Authentication,
                AuditSeverity::Info,
            ))
            .await;
    }

    #[tokio::test]
    async fn test_disabled_reporter_is_noop() {
        let reporter = SecurityReporter::disabled();
        reporter
            .audit(AuditEvent::new(
                AuditKind::LoginFailed,
                AuditCategory::Authentication,
                AuditSeverity::Info,
            ))
            .await;
        reporter
            .notify(&AccountId::new_random(), "message", None)
            .await;
    }

    #[tokio::test]
    async fn test_notification_delivery() {
        let notifier = Arc::new(CountingNotifier {
            count: AtomicUsize::new(0),
        });
        let reporter = SecurityReporter::disabled().with_notifier(notifier.clone());

        reporter
            .notify(&AccountId::new_random(), "Your account was locked", None)
            .await;
        assert_eq!(notifier.count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_event_builder() {
        let admin = AccountId::new_random();
        let event = AuditEvent::new(
            AuditKind::AccountManuallyLocked,
            AuditCategory::Administration,
            AuditSeverity::Critical,
        )
        .actor(&admin, "asalim", "Admin")
        .ip_address(Some("10.1.2.3"))
        .request("/admin/lock-account", "POST")
        .extra(serde_json::json!({ "target": "usr_x" }));

        assert_eq!(event.actor_id, Some(admin));
        assert!(event.authenticated);
        assert_eq!(event.method.as_deref(), Some("POST"));
        assert!(event.extra.is_some());
    }
}
