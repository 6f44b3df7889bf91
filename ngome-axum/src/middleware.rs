use std::sync::Arc;

use axum::{
    Extension,
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;

use ngome::{Ngome, SessionToken, csrf};
use ngome_core::{
    events::{AuditCategory, AuditEvent, AuditKind, AuditSeverity},
    repositories::RepositoryProvider,
};

use crate::{error::ApiError, types::CookieConfig};

pub struct AuthState<R: RepositoryProvider> {
    pub ngome: Arc<Ngome<R>>,
}

impl<R: RepositoryProvider> Clone for AuthState<R> {
    fn clone(&self) -> Self {
        Self {
            ngome: self.ngome.clone(),
        }
    }
}

/// Double-submit CSRF enforcement for state-changing methods.
///
/// On failure the rejection is classified for the audit trail (with a
/// best-effort actor lookup from the session cookie), but the response
/// stays generic so the caller cannot tell which half was missing.
pub async fn csrf_middleware<R>(
    State(state): State<AuthState<R>>,
    Extension(cookie_config): Extension<CookieConfig>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Response
where
    R: RepositoryProvider,
{
    if !csrf::requires_protection(request.method().as_str()) {
        return next.run(request).await;
    }

    let cookie_token = jar.get(csrf::CSRF_COOKIE).map(|c| c.value().to_string());
    let header_token = request
        .headers()
        .get(csrf::CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    if let Err(rejection) = csrf::verify(cookie_token.as_deref(), header_token.as_deref()) {
        let mut event = AuditEvent::new(
            AuditKind::CsrfViolation,
            AuditCategory::Security,
            AuditSeverity::Warning,
        )
        .request(request.uri().path(), request.method().as_str())
        .blocked(rejection.audit_label());

        // Best-effort actor identity from the session cookie. Absence or a
        // stale token never blocks the violation log.
        if let Some(account) = resolve_actor(&state, &cookie_config, &jar).await {
            event = event.actor(&account.id, &account.username, account.role.as_str());
        }

        state.ngome.reporter().audit(event).await;
        return ApiError::CsrfRejected.into_response();
    }

    next.run(request).await
}

async fn resolve_actor<R>(
    state: &AuthState<R>,
    cookie_config: &CookieConfig,
    jar: &CookieJar,
) -> Option<ngome_core::Account>
where
    R: RepositoryProvider,
{
    let token = jar.get(&cookie_config.name)?.value().to_string();
    let session = state
        .ngome
        .validate_session(&SessionToken::new(&token))
        .await
        .ok()??;
    state.ngome.get_account(&session.user_id).await.ok()?
}
