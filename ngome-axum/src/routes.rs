use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    response::IntoResponse,
    routing::{get, post},
};
use axum_extra::extract::{
    CookieJar,
    cookie::{Cookie, SameSite},
};

use ngome::{Ngome, SessionToken, csrf};
use ngome_core::{password::score_strength, repositories::RepositoryProvider};

use crate::{
    error::{ApiError, Result},
    middleware::{AuthState, csrf_middleware},
    types::*,
};

pub fn create_router<R>(ngome: Arc<Ngome<R>>, cookie_config: CookieConfig) -> Router
where
    R: RepositoryProvider + 'static,
{
    let state = AuthState { ngome };

    // Login itself is exempt: the token pair is only issued with the
    // session, so the guard covers every subsequent unsafe request.
    let protected_routes = Router::new()
        .route(
            "/auth/activity",
            post(record_activity_handler).get(activity_status_handler),
        )
        .route("/auth/logout", post(logout_handler))
        .route("/auth/sessions", get(list_sessions_handler))
        .route("/auth/sessions/force-logout", post(force_logout_handler))
        .route("/auth/change-password", post(change_password_handler))
        .route("/auth/password-strength", post(password_strength_handler))
        .route("/auth/account-lockout-status", post(lockout_status_handler))
        .route("/auth/password-status", post(password_status_handler))
        .route("/admin/lock-account", post(lock_account_handler))
        .route("/admin/unlock-account", post(unlock_account_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            csrf_middleware::<R>,
        ));

    Router::new()
        .route("/health", get(health_handler))
        .route("/auth/login", post(login_handler))
        .merge(protected_routes)
        .with_state(state)
        .layer(axum::Extension(cookie_config))
}

async fn health_handler<R>(State(state): State<AuthState<R>>) -> Result<impl IntoResponse>
where
    R: RepositoryProvider,
{
    state.ngome.health_check().await?;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

async fn login_handler<R>(
    State(state): State<AuthState<R>>,
    axum::Extension(cookie_config): axum::Extension<CookieConfig>,
    connection_info: ConnectionInfo,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse>
where
    R: RepositoryProvider,
{
    let outcome = state
        .ngome
        .login(
            &payload.username,
            &payload.password,
            connection_info.ip,
            connection_info.user_agent,
        )
        .await?;

    let session_cookie = Cookie::build((
        cookie_config.name.clone(),
        outcome.session.token.to_string(),
    ))
    .path(cookie_config.path.clone())
    .http_only(cookie_config.http_only)
    .secure(cookie_config.secure)
    .same_site(SameSite::Lax)
    .build();

    // The CSRF cookie is deliberately readable by scripts: the client must
    // mirror it into the request header.
    let csrf_cookie = Cookie::build((csrf::CSRF_COOKIE, csrf::issue_token()))
        .path("/")
        .http_only(false)
        .secure(cookie_config.secure)
        .same_site(SameSite::Lax)
        .build();

    let jar = jar.add(session_cookie).add(csrf_cookie);

    let response = LoginResponse {
        user_id: outcome.account_id,
        username: outcome.username,
        role: outcome.role,
        session_token: outcome.session.token.to_string(),
        must_change_password: outcome.must_change_password,
        password_status: outcome.password_status,
        inspection: outcome.inspection,
    };

    Ok((jar, Json(response)))
}

async fn record_activity_handler<R>(
    State(state): State<AuthState<R>>,
    Json(payload): Json<ActivityRequest>,
) -> Result<impl IntoResponse>
where
    R: RepositoryProvider,
{
    let status = state.ngome.activity_status(&payload.user_id).await?;
    if status.session_expired {
        return Err(ApiError::SessionExpired);
    }

    let stamped = state.ngome.record_activity(&payload.user_id).await?;
    Ok(Json(ActivityResponse {
        last_activity: stamped,
        session_expired: false,
    }))
}

async fn activity_status_handler<R>(
    State(state): State<AuthState<R>>,
    Query(query): Query<ActivityQuery>,
) -> Result<impl IntoResponse>
where
    R: RepositoryProvider,
{
    let status = state.ngome.activity_status(&query.user_id).await?;
    Ok(Json(ActivityStatusResponse::from(status)))
}

async fn logout_handler<R>(
    State(state): State<AuthState<R>>,
    axum::Extension(cookie_config): axum::Extension<CookieConfig>,
    jar: CookieJar,
    Json(payload): Json<LogoutRequest>,
) -> Result<impl IntoResponse>
where
    R: RepositoryProvider,
{
    state
        .ngome
        .logout(
            &payload.user_id,
            &SessionToken::new(&payload.session_token),
            payload.logout_all,
        )
        .await?;

    let jar = jar
        .remove(Cookie::from(cookie_config.name.clone()))
        .remove(Cookie::from(csrf::CSRF_COOKIE));

    Ok((
        jar,
        Json(MessageResponse {
            message: "Successfully logged out".to_string(),
        }),
    ))
}

async fn list_sessions_handler<R>(
    State(state): State<AuthState<R>>,
    Query(query): Query<SessionsQuery>,
) -> Result<impl IntoResponse>
where
    R: RepositoryProvider,
{
    let sessions = state.ngome.list_sessions(&query.user_id).await?;
    Ok(Json(SessionsResponse {
        sessions,
        max_concurrent_sessions: state.ngome.session_limits().max_concurrent,
    }))
}

async fn force_logout_handler<R>(
    State(state): State<AuthState<R>>,
    Json(payload): Json<ForceLogoutRequest>,
) -> Result<impl IntoResponse>
where
    R: RepositoryProvider,
{
    let terminated = state
        .ngome
        .force_logout(&payload.session_id, &payload.user_id)
        .await?;
    Ok(Json(ForceLogoutResponse { terminated }))
}

async fn change_password_handler<R>(
    State(state): State<AuthState<R>>,
    axum::Extension(cookie_config): axum::Extension<CookieConfig>,
    jar: CookieJar,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse>
where
    R: RepositoryProvider,
{
    // Keep the session the request arrived on; all others end
    let current_token = jar
        .get(&cookie_config.name)
        .map(|c| SessionToken::new(c.value()));

    state
        .ngome
        .change_password(
            &payload.user_id,
            &payload.current_password,
            &payload.new_password,
            current_token.as_ref(),
        )
        .await?;

    Ok(Json(MessageResponse {
        message: "Password changed successfully".to_string(),
    }))
}

async fn password_strength_handler(
    Json(payload): Json<StrengthCheckRequest>,
) -> Result<impl IntoResponse> {
    let report = score_strength(&payload.password);
    Ok(Json(StrengthCheckResponse {
        score: report.score,
        strength: report.strength.as_str().to_string(),
        crack_time_display: report.crack_time_display,
        warning: report.feedback.warning,
        suggestions: report.feedback.suggestions,
    }))
}

async fn lockout_status_handler<R>(
    State(state): State<AuthState<R>>,
    Json(payload): Json<StatusRequest>,
) -> Result<impl IntoResponse>
where
    R: RepositoryProvider,
{
    let status = state.ngome.account_lockout_status(&payload.user_id).await?;
    Ok(Json(LockoutStatusResponse::from(status)))
}

async fn password_status_handler<R>(
    State(state): State<AuthState<R>>,
    Json(payload): Json<StatusRequest>,
) -> Result<impl IntoResponse>
where
    R: RepositoryProvider,
{
    let status = state.ngome.password_status(&payload.user_id).await?;
    Ok(Json(PasswordStatusResponse::from(status)))
}

async fn lock_account_handler<R>(
    State(state): State<AuthState<R>>,
    Json(payload): Json<LockAccountRequest>,
) -> Result<impl IntoResponse>
where
    R: RepositoryProvider,
{
    state
        .ngome
        .lock_account(
            &payload.user_id,
            &payload.admin_id,
            &payload.reason,
            payload.notes.as_deref(),
        )
        .await?;

    Ok(Json(MessageResponse {
        message: "Account locked".to_string(),
    }))
}

async fn unlock_account_handler<R>(
    State(state): State<AuthState<R>>,
    Json(payload): Json<UnlockAccountRequest>,
) -> Result<impl IntoResponse>
where
    R: RepositoryProvider,
{
    state
        .ngome
        .unlock_account(
            &payload.user_id,
            &payload.admin_id,
            &payload.verification_notes,
            payload.identity_verified,
        )
        .await?;

    Ok(Json(MessageResponse {
        message: "Account unlocked".to_string(),
    }))
}
