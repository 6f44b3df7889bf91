use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use ngome_core::{Error as CoreError, error::AuthError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Session expired")]
    SessionExpired,

    #[error("Request validation failed")]
    CsrfRejected,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Core(e) => core_error_response(e),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Unauthorized" })),
            )
                .into_response(),
            ApiError::SessionExpired => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Session expired", "sessionExpired": true })),
            )
                .into_response(),
            // Deliberately generic: do not reveal which token was missing
            ApiError::CsrfRejected => (
                StatusCode::FORBIDDEN,
                Json(json!({ "error": "Request validation failed" })),
            )
                .into_response(),
        }
    }
}

fn core_error_response(error: CoreError) -> Response {
    match &error {
        CoreError::Auth(auth) => auth_error_response(auth),
        CoreError::Authorization(e) => (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
        CoreError::Validation(e) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
        CoreError::NotFound(e) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
        CoreError::Conflict(e) => (
            StatusCode::CONFLICT,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
        CoreError::Session(e) => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
        // Infrastructure detail stays out of responses
        CoreError::Storage(_) | CoreError::Crypto(_) => {
            tracing::error!(error = %error, "Internal error serving request");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal server error" })),
            )
                .into_response()
        }
    }
}

fn auth_error_response(error: &AuthError) -> Response {
    match error {
        AuthError::InvalidCredentials => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Invalid credentials" })),
        )
            .into_response(),
        AuthError::AccountLocked {
            reason,
            remaining_seconds,
        } => (
            StatusCode::LOCKED,
            Json(json!({
                "error": reason,
                "locked": true,
                "retryAfterSeconds": remaining_seconds,
            })),
        )
            .into_response(),
        AuthError::TemporaryPasswordExpired => (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "error": "Temporary password has expired. Contact an administrator for a new one.",
                "temporaryPasswordExpired": true,
            })),
        )
            .into_response(),
        AuthError::PasswordExpired => (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "error": "Password has expired and the grace period has ended. It must be reset.",
                "passwordExpired": true,
            })),
        )
            .into_response(),
        AuthError::PasswordChangeLocked { remaining_seconds } => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "error": "Too many failed attempts. Try again later.",
                "retryAfterSeconds": remaining_seconds,
            })),
        )
            .into_response(),
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
