//! Error-to-response mapping.
//!
//! Every failure leaves the API as the same envelope:
//! `{code, message, details?, timestamp, path, request_id}`.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::Serialize;

use warden_auth::{AuthError, Denial, Entity, FieldError, TokenError};

use crate::context::RequestMeta;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldError>>,
    pub timestamp: DateTime<Utc>,
    pub path: String,
    pub request_id: Option<String>,
}

/// Anything a handler or middleware can fail with.
#[derive(Debug)]
pub enum ApiError {
    Auth(AuthError),
    /// The body could not be read as the expected JSON document.
    MalformedBody(String),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Auth(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::MalformedBody(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::MalformedBody(msg) => {
                json_error(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg, None)
            }
            ApiError::Auth(err) => auth_error_to_response(err),
        }
    }
}

fn auth_error_to_response(err: AuthError) -> Response {
    match err {
        AuthError::Validation(fields) => json_error(
            StatusCode::BAD_REQUEST,
            "VALIDATION_ERROR",
            "Validation failed",
            Some(fields),
        ),
        AuthError::Conflict => json_error(StatusCode::CONFLICT, "CONFLICT", "Email is already in use", None),
        AuthError::Unauthorized => json_error(
            StatusCode::UNAUTHORIZED,
            "UNAUTHORIZED",
            "Invalid email or password",
            None,
        ),
        // An unknown refresh token is a credential failure, not a missing resource.
        AuthError::NotFound(Entity::RefreshToken) => json_error(
            StatusCode::UNAUTHORIZED,
            "UNAUTHORIZED",
            "Refresh token is not recognized",
            None,
        ),
        AuthError::NotFound(entity) => json_error(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{} not found", capitalize(&entity.to_string())),
            None,
        ),
        AuthError::Expired => json_error(
            StatusCode::UNAUTHORIZED,
            "UNAUTHORIZED",
            "Refresh token was expired. Please make a new sign in request",
            None,
        ),
        // Clients renew on TOKEN_EXPIRED and re-authenticate on UNAUTHORIZED.
        AuthError::InvalidToken(TokenError::Expired) => json_error(
            StatusCode::UNAUTHORIZED,
            "TOKEN_EXPIRED",
            "Access token has expired",
            None,
        ),
        AuthError::InvalidToken(_) => json_error(
            StatusCode::UNAUTHORIZED,
            "UNAUTHORIZED",
            "Invalid access token",
            None,
        ),
        AuthError::AccessDenied(Denial::NoToken) => json_error(
            StatusCode::UNAUTHORIZED,
            "UNAUTHORIZED",
            "No authentication token provided",
            None,
        ),
        AuthError::AccessDenied(Denial::NoScopes) => {
            json_error(StatusCode::FORBIDDEN, "FORBIDDEN", "No scopes found in token", None)
        }
        AuthError::AccessDenied(Denial::InsufficientPermissions) => {
            json_error(StatusCode::FORBIDDEN, "FORBIDDEN", "Insufficient permissions", None)
        }
        AuthError::Unavailable(detail) => {
            tracing::error!(%detail, "store unavailable");
            json_error(
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                "Service temporarily unavailable",
                None,
            )
        }
        AuthError::Internal(detail) => {
            tracing::error!(%detail, "internal error");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An unexpected error occurred",
                None,
            )
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
    details: Option<Vec<FieldError>>,
) -> Response {
    let meta = RequestMeta::current();
    let body = ErrorResponse {
        code,
        message: message.into(),
        details,
        timestamp: Utc::now(),
        path: meta.as_ref().map(|m| m.path.clone()).unwrap_or_default(),
        request_id: meta.map(|m| m.request_id),
    };
    (status, axum::Json(body)).into_response()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
