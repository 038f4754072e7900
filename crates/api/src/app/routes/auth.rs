//! Signup, login, token refresh and current-identity endpoints.

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    routing::{get, post},
};

use warden_auth::{AuthError, UserProfile, Validator};

use crate::app::AppState;
use crate::app::dto::{AuthResponse, LoginRequest, RefreshRequest, SignupRequest};
use crate::app::errors::ApiError;
use crate::context::Principal;
use crate::middleware;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route(
            "/me",
            get(me).route_layer(axum::middleware::from_fn_with_state(state, middleware::identify)),
        )
}

/// POST /api/auth/signup
pub async fn signup(
    State(state): State<AppState>,
    body: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let Json(req) = body?;
    let tokens = state.auth.signup(req.into()).await?;
    Ok((StatusCode::CREATED, Json(tokens.into())))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, ApiError> {
    let Json(req) = body?;
    let tokens = state.auth.login(req.into()).await?;
    Ok(Json(tokens.into()))
}

/// POST /api/auth/refresh
pub async fn refresh(
    State(state): State<AppState>,
    body: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, ApiError> {
    let Json(req) = body?;

    let mut v = Validator::new();
    v.not_blank("refresh_token", "Refresh token", &req.refresh_token);
    v.finish().map_err(AuthError::Validation)?;

    let tokens = state.auth.refresh_access_token(req.refresh_token.trim()).await?;
    Ok(Json(tokens.into()))
}

/// GET /api/auth/me
pub async fn me(State(state): State<AppState>, principal: Principal) -> Result<Json<UserProfile>, ApiError> {
    let profile = state.auth.current_identity(principal.claims()).await?;
    Ok(Json(profile))
}
