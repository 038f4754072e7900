use axum::{Router, routing::get};

use crate::app::AppState;

pub mod admin;
pub mod auth;
pub mod system;

/// Router for every endpoint; guards are attached per route.
pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/health", get(system::health))
        .nest("/api/auth", auth::router(state.clone()))
        .nest("/api/admin", admin::router(state))
}
