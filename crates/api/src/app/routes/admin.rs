//! Role and scope introspection, guarded by declared policies.

use std::sync::Arc;

use axum::{Json, Router, middleware::from_fn_with_state, routing::get};

use warden_auth::{Policy, Role, Scope};

use crate::app::AppState;
use crate::app::dto::{RolesResponse, ScopesResponse};
use crate::context::Principal;
use crate::middleware;

pub fn router(state: AppState) -> Router<AppState> {
    let admins_only = Arc::new(Policy::role([Role::ADMIN], false));
    let user_readers = Arc::new(Policy::scope([Scope::USERS_READ_ANY], false));

    Router::new()
        .route(
            "/roles",
            get(list_roles).route_layer(from_fn_with_state(admins_only, middleware::enforce_policy)),
        )
        .route(
            "/scopes",
            get(caller_scopes).route_layer(from_fn_with_state(user_readers, middleware::enforce_policy)),
        )
        .route_layer(from_fn_with_state(state, middleware::identify))
}

/// GET /api/admin/roles - canonical roles and the scopes each grants
pub async fn list_roles() -> Json<RolesResponse> {
    Json(RolesResponse::canonical())
}

/// GET /api/admin/scopes - scopes carried by the caller's token
pub async fn caller_scopes(principal: Principal) -> Json<ScopesResponse> {
    Json(ScopesResponse {
        subject: principal.subject().to_string(),
        scopes: principal.claims().scopes.clone().unwrap_or_default(),
    })
}
