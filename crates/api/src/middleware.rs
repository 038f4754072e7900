use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use warden_auth::{AuthError, Policy};

use crate::app::AppState;
use crate::app::errors::ApiError;
use crate::context::{Principal, RequestMeta};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

const MAX_REQUEST_ID_LEN: usize = 128;

/// Assign a request id (honouring a sane inbound `x-request-id`) and expose
/// it, with the path, to error rendering further down the stack.
pub async fn request_context(req: Request, next: Next) -> Response {
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty() && v.len() <= MAX_REQUEST_ID_LEN)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::now_v7().to_string());

    let meta = RequestMeta {
        request_id: request_id.clone(),
        path: req.uri().path().to_string(),
    };

    let mut response = meta.scope(next.run(req)).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Decode the bearer token, if one is presented, and attach the [`Principal`].
///
/// A missing token is not an error here: guards and the `Principal`
/// extractor decide. A token that is present but invalid is rejected.
pub async fn identify(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(token) = extract_bearer(req.headers()) {
        let claims = state.auth.validate_access_token(token)?;
        req.extensions_mut().insert(Principal::new(claims));
    }
    Ok(next.run(req).await)
}

/// Evaluate a route's declared [`Policy`] against the caller.
pub async fn enforce_policy(
    State(policy): State<Arc<Policy>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = req.extensions().get::<Principal>().map(Principal::claims);
    if let Err(denial) = policy.evaluate(claims) {
        tracing::warn!(
            target: "warden::authz",
            path = %req.uri().path(),
            kind = ?policy.kind,
            required = ?policy.required,
            reason = %denial,
            "access denied"
        );
        return Err(AuthError::AccessDenied(denial).into());
    }
    Ok(next.run(req).await)
}

/// `Authorization: Bearer <token>`; anything else counts as no token.
fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?;
    let header = header.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}
