use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use warden_auth::{AuthError, ClaimSet, Denial};

use crate::app::errors::ApiError;

tokio::task_local! {
    static REQUEST_META: RequestMeta;
}

/// Per-request facts echoed in error bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestMeta {
    pub request_id: String,
    pub path: String,
}

impl RequestMeta {
    /// Run `fut` with `self` visible through [`RequestMeta::current`].
    pub async fn scope<F: Future>(self, fut: F) -> F::Output {
        REQUEST_META.scope(self, fut).await
    }

    /// The meta of the request being served, if called inside [`RequestMeta::scope`].
    pub fn current() -> Option<RequestMeta> {
        REQUEST_META.try_with(Clone::clone).ok()
    }
}

/// Authenticated caller (decoded, verified access-token claims).
///
/// Inserted by [`crate::middleware::identify`]; extracting it from a request
/// without a valid bearer token is rejected with 401.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    claims: ClaimSet,
}

impl Principal {
    pub fn new(claims: ClaimSet) -> Self {
        Self { claims }
    }

    pub fn claims(&self) -> &ClaimSet {
        &self.claims
    }

    pub fn subject(&self) -> &str {
        &self.claims.sub
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .ok_or_else(|| ApiError::from(AuthError::AccessDenied(Denial::NoToken)))
    }
}
