//! Abstract persistence contract consumed by the auth engine.
//!
//! Implementations live in `warden-infra`; this crate never names a storage
//! technology.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use warden_core::{Slug, UserId};

use crate::error::Entity;
use crate::{RefreshToken, Tenant, User};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(Entity),

    /// A uniqueness constraint was violated (e.g. duplicate email).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The backend could not be reached in time.
    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("backend error: {0}")]
    Backend(String),
}

#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
    /// Exact match on the stored email.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError>;

    async fn exists_user_with_email(&self, email: &str) -> Result<bool, StoreError>;

    /// Insert or update. Fails with `Conflict` when another user owns the email.
    async fn save_user(&self, user: User) -> Result<User, StoreError>;

    /// Insert a new user together with their first refresh token.
    ///
    /// Both rows persist or neither does. Fails with `Conflict` when the email
    /// or the token value is taken.
    async fn create_user_with_refresh_token(
        &self,
        user: User,
        token: RefreshToken,
    ) -> Result<(User, RefreshToken), StoreError>;
}

#[async_trait::async_trait]
pub trait TenantStore: Send + Sync {
    async fn find_tenant_by_slug(&self, slug: &Slug) -> Result<Option<Tenant>, StoreError>;

    /// Fails with `Conflict` when the name or slug is taken.
    async fn save_tenant(&self, tenant: Tenant) -> Result<Tenant, StoreError>;
}

#[async_trait::async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn find_refresh_token(&self, token: &str) -> Result<Option<RefreshToken>, StoreError>;

    async fn save_refresh_token(&self, token: RefreshToken) -> Result<RefreshToken, StoreError>;

    /// Returns how many tokens were removed.
    async fn delete_refresh_tokens_for_user(&self, user_id: UserId) -> Result<u64, StoreError>;

    async fn delete_refresh_token(&self, token: &RefreshToken) -> Result<(), StoreError>;

    /// Delete every token owned by `token.user_id` and insert `token`, as one
    /// atomic unit serialized per user.
    ///
    /// Concurrent calls for the same user must leave exactly one token behind.
    /// Returns the stored token and the number of tokens it superseded.
    async fn replace_refresh_tokens_for_user(
        &self,
        token: RefreshToken,
    ) -> Result<(RefreshToken, u64), StoreError>;
}

/// The three store capabilities the engine depends on.
#[derive(Clone)]
pub struct AuthStores {
    pub users: Arc<dyn UserStore>,
    pub tenants: Arc<dyn TenantStore>,
    pub refresh_tokens: Arc<dyn RefreshTokenStore>,
}

impl AuthStores {
    /// Use one backend for all three capabilities.
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: UserStore + TenantStore + RefreshTokenStore + 'static,
    {
        Self {
            users: store.clone(),
            tenants: store.clone(),
            refresh_tokens: store,
        }
    }
}

/// Run a store call with an upper time bound; elapsed becomes `Unavailable`.
pub(crate) async fn bounded<T, F>(
    limit: Duration,
    operation: &'static str,
    fut: F,
) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(operation, timeout_ms = limit.as_millis() as u64, "store call timed out");
            Err(StoreError::Unavailable(format!(
                "{operation} timed out after {}ms",
                limit.as_millis()
            )))
        }
    }
}
