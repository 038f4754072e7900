//! In-memory store backend for tests and local development.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use warden_auth::{
    Entity, RefreshToken, RefreshTokenStore, StoreError, Tenant, TenantStore, User, UserStore,
};
use warden_core::{Slug, TenantId, UserId};

#[derive(Debug, Default)]
struct State {
    users: HashMap<UserId, User>,
    tenants: HashMap<TenantId, Tenant>,
    // keyed by the opaque token value
    refresh_tokens: HashMap<String, RefreshToken>,
}

/// Implements all three store capabilities over one lock.
///
/// Every write takes the single write lock, so compound operations such as
/// [`RefreshTokenStore::replace_refresh_tokens_for_user`] are atomic.
#[derive(Debug, Default)]
pub struct InMemoryAuthStore {
    inner: RwLock<State>,
}

impl InMemoryAuthStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::Backend("in-memory store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::Backend("in-memory store lock poisoned".into()))
    }

    /// Number of refresh tokens currently stored for `user_id`.
    pub fn refresh_token_count_for(&self, user_id: UserId) -> usize {
        self.read()
            .map(|s| s.refresh_tokens.values().filter(|t| t.user_id == user_id).count())
            .unwrap_or(0)
    }

    /// Remove a user and their refresh tokens. Returns whether the user existed.
    pub fn remove_user(&self, user_id: UserId) -> bool {
        match self.write() {
            Ok(mut s) => {
                s.refresh_tokens.retain(|_, t| t.user_id != user_id);
                s.users.remove(&user_id).is_some()
            }
            Err(_) => false,
        }
    }
}

#[async_trait::async_trait]
impl UserStore for InMemoryAuthStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.read()?.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    async fn exists_user_with_email(&self, email: &str) -> Result<bool, StoreError> {
        Ok(self.read()?.users.values().any(|u| u.email == email))
    }

    async fn save_user(&self, user: User) -> Result<User, StoreError> {
        let mut state = self.write()?;
        if state
            .users
            .values()
            .any(|u| u.email == user.email && u.id != user.id)
        {
            return Err(StoreError::Conflict(format!("email {} is already in use", user.email)));
        }
        if !state.tenants.contains_key(&user.tenant_id) {
            return Err(StoreError::NotFound(Entity::Tenant));
        }
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn create_user_with_refresh_token(
        &self,
        user: User,
        token: RefreshToken,
    ) -> Result<(User, RefreshToken), StoreError> {
        let mut state = self.write()?;
        // Every check runs before the first insert.
        if state.users.contains_key(&user.id) || state.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict(format!("email {} is already in use", user.email)));
        }
        if !state.tenants.contains_key(&user.tenant_id) {
            return Err(StoreError::NotFound(Entity::Tenant));
        }
        if token.user_id != user.id {
            return Err(StoreError::NotFound(Entity::User));
        }
        if state.refresh_tokens.contains_key(&token.token) {
            return Err(StoreError::Conflict("refresh token value collision".into()));
        }

        state.users.insert(user.id, user.clone());
        state.refresh_tokens.insert(token.token.clone(), token.clone());
        Ok((user, token))
    }
}

#[async_trait::async_trait]
impl TenantStore for InMemoryAuthStore {
    async fn find_tenant_by_slug(&self, slug: &Slug) -> Result<Option<Tenant>, StoreError> {
        Ok(self.read()?.tenants.values().find(|t| t.slug() == slug).cloned())
    }

    async fn save_tenant(&self, tenant: Tenant) -> Result<Tenant, StoreError> {
        let mut state = self.write()?;
        if let Some(other) = state
            .tenants
            .values()
            .find(|t| t.id != tenant.id && (t.slug() == tenant.slug() || t.name == tenant.name))
        {
            return Err(StoreError::Conflict(format!(
                "tenant {} / {} already exists",
                other.name,
                other.slug()
            )));
        }
        state.tenants.insert(tenant.id, tenant.clone());
        Ok(tenant)
    }
}

#[async_trait::async_trait]
impl RefreshTokenStore for InMemoryAuthStore {
    async fn find_refresh_token(&self, token: &str) -> Result<Option<RefreshToken>, StoreError> {
        Ok(self.read()?.refresh_tokens.get(token).cloned())
    }

    async fn save_refresh_token(&self, token: RefreshToken) -> Result<RefreshToken, StoreError> {
        let mut state = self.write()?;
        if state.refresh_tokens.contains_key(&token.token) {
            return Err(StoreError::Conflict("refresh token value collision".into()));
        }
        state.refresh_tokens.insert(token.token.clone(), token.clone());
        Ok(token)
    }

    async fn delete_refresh_tokens_for_user(&self, user_id: UserId) -> Result<u64, StoreError> {
        let mut state = self.write()?;
        let before = state.refresh_tokens.len();
        state.refresh_tokens.retain(|_, t| t.user_id != user_id);
        Ok((before - state.refresh_tokens.len()) as u64)
    }

    async fn delete_refresh_token(&self, token: &RefreshToken) -> Result<(), StoreError> {
        self.write()?.refresh_tokens.remove(&token.token);
        Ok(())
    }

    async fn replace_refresh_tokens_for_user(
        &self,
        token: RefreshToken,
    ) -> Result<(RefreshToken, u64), StoreError> {
        let mut state = self.write()?;
        let before = state.refresh_tokens.len();
        state.refresh_tokens.retain(|_, t| t.user_id != token.user_id);
        let superseded = (before - state.refresh_tokens.len()) as u64;
        state.refresh_tokens.insert(token.token.clone(), token.clone());
        Ok((token, superseded))
    }
}
