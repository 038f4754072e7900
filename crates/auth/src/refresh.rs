//! Opaque refresh tokens and the single-active-token-per-user policy.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use warden_core::{RefreshTokenId, UserId};

use crate::error::Entity;
use crate::store::{AuthStores, RefreshTokenStore, UserStore, bounded};
use crate::{AuthConfig, AuthError, User};

/// A persisted refresh token.
///
/// `token` is the opaque value handed to the client; `id` is the record key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshToken {
    pub id: RefreshTokenId,
    pub token: String,
    pub user_id: UserId,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl RefreshToken {
    /// Mint a fresh random token for `user_id` valid for `ttl` from `now`.
    pub fn generate(user_id: UserId, ttl: Duration, now: DateTime<Utc>) -> Self {
        Self {
            id: RefreshTokenId::new(),
            token: generate_token_value(),
            user_id,
            expires_at: now + ttl,
            created_at: now,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// 32 random bytes, base64url-encoded without padding (43 characters).
pub fn generate_token_value() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rand::Rng::random(&mut rng);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Issues and exchanges refresh tokens.
///
/// Issuing supersedes every earlier token of the same user, so logging in
/// anywhere revokes refresh capability everywhere else.
#[derive(Clone)]
pub struct RefreshTokenManager {
    tokens: Arc<dyn RefreshTokenStore>,
    users: Arc<dyn UserStore>,
    ttl: Duration,
    store_timeout: StdDuration,
}

impl RefreshTokenManager {
    pub fn new(stores: &AuthStores, config: &AuthConfig) -> Self {
        Self {
            tokens: stores.refresh_tokens.clone(),
            users: stores.users.clone(),
            ttl: config.refresh_token_ttl(),
            store_timeout: config.store_timeout,
        }
    }

    pub async fn issue(&self, user: &User) -> Result<RefreshToken, AuthError> {
        self.issue_at(user, Utc::now()).await
    }

    /// Mint an unsaved token for `user_id` with the configured lifetime.
    pub fn mint(&self, user_id: UserId, now: DateTime<Utc>) -> RefreshToken {
        RefreshToken::generate(user_id, self.ttl, now)
    }

    pub async fn issue_at(
        &self,
        user: &User,
        now: DateTime<Utc>,
    ) -> Result<RefreshToken, AuthError> {
        let candidate = self.mint(user.id, now);

        let (stored, superseded) = bounded(
            self.store_timeout,
            "replace_refresh_tokens_for_user",
            self.tokens.replace_refresh_tokens_for_user(candidate),
        )
        .await?;

        tracing::debug!(user_id = %user.id, superseded, "issued refresh token");
        Ok(stored)
    }

    /// Resolve a refresh token to its owner. The token itself is not rotated.
    pub async fn exchange(&self, token: &str) -> Result<(User, RefreshToken), AuthError> {
        self.exchange_at(token, Utc::now()).await
    }

    pub async fn exchange_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<(User, RefreshToken), AuthError> {
        let record = bounded(
            self.store_timeout,
            "find_refresh_token",
            self.tokens.find_refresh_token(token),
        )
        .await?
        .ok_or(AuthError::NotFound(Entity::RefreshToken))?;

        if record.is_expired(now) {
            if let Err(e) = bounded(
                self.store_timeout,
                "delete_refresh_token",
                self.tokens.delete_refresh_token(&record),
            )
            .await
            {
                tracing::warn!(user_id = %record.user_id, error = %e, "failed to delete expired refresh token");
            }
            return Err(AuthError::Expired);
        }

        let user = bounded(
            self.store_timeout,
            "find_user_by_id",
            self.users.find_user_by_id(record.user_id),
        )
        .await?
        .ok_or(AuthError::NotFound(Entity::User))?;

        Ok((user, record))
    }
}
