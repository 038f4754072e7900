//! Authentication orchestration: signup, login, refresh and identity lookup.

use std::sync::Arc;

use chrono::Utc;

use warden_core::Slug;

use crate::error::Entity;
use crate::password::CredentialHasher;
use crate::refresh::RefreshTokenManager;
use crate::store::{AuthStores, bounded};
use crate::validation::{MAX_NAME_LEN, Validator};
use crate::{AuthConfig, AuthError, ClaimSet, Role, TokenCodec, User, UserProfile};

/// Input for the signup flow.
#[derive(Debug, Clone)]
pub struct SignupInput {
    pub email: String,
    pub password: String,
    pub name: String,
}

impl SignupInput {
    pub fn validate(&self, min_password_length: usize) -> Result<(), AuthError> {
        let mut v = Validator::new();
        v.email("email", &self.email);
        if v.not_blank("password", "Password", &self.password) {
            v.length("password", "Password", &self.password, min_password_length, usize::MAX);
        }
        if v.not_blank("name", "Name", &self.name) {
            v.length("name", "Name", &self.name, 1, MAX_NAME_LEN);
        }
        v.finish().map_err(AuthError::Validation)
    }
}

/// Input for the login flow.
#[derive(Debug, Clone)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

impl LoginInput {
    pub fn validate(&self) -> Result<(), AuthError> {
        let mut v = Validator::new();
        v.not_blank("email", "Email", &self.email);
        v.not_blank("password", "Password", &self.password);
        v.finish().map_err(AuthError::Validation)
    }
}

/// Token pair returned by every successful flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthTokens {
    /// Signed JWT access token.
    pub access_token: String,
    /// Opaque refresh token.
    pub refresh_token: String,
    /// Access token lifetime in milliseconds.
    pub expires_in_ms: u64,
}

/// Authentication service.
///
/// Holds no per-request state; every cross-request fact lives in the stores,
/// so one instance is shared by all concurrent callers.
#[derive(Clone)]
pub struct AuthService {
    stores: AuthStores,
    hasher: Arc<dyn CredentialHasher>,
    codec: TokenCodec,
    refresh: RefreshTokenManager,
    config: Arc<AuthConfig>,
}

impl AuthService {
    pub fn new(
        stores: AuthStores,
        hasher: Arc<dyn CredentialHasher>,
        config: Arc<AuthConfig>,
    ) -> Self {
        Self {
            codec: TokenCodec::new(&config),
            refresh: RefreshTokenManager::new(&stores, &config),
            stores,
            hasher,
            config,
        }
    }

    pub fn refresh_tokens(&self) -> &RefreshTokenManager {
        &self.refresh
    }

    /// Register a new user in the default tenant with `ROLE_USER` and issue tokens.
    ///
    /// The user row and its first refresh token are written in one store call,
    /// so a failed signup leaves nothing behind.
    pub async fn signup(&self, input: SignupInput) -> Result<AuthTokens, AuthError> {
        input.validate(self.config.min_password_length)?;
        let timeout = self.config.store_timeout;

        // 1. Email must be free.
        let taken = bounded(
            timeout,
            "exists_user_with_email",
            self.stores.users.exists_user_with_email(&input.email),
        )
        .await?;
        if taken {
            return Err(AuthError::Conflict);
        }

        // 2. Resolve the default tenant. Its absence is a provisioning bug.
        let slug = Slug::parse(self.config.default_tenant_slug.as_str())
            .map_err(|e| AuthError::internal(format!("default tenant slug: {e}")))?;
        let tenant = bounded(
            timeout,
            "find_tenant_by_slug",
            self.stores.tenants.find_tenant_by_slug(&slug),
        )
        .await?
        .ok_or_else(|| {
            tracing::error!(slug = %slug, "default tenant is not provisioned");
            AuthError::NotFound(Entity::Tenant)
        })?;

        // 3. Hash the password off the async workers.
        let password_hash = self.hash_password(input.password).await?;
        let now = Utc::now();
        let user = User::new(input.email, password_hash, input.name, tenant.id, [Role::USER], now);

        // 4. Sign before persisting; a signing failure must not leave a user behind.
        let access_token = self.encode_for(&user)?;

        // 5. User and refresh token as one unit.
        let refresh = self.refresh.mint(user.id, now);
        let (user, refresh) = bounded(
            timeout,
            "create_user_with_refresh_token",
            self.stores.users.create_user_with_refresh_token(user, refresh),
        )
        .await?;

        tracing::info!(target: "warden::auth", user_id = %user.id, tenant_id = %user.tenant_id, "signup");
        Ok(AuthTokens {
            access_token,
            refresh_token: refresh.token,
            expires_in_ms: self.config.access_token_ttl_ms,
        })
    }

    /// Authenticate with email + password and issue tokens.
    pub async fn login(&self, input: LoginInput) -> Result<AuthTokens, AuthError> {
        input.validate()?;

        // 1. Verify credentials. Every failure collapses to the same error.
        let email = match self.authenticate(&input.email, input.password).await {
            Ok(email) => email,
            Err(AuthError::Unauthorized) => {
                tracing::warn!(target: "warden::auth", outcome = "failure", reason = "bad_credentials", "login");
                return Err(AuthError::Unauthorized);
            }
            Err(e) => return Err(e),
        };

        // 2. Load the authenticated identity.
        let user = bounded(
            self.config.store_timeout,
            "find_user_by_email",
            self.stores.users.find_user_by_email(&email),
        )
        .await?
        .ok_or(AuthError::NotFound(Entity::User))?;

        // 3 + 4.
        let tokens = self.issue_tokens(&user).await?;
        tracing::info!(target: "warden::auth", outcome = "success", user_id = %user.id, "login");
        Ok(tokens)
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// Claims are re-derived from the current user record so role, scope and
    /// tenant changes made since the refresh token was issued take effect.
    /// The refresh token itself passes through unchanged.
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<AuthTokens, AuthError> {
        let (user, record) = self.refresh.exchange(refresh_token).await?;
        if !user.enabled {
            tracing::warn!(target: "warden::auth", user_id = %user.id, "refresh rejected for disabled user");
            return Err(AuthError::Unauthorized);
        }

        let access_token = self.encode_for(&user)?;
        Ok(AuthTokens {
            access_token,
            refresh_token: record.token,
            expires_in_ms: self.config.access_token_ttl_ms,
        })
    }

    /// Verify an access token string and return its claims.
    pub fn validate_access_token(&self, token: &str) -> Result<ClaimSet, AuthError> {
        self.codec.decode(token).map_err(|e| {
            tracing::warn!(target: "warden::auth", kind = e.kind(), "access token rejected");
            AuthError::InvalidToken(e)
        })
    }

    /// Load the user a validated token refers to.
    pub async fn current_identity(&self, claims: &ClaimSet) -> Result<UserProfile, AuthError> {
        let user = bounded(
            self.config.store_timeout,
            "find_user_by_email",
            self.stores.users.find_user_by_email(&claims.sub),
        )
        .await?
        .ok_or(AuthError::NotFound(Entity::User))?;
        Ok(user.profile())
    }

    /// Returns the authenticated email, or `Unauthorized` for unknown emails,
    /// disabled accounts and wrong passwords alike.
    async fn authenticate(&self, email: &str, password: String) -> Result<String, AuthError> {
        let user = bounded(
            self.config.store_timeout,
            "find_user_by_email",
            self.stores.users.find_user_by_email(email),
        )
        .await?
        .ok_or(AuthError::Unauthorized)?;

        if !user.enabled {
            return Err(AuthError::Unauthorized);
        }

        let hasher = self.hasher.clone();
        let hash = user.password_hash;
        let valid = tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| {
                AuthError::internal(format!("credential verification task failed: {e}"))
            })??;

        if valid { Ok(user.email) } else { Err(AuthError::Unauthorized) }
    }

    async fn hash_password(&self, raw: String) -> Result<String, AuthError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&raw))
            .await
            .map_err(|e| AuthError::internal(format!("password hashing task failed: {e}")))?
    }

    async fn issue_tokens(&self, user: &User) -> Result<AuthTokens, AuthError> {
        let access_token = self.encode_for(user)?;
        let refresh = self.refresh.issue(user).await?;
        Ok(AuthTokens {
            access_token,
            refresh_token: refresh.token,
            expires_in_ms: self.config.access_token_ttl_ms,
        })
    }

    fn encode_for(&self, user: &User) -> Result<String, AuthError> {
        let claims = ClaimSet::issue(
            user.email.as_str(),
            user.tenant_id,
            &user.roles,
            user.scopes(),
            Utc::now(),
            self.config.access_token_ttl(),
        );
        self.codec.encode(&claims).map_err(|e| {
            tracing::error!(error = %e, "failed to sign access token");
            AuthError::internal(format!("token signing failed: {e}"))
        })
    }
}
