//! Authentication configuration.

use std::time::Duration;

use thiserror::Error;

/// Shortest accepted HMAC secret (256 bits).
pub const MIN_SECRET_BYTES: usize = 32;

/// Shortest accepted access token lifetime; token timestamps have
/// one-second resolution.
pub const MIN_ACCESS_TOKEN_TTL_MS: u64 = 1_000;

/// Configuration for the authentication engine.
///
/// Built once at process start and shared read-only (usually behind an `Arc`).
#[derive(Clone)]
pub struct AuthConfig {
    /// Shared HMAC-SHA256 secret used to sign and verify access tokens.
    pub jwt_secret: Vec<u8>,
    /// Access token lifetime in milliseconds (default: 86_400_000 = 24 hours).
    pub access_token_ttl_ms: u64,
    /// Refresh token lifetime in milliseconds (default: 604_800_000 = 7 days).
    pub refresh_token_ttl_ms: u64,
    /// Slug of the tenant every signup is assigned to.
    pub default_tenant_slug: String,
    /// Upper bound for a single store call before it is reported as unavailable.
    pub store_timeout: Duration,
    /// Minimum password length accepted at signup.
    pub min_password_length: usize,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: Vec::new(),
            access_token_ttl_ms: 86_400_000,
            refresh_token_ttl_ms: 604_800_000,
            default_tenant_slug: "default".into(),
            store_timeout: Duration::from_millis(5_000),
            min_password_length: 8,
        }
    }
}

impl AuthConfig {
    pub fn with_secret(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            jwt_secret: secret.into(),
            ..Default::default()
        }
    }

    /// Reject configurations that would weaken token security or break issuance.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.len() < MIN_SECRET_BYTES {
            return Err(ConfigError::WeakSecret {
                actual: self.jwt_secret.len(),
            });
        }
        if self.access_token_ttl_ms < MIN_ACCESS_TOKEN_TTL_MS {
            return Err(ConfigError::AccessTtlTooShort {
                actual_ms: self.access_token_ttl_ms,
            });
        }
        if self.refresh_token_ttl_ms == 0 {
            return Err(ConfigError::InvalidTtl("refresh_token_ttl_ms"));
        }
        if self.default_tenant_slug.trim().is_empty() {
            return Err(ConfigError::MissingDefaultTenant);
        }
        Ok(())
    }

    pub fn access_token_ttl(&self) -> chrono::Duration {
        millis(self.access_token_ttl_ms)
    }

    pub fn refresh_token_ttl(&self) -> chrono::Duration {
        millis(self.refresh_token_ttl_ms)
    }
}

fn millis(ms: u64) -> chrono::Duration {
    chrono::Duration::milliseconds(i64::try_from(ms).unwrap_or(i64::MAX))
}

impl core::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("access_token_ttl_ms", &self.access_token_ttl_ms)
            .field("refresh_token_ttl_ms", &self.refresh_token_ttl_ms)
            .field("default_tenant_slug", &self.default_tenant_slug)
            .field("store_timeout", &self.store_timeout)
            .field("min_password_length", &self.min_password_length)
            .finish()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("signing secret is {actual} bytes; at least {MIN_SECRET_BYTES} are required")]
    WeakSecret { actual: usize },

    #[error("{0} must be greater than zero")]
    InvalidTtl(&'static str),

    #[error("access_token_ttl_ms is {actual_ms}; at least {MIN_ACCESS_TOKEN_TTL_MS} is required")]
    AccessTtlTooShort { actual_ms: u64 },

    #[error("default tenant slug must not be empty")]
    MissingDefaultTenant,
}
