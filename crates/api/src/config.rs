//! Process configuration read from the environment.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, bail};

use warden_auth::AuthConfig;

pub const JWT_SECRET_VAR: &str = "WARDEN_JWT_SECRET";
pub const ACCESS_TOKEN_TTL_VAR: &str = "WARDEN_ACCESS_TOKEN_TTL_MS";
pub const REFRESH_TOKEN_TTL_VAR: &str = "WARDEN_REFRESH_TOKEN_TTL_MS";
pub const DEFAULT_TENANT_VAR: &str = "WARDEN_DEFAULT_TENANT_SLUG";
pub const STORE_TIMEOUT_VAR: &str = "WARDEN_STORE_TIMEOUT_MS";
pub const BIND_ADDR_VAR: &str = "WARDEN_BIND_ADDR";
pub const DATABASE_URL_VAR: &str = "DATABASE_URL";
pub const CORS_ORIGINS_VAR: &str = "WARDEN_CORS_ORIGINS";

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub auth: AuthConfig,
    pub bind_addr: SocketAddr,
    /// `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub cors_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let Some(secret) = get(JWT_SECRET_VAR) else {
            bail!("{JWT_SECRET_VAR} must be set");
        };

        let mut auth = AuthConfig::with_secret(secret.into_bytes());
        if let Some(v) = get(ACCESS_TOKEN_TTL_VAR) {
            auth.access_token_ttl_ms = parse_millis(ACCESS_TOKEN_TTL_VAR, &v)?;
        }
        if let Some(v) = get(REFRESH_TOKEN_TTL_VAR) {
            auth.refresh_token_ttl_ms = parse_millis(REFRESH_TOKEN_TTL_VAR, &v)?;
        }
        if let Some(v) = get(DEFAULT_TENANT_VAR) {
            auth.default_tenant_slug = v.trim().to_string();
        }
        if let Some(v) = get(STORE_TIMEOUT_VAR) {
            auth.store_timeout = Duration::from_millis(parse_millis(STORE_TIMEOUT_VAR, &v)?);
        }
        auth.validate().context("invalid auth configuration")?;

        let bind_addr = get(BIND_ADDR_VAR)
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .with_context(|| format!("{BIND_ADDR_VAR} is not a socket address"))?;

        let cors_origins = get(CORS_ORIGINS_VAR)
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            auth,
            bind_addr,
            database_url: get(DATABASE_URL_VAR),
            cors_origins,
        })
    }
}

fn parse_millis(key: &str, value: &str) -> anyhow::Result<u64> {
    value
        .trim()
        .parse::<u64>()
        .with_context(|| format!("{key} must be a whole number of milliseconds, got '{value}'"))
}
