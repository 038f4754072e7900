//! Service wiring: store backend selection, provisioning and the auth service.

use std::sync::Arc;

use anyhow::Context;

use warden_auth::{
    Argon2Hasher, AuthConfig, AuthService, AuthStores, CredentialHasher, RefreshTokenStore,
    TenantStore, UserStore,
};
use warden_core::Slug;
use warden_infra::{InMemoryAuthStore, PostgresAuthStore, ensure_default_tenant};

use crate::app::AppState;
use crate::config::AppConfig;

const DEFAULT_TENANT_NAME: &str = "Default";

/// Build the application state from configuration.
///
/// Uses Postgres when `DATABASE_URL` is set (migrating the schema first),
/// otherwise an in-memory store.
pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppState> {
    let auth_config = Arc::new(config.auth.clone());
    let hasher: Arc<dyn CredentialHasher> = Arc::new(Argon2Hasher::default());

    match &config.database_url {
        Some(url) => {
            let store = PostgresAuthStore::connect(url)
                .await
                .context("failed to connect to the database")?;
            store.migrate().await.context("failed to apply the schema")?;
            tracing::info!("using postgres store");
            wire(Arc::new(store), auth_config, hasher).await
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using the in-memory store");
            let (state, _) = in_memory(auth_config, hasher).await?;
            Ok(state)
        }
    }
}

/// In-memory wiring. The store handle is returned for inspection in tests.
pub async fn in_memory(
    config: Arc<AuthConfig>,
    hasher: Arc<dyn CredentialHasher>,
) -> anyhow::Result<(AppState, Arc<InMemoryAuthStore>)> {
    let store = Arc::new(InMemoryAuthStore::new());
    let state = wire(store.clone(), config, hasher).await?;
    Ok((state, store))
}

async fn wire<S>(
    store: Arc<S>,
    config: Arc<AuthConfig>,
    hasher: Arc<dyn CredentialHasher>,
) -> anyhow::Result<AppState>
where
    S: UserStore + TenantStore + RefreshTokenStore + 'static,
{
    let slug = Slug::parse(config.default_tenant_slug.as_str())
        .context("invalid default tenant slug")?;
    ensure_default_tenant(store.as_ref(), &slug, DEFAULT_TENANT_NAME)
        .await
        .context("failed to provision the default tenant")?;

    let auth = AuthService::new(AuthStores::shared(store), hasher, config);
    Ok(AppState::new(auth))
}
