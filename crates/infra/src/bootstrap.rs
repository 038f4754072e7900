//! Startup provisioning.

use chrono::Utc;
use tracing::info;

use warden_auth::{StoreError, Tenant, TenantStore};
use warden_core::Slug;

/// Make sure the tenant signups are assigned to exists.
///
/// Idempotent, and safe when several instances start at once: losing the
/// insert race re-reads the winner's row.
pub async fn ensure_default_tenant(
    tenants: &dyn TenantStore,
    slug: &Slug,
    name: &str,
) -> Result<Tenant, StoreError> {
    if let Some(existing) = tenants.find_tenant_by_slug(slug).await? {
        return Ok(existing);
    }

    match tenants.save_tenant(Tenant::new(name, slug.clone(), Utc::now())).await {
        Ok(created) => {
            info!(tenant_id = %created.id, slug = %slug, "provisioned default tenant");
            Ok(created)
        }
        Err(StoreError::Conflict(_)) => tenants
            .find_tenant_by_slug(slug)
            .await?
            .ok_or_else(|| StoreError::Conflict(format!("tenant name '{name}' is taken by another slug"))),
        Err(e) => Err(e),
    }
}
