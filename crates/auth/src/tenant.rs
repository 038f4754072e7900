use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warden_core::{Slug, TenantId};

/// Identity-scoping unit. Every user belongs to exactly one tenant.
///
/// The slug is how tenants are resolved by name; once a user references the
/// tenant it must not change, so there is no setter for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    slug: Slug,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    pub fn new(name: impl Into<String>, slug: Slug, now: DateTime<Utc>) -> Self {
        Self {
            id: TenantId::new(),
            name: name.into(),
            slug,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rehydrate a tenant loaded from storage.
    pub fn from_parts(
        id: TenantId,
        name: String,
        slug: Slug,
        active: bool,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name,
            slug,
            active,
            created_at,
            updated_at,
        }
    }

    pub fn slug(&self) -> &Slug {
        &self.slug
    }
}
