//! User identity record.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warden_core::{TenantId, UserId};

use crate::{Role, Scope, derive_scopes};

/// A user identity.
///
/// # Invariants
/// - A user belongs to exactly one tenant.
/// - Roles form a set: unordered, duplicates collapsed. It may be empty.
/// - `password_hash` is an opaque one-way hash; it is never compared in plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub tenant_id: TenantId,
    pub roles: BTreeSet<Role>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        email: impl Into<String>,
        password_hash: impl Into<String>,
        name: impl Into<String>,
        tenant_id: TenantId,
        roles: impl IntoIterator<Item = Role>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: UserId::new(),
            email: email.into(),
            password_hash: password_hash.into(),
            name: name.into(),
            tenant_id,
            roles: roles.into_iter().collect(),
            enabled: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Scopes this user's current roles grant.
    pub fn scopes(&self) -> BTreeSet<Scope> {
        derive_scopes(&self.roles)
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            email: self.email.clone(),
            name: self.name.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            enabled: self.enabled,
        }
    }
}

/// Read-only projection of a user returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub enabled: bool,
}
