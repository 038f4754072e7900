//! Scope labels and the fixed role → scope policy.

use std::borrow::Cow;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::Role;

/// Fine-grained permission label (e.g. `tickets:read:own`).
///
/// Scopes are never stored; they are recomputed from the role set every time
/// a token is issued.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scope(Cow<'static, str>);

impl Scope {
    pub const TICKETS_READ_ANY: Scope = Scope::from_static("tickets:read:any");
    pub const TICKETS_WRITE_ANY: Scope = Scope::from_static("tickets:write:any");
    pub const TICKETS_DELETE_ANY: Scope = Scope::from_static("tickets:delete:any");
    pub const USERS_READ_ANY: Scope = Scope::from_static("users:read:any");
    pub const USERS_WRITE_ANY: Scope = Scope::from_static("users:write:any");
    pub const TICKETS_READ_ASSIGNED: Scope = Scope::from_static("tickets:read:assigned");
    pub const TICKETS_WRITE_ASSIGNED: Scope = Scope::from_static("tickets:write:assigned");
    pub const TICKETS_READ_OWN: Scope = Scope::from_static("tickets:read:own");
    pub const TICKETS_WRITE_OWN: Scope = Scope::from_static("tickets:write:own");

    const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Scope {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Scope {
    fn from(value: String) -> Self {
        Self(Cow::Owned(value))
    }
}

impl From<&'static str> for Scope {
    fn from(value: &'static str) -> Self {
        Self(Cow::Borrowed(value))
    }
}

const ADMIN_SCOPES: &[Scope] = &[
    Scope::TICKETS_READ_ANY,
    Scope::TICKETS_WRITE_ANY,
    Scope::TICKETS_DELETE_ANY,
    Scope::USERS_READ_ANY,
    Scope::USERS_WRITE_ANY,
];

const AGENT_SCOPES: &[Scope] = &[
    Scope::TICKETS_READ_ASSIGNED,
    Scope::TICKETS_WRITE_ASSIGNED,
    Scope::TICKETS_READ_ANY,
];

const USER_SCOPES: &[Scope] = &[Scope::TICKETS_READ_OWN, Scope::TICKETS_WRITE_OWN];

/// Scopes granted by a single role. Unrecognized roles grant nothing.
pub fn scopes_for_role(role: &Role) -> &'static [Scope] {
    match role.as_str() {
        "ROLE_ADMIN" => ADMIN_SCOPES,
        "ROLE_AGENT" => AGENT_SCOPES,
        "ROLE_USER" => USER_SCOPES,
        _ => &[],
    }
}

/// Derive the de-duplicated union of scopes granted by `roles`.
///
/// Pure and total: the result depends only on the set of roles, never on
/// their order or multiplicity.
pub fn derive_scopes<'a, I>(roles: I) -> BTreeSet<Scope>
where
    I: IntoIterator<Item = &'a Role>,
{
    roles
        .into_iter()
        .flat_map(|role| scopes_for_role(role).iter().cloned())
        .collect()
}
