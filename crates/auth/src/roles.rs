use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Role label assigned to a user.
///
/// Roles are an open set of opaque strings. Only [`Role::ADMIN`], [`Role::AGENT`]
/// and [`Role::USER`] carry scopes; anything else is stored and carried in
/// tokens but grants nothing through scope derivation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub const ADMIN: Role = Role(Cow::Borrowed("ROLE_ADMIN"));
    pub const AGENT: Role = Role(Cow::Borrowed("ROLE_AGENT"));
    pub const USER: Role = Role(Cow::Borrowed("ROLE_USER"));

    /// Roles with a scope mapping, in descending privilege order.
    pub const CANONICAL: [Role; 3] = [Self::ADMIN, Self::AGENT, Self::USER];

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        Self(Cow::Owned(value))
    }
}

impl From<&'static str> for Role {
    fn from(value: &'static str) -> Self {
        Self(Cow::Borrowed(value))
    }
}

impl From<Role> for String {
    fn from(value: Role) -> Self {
        value.0.into_owned()
    }
}
