//! Role/scope authorization decisions over decoded claims.
//!
//! - No IO
//! - No panics
//! - Knows nothing about endpoints, only about the declared [`Policy`]

use serde::Serialize;
use thiserror::Error;

use crate::{ClaimSet, Role, Scope};

/// Why a request was refused.
///
/// `NoToken` is an authentication problem (401 at the boundary); the other
/// two are authorization problems (403).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Denial {
    #[error("no authentication token provided")]
    NoToken,

    #[error("no scopes found in token")]
    NoScopes,

    #[error("insufficient permissions")]
    InsufficientPermissions,
}

/// What a policy is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    Role,
    Scope,
}

/// Authorization requirement attached to a protected operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Policy {
    pub kind: PolicyKind,
    pub required: Vec<String>,
    /// `false`: any one match suffices. `true`: every entry must be held.
    pub require_all: bool,
}

impl Policy {
    pub fn role<I, R>(required: I, require_all: bool) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<Role>,
    {
        Self {
            kind: PolicyKind::Role,
            required: required
                .into_iter()
                .map(|r| String::from(Into::<Role>::into(r)))
                .collect(),
            require_all,
        }
    }

    pub fn scope<I, S>(required: I, require_all: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Scope>,
    {
        Self {
            kind: PolicyKind::Scope,
            required: required
                .into_iter()
                .map(|s| Into::<Scope>::into(s).as_str().to_string())
                .collect(),
            require_all,
        }
    }

    /// Evaluate against the caller's claims, if any token was presented.
    pub fn evaluate(&self, claims: Option<&ClaimSet>) -> Result<(), Denial> {
        match self.kind {
            PolicyKind::Role => {
                let required: Vec<Role> = self.required.iter().cloned().map(Role::from).collect();
                check_role(claims, &required, self.require_all)
            }
            PolicyKind::Scope => {
                let required: Vec<Scope> = self.required.iter().cloned().map(Scope::from).collect();
                check_scope(claims, &required, self.require_all)
            }
        }
    }
}

/// Allow when the caller's roles intersect `required` (or contain all of it).
///
/// A token without a roles claim holds no roles.
pub fn check_role(
    claims: Option<&ClaimSet>,
    required: &[Role],
    require_all: bool,
) -> Result<(), Denial> {
    let claims = claims.ok_or(Denial::NoToken)?;
    if matches(&claims.roles, required, require_all) {
        Ok(())
    } else {
        Err(Denial::InsufficientPermissions)
    }
}

/// Allow when the caller's scopes intersect `required` (or contain all of it).
///
/// A token without a scopes claim is refused with [`Denial::NoScopes`].
pub fn check_scope(
    claims: Option<&ClaimSet>,
    required: &[Scope],
    require_all: bool,
) -> Result<(), Denial> {
    let claims = claims.ok_or(Denial::NoToken)?;
    let held = claims.scopes.as_deref().ok_or(Denial::NoScopes)?;
    if matches(held, required, require_all) {
        Ok(())
    } else {
        Err(Denial::InsufficientPermissions)
    }
}

// An empty requirement is vacuously satisfied by `require_all` and never by "any".
fn matches<T: PartialEq>(held: &[T], required: &[T], require_all: bool) -> bool {
    if require_all {
        required.iter().all(|r| held.contains(r))
    } else {
        required.iter().any(|r| held.contains(r))
    }
}
