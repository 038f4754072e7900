use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use warden_core::TenantId;

use crate::{Role, Scope, TokenError};

/// Decoded access-token payload (transport-agnostic).
///
/// A value: built fresh on issue and on decode, never mutated in place.
/// Timestamps carry whole seconds because that is all the wire format keeps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClaimSet {
    /// Subject (the user's email).
    pub sub: String,

    /// Owning tenant. Absent on tokens minted before tenant claims existed.
    pub tenant_id: Option<TenantId>,

    /// Roles held at issuance. Empty when the claim was absent.
    pub roles: Vec<Role>,

    /// Scopes derived at issuance. `None` when the claim was absent (legacy
    /// token), which is distinct from an empty list.
    pub scopes: Option<Vec<Scope>>,

    pub issued_at: DateTime<Utc>,

    pub expires_at: DateTime<Utc>,
}

impl ClaimSet {
    /// Build a fully enriched claim set expiring `ttl` after `issued_at`.
    ///
    /// Both instants are truncated to whole seconds; `exp` always lands at
    /// least one second after `iat`, so a sub-second `ttl` still yields a
    /// well-formed window.
    pub fn issue(
        sub: impl Into<String>,
        tenant_id: TenantId,
        roles: &BTreeSet<Role>,
        scopes: BTreeSet<Scope>,
        issued_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        let issued_at = whole_seconds(issued_at);
        let expires_at = whole_seconds(issued_at + ttl).max(issued_at + Duration::seconds(1));
        Self {
            sub: sub.into(),
            tenant_id: Some(tenant_id),
            roles: roles.iter().cloned().collect(),
            scopes: Some(scopes.into_iter().collect()),
            issued_at,
            expires_at,
        }
    }

    pub fn has_role(&self, role: &Role) -> bool {
        self.roles.contains(role)
    }
}

fn whole_seconds(at: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(at.timestamp(), 0).unwrap_or(at)
}

/// On-the-wire JWT payload.
///
/// Optional claims are skipped when absent so legacy and enriched tokens
/// share one shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct WireClaims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
    pub iat: i64,
    pub exp: i64,
}

impl From<&ClaimSet> for WireClaims {
    fn from(claims: &ClaimSet) -> Self {
        Self {
            sub: claims.sub.clone(),
            tenant_id: claims.tenant_id.map(|t| t.to_string()),
            roles: Some(claims.roles.iter().map(|r| r.as_str().to_string()).collect()),
            scopes: claims
                .scopes
                .as_ref()
                .map(|s| s.iter().map(|s| s.as_str().to_string()).collect()),
            iat: claims.issued_at.timestamp(),
            exp: claims.expires_at.timestamp(),
        }
    }
}

impl TryFrom<WireClaims> for ClaimSet {
    type Error = TokenError;

    fn try_from(wire: WireClaims) -> Result<Self, Self::Error> {
        let tenant_id = wire
            .tenant_id
            .map(|raw| raw.parse::<TenantId>())
            .transpose()
            .map_err(|_| TokenError::Malformed)?;

        Ok(Self {
            sub: wire.sub,
            tenant_id,
            roles: wire.roles.unwrap_or_default().into_iter().map(Role::from).collect(),
            scopes: wire
                .scopes
                .map(|s| s.into_iter().map(Scope::from).collect()),
            issued_at: DateTime::from_timestamp(wire.iat, 0).ok_or(TokenError::Malformed)?,
            expires_at: DateTime::from_timestamp(wire.exp, 0).ok_or(TokenError::Malformed)?,
        })
    }
}

/// Deterministically validate the time window of a claim set.
///
/// Signature verification happens before this; only timestamps are checked.
pub fn validate_claims(claims: &ClaimSet, now: DateTime<Utc>) -> Result<(), TokenError> {
    if claims.expires_at <= claims.issued_at {
        return Err(TokenError::Malformed);
    }
    if now >= claims.expires_at {
        return Err(TokenError::Expired);
    }
    Ok(())
}
