//! Authentication error taxonomy.

use thiserror::Error;

use crate::authorize::Denial;
use crate::store::StoreError;
use crate::token::TokenError;
use crate::validation::FieldError;

/// Entity kinds that can be reported as missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    User,
    Tenant,
    RefreshToken,
}

impl core::fmt::Display for Entity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Entity::User => "user",
            Entity::Tenant => "tenant",
            Entity::RefreshToken => "refresh token",
        })
    }
}

/// Typed outcome of every failed auth flow.
///
/// Messages are safe to show to callers; `Internal` details are for logs only
/// and the boundary replaces them with a fixed message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("email is already in use")]
    Conflict,

    /// Deliberately generic: never says whether the email exists.
    #[error("invalid email or password")]
    Unauthorized,

    #[error("{0} not found")]
    NotFound(Entity),

    #[error("refresh token was expired, please sign in again")]
    Expired,

    #[error(transparent)]
    InvalidToken(#[from] TokenError),

    #[error(transparent)]
    AccessDenied(#[from] Denial),

    #[error("validation failed")]
    Validation(Vec<FieldError>),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(_) => AuthError::Conflict,
            StoreError::Unavailable(msg) => AuthError::Unavailable(msg),
            StoreError::NotFound(entity) => AuthError::NotFound(entity),
            StoreError::Backend(msg) => AuthError::Internal(msg),
        }
    }
}
