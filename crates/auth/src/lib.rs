//! `warden-auth` - token issuance, claims, refresh tokens and authorization.
//!
//! This crate is intentionally decoupled from HTTP and storage: persistence is
//! reached through the traits in [`store`], and the HTTP layer lives in
//! `warden-api`.

pub mod authorize;
pub mod claims;
pub mod config;
pub mod error;
pub mod password;
pub mod refresh;
pub mod roles;
pub mod scopes;
pub mod service;
pub mod store;
pub mod tenant;
pub mod token;
pub mod user;
pub mod validation;

pub use authorize::{Denial, Policy, PolicyKind, check_role, check_scope};
pub use claims::{ClaimSet, validate_claims};
pub use config::{AuthConfig, ConfigError};
pub use error::{AuthError, Entity};
pub use password::{Argon2Hasher, CredentialHasher};
pub use refresh::{RefreshToken, RefreshTokenManager};
pub use roles::Role;
pub use scopes::{Scope, derive_scopes, scopes_for_role};
pub use service::{AuthService, AuthTokens, LoginInput, SignupInput};
pub use store::{AuthStores, RefreshTokenStore, StoreError, TenantStore, UserStore};
pub use tenant::Tenant;
pub use token::{TokenCodec, TokenError};
pub use user::{User, UserProfile};
pub use validation::{FieldError, Validator};
