use serde::{Deserialize, Serialize};

use warden_auth::{AuthTokens, LoginInput, Role, Scope, SignupInput, scopes_for_role};

// -------------------------
// Request DTOs
// -------------------------

// Missing fields deserialize as empty strings so they are reported through
// field validation rather than as a body parse failure.

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub name: String,
}

impl From<SignupRequest> for SignupInput {
    fn from(req: SignupRequest) -> Self {
        SignupInput {
            email: req.email,
            password: req.password,
            name: req.name,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl From<LoginRequest> for LoginInput {
    fn from(req: LoginRequest) -> Self {
        LoginInput {
            email: req.email,
            password: req.password,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    #[serde(default, alias = "refreshToken")]
    pub refresh_token: String,
}

// -------------------------
// Response DTOs
// -------------------------

pub const TOKEN_TYPE: &str = "Bearer";

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Access token lifetime in milliseconds.
    pub expires_in: u64,
}

impl From<AuthTokens> for AuthResponse {
    fn from(tokens: AuthTokens) -> Self {
        AuthResponse {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            token_type: TOKEN_TYPE,
            expires_in: tokens.expires_in_ms,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RoleScopes {
    pub role: Role,
    pub scopes: &'static [Scope],
}

#[derive(Debug, Serialize)]
pub struct RolesResponse {
    pub roles: Vec<RoleScopes>,
}

impl RolesResponse {
    pub fn canonical() -> Self {
        RolesResponse {
            roles: Role::CANONICAL
                .into_iter()
                .map(|role| RoleScopes {
                    scopes: scopes_for_role(&role),
                    role,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ScopesResponse {
    pub subject: String,
    pub scopes: Vec<Scope>,
}
