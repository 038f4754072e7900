//! HS256 access-token encoding and classified decoding.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Deserialize;
use thiserror::Error;

use crate::claims::{WireClaims, validate_claims};
use crate::{AuthConfig, ClaimSet};

/// Tokens longer than this are rejected before any parsing work.
const MAX_TOKEN_LEN: usize = 8 * 1024;

const SUPPORTED_ALG: &str = "HS256";

/// Why a token string could not be turned into a [`ClaimSet`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,

    #[error("token has expired")]
    Expired,

    #[error("unsupported token algorithm '{0}'")]
    Unsupported(String),

    #[error("token signature does not match")]
    BadSignature,

    #[error("token is empty")]
    InvalidArgument,
}

impl TokenError {
    /// Stable label for logs and security monitoring.
    pub fn kind(&self) -> &'static str {
        match self {
            TokenError::Malformed => "malformed",
            TokenError::Expired => "expired",
            TokenError::Unsupported(_) => "unsupported",
            TokenError::BadSignature => "bad_signature",
            TokenError::InvalidArgument => "invalid_argument",
        }
    }
}

#[derive(Deserialize)]
struct RawHeader {
    alg: String,
}

/// Signs claim sets into compact JWTs and verifies them back.
///
/// Holds only the key material derived from the injected secret; it is
/// immutable after construction and safe to share across tasks.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(config: &AuthConfig) -> Self {
        Self::from_secret(&config.jwt_secret)
    }

    pub fn from_secret(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked by `validate_claims` against an explicit clock.
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn encode(&self, claims: &ClaimSet) -> Result<String, jsonwebtoken::errors::Error> {
        let wire = WireClaims::from(claims);
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &wire, &self.encoding)
    }

    pub fn decode(&self, token: &str) -> Result<ClaimSet, TokenError> {
        self.decode_at(token, Utc::now())
    }

    /// Verify `token` and check its expiry against `now`.
    pub fn decode_at(&self, token: &str, now: DateTime<Utc>) -> Result<ClaimSet, TokenError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(TokenError::InvalidArgument);
        }
        if token.len() > MAX_TOKEN_LEN {
            return Err(TokenError::Malformed);
        }
        inspect_header(token)?;

        let data = jsonwebtoken::decode::<WireClaims>(token, &self.decoding, &self.validation)
            .map_err(|e| classify(e.kind()))?;

        let claims = ClaimSet::try_from(data.claims)?;
        validate_claims(&claims, now)?;
        Ok(claims)
    }
}

impl core::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenCodec").finish_non_exhaustive()
    }
}

/// Check segment structure and algorithm before signature verification, so an
/// unknown `alg` (e.g. `none`) is reported as unsupported rather than malformed.
fn inspect_header(token: &str) -> Result<(), TokenError> {
    let mut segments = token.split('.');
    let (Some(header), Some(_), Some(_), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(TokenError::Malformed);
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(header)
        .map_err(|_| TokenError::Malformed)?;
    let header: RawHeader = serde_json::from_slice(&bytes).map_err(|_| TokenError::Malformed)?;

    if header.alg != SUPPORTED_ALG {
        return Err(TokenError::Unsupported(header.alg));
    }
    Ok(())
}

fn classify(kind: &ErrorKind) -> TokenError {
    match kind {
        ErrorKind::InvalidSignature => TokenError::BadSignature,
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::InvalidAlgorithm | ErrorKind::MissingAlgorithm => {
            TokenError::Unsupported(SUPPORTED_ALG.to_string())
        }
        _ => TokenError::Malformed,
    }
}
