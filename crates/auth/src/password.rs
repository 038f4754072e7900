//! One-way password hashing (Argon2id).

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};

use crate::AuthError;

/// Injected one-way credential capability.
///
/// Both operations are CPU-bound; the orchestrator runs them on the blocking
/// pool so they never stall unrelated requests.
pub trait CredentialHasher: Send + Sync {
    fn hash(&self, raw: &str) -> Result<String, AuthError>;

    /// `Ok(false)` on mismatch; `Err` only if the stored hash is unusable.
    fn verify(&self, raw: &str, hash: &str) -> Result<bool, AuthError>;
}

/// Argon2id hasher producing PHC-format strings.
///
/// If a pepper is configured it is prepended to the password before hashing
/// and verification.
#[derive(Clone)]
pub struct Argon2Hasher {
    params: Params,
    pepper: Option<String>,
}

impl Argon2Hasher {
    pub fn new(pepper: Option<String>) -> Self {
        Self {
            params: Params::default(),
            pepper,
        }
    }

    /// Cheap parameters for tests and local development.
    pub fn fast() -> Self {
        let params = Params::new(1024, 1, 1, None).unwrap_or_default();
        Self {
            params,
            pepper: None,
        }
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    fn peppered(&self, raw: &str) -> String {
        match &self.pepper {
            Some(p) => format!("{p}{raw}"),
            None => raw.to_string(),
        }
    }
}

impl Default for Argon2Hasher {
    fn default() -> Self {
        Self::new(None)
    }
}

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, raw: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2()
            .hash_password(self.peppered(raw).as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| AuthError::internal(format!("password hashing failed: {e}")))
    }

    fn verify(&self, raw: &str, hash: &str) -> Result<bool, AuthError> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| AuthError::internal(format!("invalid hash format: {e}")))?;

        // Parameters are read from the PHC string, so hashes made with other
        // settings still verify.
        match Argon2::default().verify_password(self.peppered(raw).as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AuthError::internal(format!("verify error: {e}"))),
        }
    }
}

impl core::fmt::Debug for Argon2Hasher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Argon2Hasher")
            .field("params", &self.params)
            .field("pepper", &self.pepper.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
