//! Salted password hashing behind a swappable capability

use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher as _, PasswordVerifier, Version,
    password_hash::SaltString,
};
use thiserror::Error;

/// Error raised when a password cannot be hashed or a stored hash is unreadable
#[derive(Error, Debug)]
#[error("Password hashing error: {0}")]
pub struct PasswordError(String);

impl PasswordError {
    pub(crate) fn from_join(e: tokio::task::JoinError) -> Self {
        PasswordError(format!("hashing task failed: {}", e))
    }
}

/// Hashes and verifies user passwords
///
/// Implementations must produce self-describing hashes: `verify` receives only
/// the stored string, never the parameters it was produced with.
pub trait PasswordHasher: Send + Sync {
    /// Hash a plaintext password with a fresh random salt
    fn hash(&self, password: &str) -> Result<String, PasswordError>;

    /// Check a plaintext password against a stored hash
    fn verify(&self, password: &str, stored_hash: &str) -> Result<bool, PasswordError>;
}

/// Argon2id hasher producing PHC strings
#[derive(Clone, Default)]
pub struct Argon2Hasher {
    argon2: Argon2<'static>,
}

impl Argon2Hasher {
    /// Create a hasher with explicit cost parameters
    ///
    /// * `memory_kib` - memory cost in KiB (at least `8 * parallelism`)
    /// * `iterations` - time cost
    /// * `parallelism` - lanes
    pub fn with_params(
        memory_kib: u32,
        iterations: u32,
        parallelism: u32,
    ) -> Result<Self, PasswordError> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| PasswordError(e.to_string()))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut rand::thread_rng());
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| PasswordError(e.to_string()))?;

        Ok(hash.to_string())
    }

    fn verify(&self, password: &str, stored_hash: &str) -> Result<bool, PasswordError> {
        let parsed_hash = PasswordHash::new(stored_hash).map_err(|e| PasswordError(e.to_string()))?;

        Ok(self
            .argon2
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }
}
