//! Password hashing (Argon2id, PHC string format).

use anyhow::{anyhow, Result};
use argon2::password_hash::{
    Error as HashError, PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString,
};
use argon2::{Algorithm, Argon2, Params, Version};

/// Hashes and verifies account passwords.
pub trait PasswordHasher: Send + Sync + 'static {
    /// # Errors
    ///
    /// Returns an error if hashing fails.
    fn hash_password(&self, plaintext: &str) -> Result<String>;

    /// Returns `Ok(false)` on a mismatch.
    ///
    /// # Errors
    ///
    /// Returns an error if `hash` is not a valid encoded hash.
    fn verify_password(&self, plaintext: &str, hash: &str) -> Result<bool>;
}

/// Argon2id hasher with a fresh random salt per hash.
#[derive(Debug, Clone)]
pub struct Argon2Hasher {
    params: Params,
}

impl Argon2Hasher {
    /// Uses the library's default cost parameters.
    #[must_use]
    pub fn new() -> Self {
        Self {
            params: Params::default(),
        }
    }

    /// Uses explicit cost parameters (memory in KiB, iterations, lanes).
    ///
    /// # Errors
    ///
    /// Returns an error if the parameters are out of range.
    pub fn with_cost(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| anyhow!("invalid argon2 parameters: {e}"))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl Default for Argon2Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash_password(&self, plaintext: &str) -> Result<String> {
        let salt_bytes: [u8; 16] = rand::random();
        let salt =
            SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!("failed to encode salt: {e}"))?;
        let hash = self
            .argon2()
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| anyhow!("failed to hash password: {e}"))?;
        Ok(hash.to_string())
    }

    fn verify_password(&self, plaintext: &str, hash: &str) -> Result<bool> {
        let parsed =
            PasswordHash::new(hash).map_err(|e| anyhow!("stored password hash is malformed: {e}"))?;
        match self.argon2().verify_password(plaintext.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(HashError::Password) => Ok(false),
            Err(e) => Err(anyhow!("failed to verify password: {e}")),
        }
    }
}
