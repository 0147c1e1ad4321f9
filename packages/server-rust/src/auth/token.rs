//! Session token signing and verification (HS256 JWT).

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Claims carried by every session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub uid: String,
    pub user: String,
    pub role: String,
    /// Unique per token, so two logins in the same second never share a token.
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    /// Expiry as a wall-clock instant.
    #[must_use]
    pub fn expires_at(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(u64::try_from(self.exp).unwrap_or(0))
    }
}

/// Validates a presented bearer token.
pub trait CredentialVerifier: Send + Sync + 'static {
    /// Decodes and validates `token`.
    ///
    /// # Errors
    ///
    /// Returns an error if the signature is wrong, the token is malformed, or it has expired.
    fn verify(&self, token: &str) -> Result<Claims>;
}

/// Issues and verifies HS256 tokens with a shared secret.
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenSigner {
    /// # Errors
    ///
    /// Returns an error if `secret` is empty or blank.
    pub fn new(secret: &str, ttl: Duration) -> Result<Self> {
        if secret.trim().is_empty() {
            anyhow::bail!("token secret must not be empty");
        }
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        })
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Signs a token for the given account.
    ///
    /// # Errors
    ///
    /// Returns an error if the TTL is out of range or encoding fails.
    pub fn sign(&self, id: &str, username: &str, role: &str) -> Result<String> {
        let now = Utc::now();
        let ttl = chrono::Duration::from_std(self.ttl).context("token TTL out of range")?;
        let claims = Claims {
            uid: id.to_string(),
            user: username.to_string(),
            role: role.to_string(),
            jti: format!("{:032x}", rand::random::<u128>()),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .context("failed to sign token")
    }
}

impl CredentialVerifier for TokenSigner {
    fn verify(&self, token: &str) -> Result<Claims> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)
            .context("invalid token")?;
        Ok(data.claims)
    }
}
