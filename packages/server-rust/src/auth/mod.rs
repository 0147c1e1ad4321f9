//! Authentication collaborators: password hashing, session tokens, revocation.

pub mod password;
pub mod revocation;
pub mod token;

pub use password::{Argon2Hasher, PasswordHasher};
pub use revocation::{RevocationStore, RevocationSweep};
pub use token::{Claims, CredentialVerifier, TokenSigner};
