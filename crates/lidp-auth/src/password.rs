//! Password hashing and verification.
//!
//! New hashes are Argon2id PHC strings. Stored bcrypt hashes (`$2a$`,
//! `$2b$`, `$2y$`) are still accepted so existing user lists keep working.

use std::collections::HashMap;

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};

use crate::error::{AuthError, AuthResult};

/// Salt length in bytes; the PHC recommendation is 16.
const SALT_LEN: usize = 16;

/// Password hashing configuration.
#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    /// Memory cost in KiB.
    pub memory_cost: u32,
    /// Time cost (iterations).
    pub time_cost: u32,
    /// Parallelism factor.
    pub parallelism: u32,
    /// Output hash length.
    pub hash_length: u32,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        // OWASP recommended settings for Argon2id
        Self {
            memory_cost: 19 * 1024, // 19 MiB
            time_cost: 2,
            parallelism: 1,
            hash_length: 32,
        }
    }
}

impl PasswordPolicy {
    /// Builds the Argon2 parameters.
    #[allow(clippy::missing_const_for_fn)] // Params::new is not const
    fn build_params(&self) -> Result<Params, argon2::Error> {
        Params::new(
            self.memory_cost,
            self.time_cost,
            self.parallelism,
            Some(self.hash_length as usize),
        )
    }
}

/// Password hasher using Argon2id.
#[derive(Debug, Clone, Default)]
pub struct PasswordHasherService {
    policy: PasswordPolicy,
}

impl PasswordHasherService {
    /// Creates a new password hasher with the given policy.
    #[must_use]
    pub const fn new(policy: PasswordPolicy) -> Self {
        Self { policy }
    }

    /// Hashes a password.
    ///
    /// Returns the PHC-formatted hash string.
    ///
    /// # Errors
    ///
    /// Returns an error if hashing fails.
    pub fn hash(&self, password: &str) -> AuthResult<String> {
        let salt = SaltString::encode_b64(&lidp_crypto::random_bytes(SALT_LEN))
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        let params = self
            .policy
            .build_params()
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        Ok(hash.to_string())
    }

    /// Verifies a password against an Argon2 PHC or bcrypt hash.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` on mismatch and
    /// `AuthError::Internal` for an unreadable hash.
    pub fn verify(&self, password: &str, hash: &str) -> AuthResult<()> {
        if is_bcrypt(hash) {
            return match bcrypt::verify(password, hash) {
                Ok(true) => Ok(()),
                Ok(false) => Err(AuthError::InvalidCredentials),
                Err(e) => Err(AuthError::Internal(e.to_string())),
            };
        }

        let parsed_hash =
            PasswordHash::new(hash).map_err(|e| AuthError::Internal(e.to_string()))?;

        // Argon2::default() can verify any Argon2 variant
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .map_err(|_| AuthError::InvalidCredentials)
    }
}

fn is_bcrypt(hash: &str) -> bool {
    ["$2a$", "$2b$", "$2x$", "$2y$"]
        .iter()
        .any(|prefix| hash.starts_with(prefix))
}

/// Checks a user name and password.
pub trait PasswordValidator: Send + Sync {
    /// Succeeds when `password` is correct for `name`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` for an unknown user or a
    /// wrong password.
    fn validate(&self, name: &str, password: &str) -> AuthResult<()>;
}

/// Validator over a fixed `name -> hash` table.
#[derive(Debug, Clone, Default)]
pub struct StaticPasswordValidator {
    users: HashMap<String, String>,
    hasher: PasswordHasherService,
}

impl StaticPasswordValidator {
    /// Creates a validator from `(name, hash)` pairs.
    pub fn new<I, N, H>(users: I) -> Self
    where
        I: IntoIterator<Item = (N, H)>,
        N: Into<String>,
        H: Into<String>,
    {
        Self {
            users: users
                .into_iter()
                .map(|(name, hash)| (name.into(), hash.into()))
                .collect(),
            hasher: PasswordHasherService::default(),
        }
    }

    /// Number of known users.
    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Whether no users are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl PasswordValidator for StaticPasswordValidator {
    fn validate(&self, name: &str, password: &str) -> AuthResult<()> {
        let hash = self.users.get(name).ok_or(AuthError::InvalidCredentials)?;
        match self.hasher.verify(password, hash) {
            Err(AuthError::Internal(reason)) => {
                tracing::warn!(user = name, %reason, "stored password hash is unreadable");
                Err(AuthError::InvalidCredentials)
            }
            other => other,
        }
    }
}
