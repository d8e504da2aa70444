//! Random identifiers.

use rand::Rng;
use rand::distr::{Alphanumeric, SampleString};
use uuid::Uuid;

/// Generates a cryptographically secure random byte array.
#[must_use]
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut rng = rand::rng();
    let mut bytes = vec![0u8; len];
    rng.fill(&mut bytes[..]);
    bytes
}

/// Generates a random alphanumeric string (a-z, A-Z, 0-9).
#[must_use]
pub fn random_alphanumeric(len: usize) -> String {
    let mut rng = rand::rng();
    Alphanumeric.sample_string(&mut rng, len)
}

/// Generates a SAML message identifier.
///
/// XML `ID` values must not start with a digit, so the UUID is prefixed
/// with an underscore.
#[must_use]
pub fn new_id() -> String {
    format!("_{}", Uuid::new_v4())
}

/// Generates an opaque key for cache entries (pending requests, sessions).
#[must_use]
pub fn new_key() -> String {
    Uuid::new_v4().to_string()
}
