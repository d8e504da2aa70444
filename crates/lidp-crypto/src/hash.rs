//! Hash functions.

use aws_lc_rs::digest;

use crate::algorithm::HashAlgorithm;

/// Computes a hash of the input data.
#[must_use]
pub fn hash(algorithm: HashAlgorithm, data: &[u8]) -> Vec<u8> {
    let alg = match algorithm {
        HashAlgorithm::Sha1 => &digest::SHA1_FOR_LEGACY_USE_ONLY,
        HashAlgorithm::Sha256 => &digest::SHA256,
    };

    digest::digest(alg, data).as_ref().to_vec()
}

/// Computes a SHA-1 hash of the input data.
///
/// Only used where the SAML artifact format demands it.
#[must_use]
pub fn sha1(data: &[u8]) -> Vec<u8> {
    hash(HashAlgorithm::Sha1, data)
}

/// Computes a SHA-256 hash of the input data.
#[must_use]
pub fn sha256(data: &[u8]) -> Vec<u8> {
    hash(HashAlgorithm::Sha256, data)
}
