//! # lidp-crypto
//!
//! Cryptographic primitives for the identity provider using aws-lc-rs.
//!
//! - SHA-1 / SHA-256 digests ([`hash`])
//! - RSA PKCS#1 v1.5 signing (SHA-256) and verification (SHA-1, SHA-256)
//! - PEM and X.509 parsing ([`Certificate`])
//! - Message and cache identifiers ([`random`])

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod algorithm;
pub mod error;
pub mod hash;
pub mod pem;
pub mod random;
pub mod rsa;
pub mod x509;

pub use algorithm::HashAlgorithm;
pub use error::{CryptoError, CryptoResult};
pub use hash::{hash, sha1, sha256};
pub use random::{new_id, new_key, random_alphanumeric, random_bytes};
pub use rsa::{RsaSigningKey, rsa_verify};
pub use x509::Certificate;
