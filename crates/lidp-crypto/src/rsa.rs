//! RSA PKCS#1 v1.5 signatures.
//!
//! Signing always uses SHA-256. Verification also accepts SHA-1 because
//! deployed service providers still sign redirect requests with
//! `rsa-sha1`.

use std::fmt;

use aws_lc_rs::{
    rand::SystemRandom,
    signature::{self, RsaKeyPair, UnparsedPublicKey},
};

use crate::algorithm::HashAlgorithm;
use crate::error::{CryptoError, CryptoResult};
use crate::pem::decode_pem;

/// RSA private key used to sign assertions and outgoing requests.
pub struct RsaSigningKey {
    key_pair: RsaKeyPair,
    rng: SystemRandom,
}

impl fmt::Debug for RsaSigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaSigningKey")
            .field("modulus_len", &self.key_pair.public_modulus_len())
            .finish_non_exhaustive()
    }
}

impl RsaSigningKey {
    /// Loads a key from DER (PKCS#8 or PKCS#1).
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidKey` if the bytes are not an RSA key.
    pub fn from_der(key_der: &[u8]) -> CryptoResult<Self> {
        let key_pair = RsaKeyPair::from_pkcs8(key_der)
            .or_else(|_| RsaKeyPair::from_der(key_der))
            .map_err(|e| CryptoError::InvalidKey(format!("Invalid RSA key: {e}")))?;

        Ok(Self {
            key_pair,
            rng: SystemRandom::new(),
        })
    }

    /// Loads a key from a `PRIVATE KEY` or `RSA PRIVATE KEY` PEM block.
    ///
    /// # Errors
    ///
    /// Returns an error if the PEM is malformed or does not hold an RSA key.
    pub fn from_pem(pem: &str) -> CryptoResult<Self> {
        let block = decode_pem(pem)?;
        match block.tag() {
            "PRIVATE KEY" | "RSA PRIVATE KEY" => Self::from_der(block.contents()),
            other => Err(CryptoError::InvalidKey(format!(
                "expected a private key, found {other}"
            ))),
        }
    }

    /// Signs `data` with RSA PKCS#1 v1.5 over SHA-256.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::Signing` if the underlying operation fails.
    pub fn sign(&self, data: &[u8]) -> CryptoResult<Vec<u8>> {
        let mut signature = vec![0u8; self.key_pair.public_modulus_len()];
        self.key_pair
            .sign(&signature::RSA_PKCS1_SHA256, &self.rng, data, &mut signature)
            .map_err(|e| CryptoError::Signing(format!("RSA signing failed: {e}")))?;
        Ok(signature)
    }
}

/// Verifies an RSA PKCS#1 v1.5 signature.
///
/// `public_key_der` is the PKCS#1 `RSAPublicKey` encoding, as returned by
/// [`Certificate::public_key`](crate::x509::Certificate::public_key).
///
/// # Errors
///
/// Returns `CryptoError::Verification` if the signature does not match.
pub fn rsa_verify(
    public_key_der: &[u8],
    data: &[u8],
    sig: &[u8],
    algorithm: HashAlgorithm,
) -> CryptoResult<()> {
    let verification_alg: &dyn signature::VerificationAlgorithm = match algorithm {
        HashAlgorithm::Sha1 => &signature::RSA_PKCS1_2048_8192_SHA1_FOR_LEGACY_USE_ONLY,
        HashAlgorithm::Sha256 => &signature::RSA_PKCS1_2048_8192_SHA256,
    };

    UnparsedPublicKey::new(verification_alg, public_key_der)
        .verify(data, sig)
        .map_err(|_| CryptoError::Verification)
}

#[cfg(test)]
mod tests {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;

    use super::*;
    use crate::x509::Certificate;

    const IDP_KEY: &str = include_str!("../../../testdata/idp-key.pem");
    const IDP_CERT: &str = include_str!("../../../testdata/idp-cert.pem");
    const SP_CERT: &str = include_str!("../../../testdata/sp-cert.pem");
    const SP_SHA1_SIGNATURE: &str = include_str!("../../../testdata/sp-sha1-signature.b64");

    #[test]
    fn sign_and_verify_sha256() {
        let key = RsaSigningKey::from_pem(IDP_KEY).unwrap();
        let cert = Certificate::from_pem(IDP_CERT).unwrap();

        let sig = key.sign(b"signed info").unwrap();
        assert_eq!(sig.len(), 256);
        rsa_verify(cert.public_key(), b"signed info", &sig, HashAlgorithm::Sha256).unwrap();
    }

    #[test]
    fn tampered_data_fails() {
        let key = RsaSigningKey::from_pem(IDP_KEY).unwrap();
        let cert = Certificate::from_pem(IDP_CERT).unwrap();

        let sig = key.sign(b"signed info").unwrap();
        let err = rsa_verify(cert.public_key(), b"signed inf0", &sig, HashAlgorithm::Sha256);
        assert!(matches!(err, Err(CryptoError::Verification)));
    }

    #[test]
    fn wrong_key_fails() {
        let key = RsaSigningKey::from_pem(IDP_KEY).unwrap();
        let other = Certificate::from_pem(SP_CERT).unwrap();

        let sig = key.sign(b"data").unwrap();
        assert!(rsa_verify(other.public_key(), b"data", &sig, HashAlgorithm::Sha256).is_err());
    }

    #[test]
    fn verifies_legacy_sha1_signature() {
        // produced with `openssl dgst -sha1 -sign sp-key.pem`
        let cert = Certificate::from_pem(SP_CERT).unwrap();
        let sig = STANDARD.decode(SP_SHA1_SIGNATURE.trim()).unwrap();

        rsa_verify(cert.public_key(), b"lite-idp legacy vector", &sig, HashAlgorithm::Sha1)
            .unwrap();
        assert!(
            rsa_verify(cert.public_key(), b"lite-idp legacy vector", &sig, HashAlgorithm::Sha256)
                .is_err()
        );
    }

    #[test]
    fn rejects_certificate_as_key() {
        assert!(matches!(
            RsaSigningKey::from_pem(IDP_CERT),
            Err(CryptoError::InvalidKey(_))
        ));
    }
}
