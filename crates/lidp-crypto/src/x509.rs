//! X.509 certificate handling.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use x509_parser::prelude::*;

use crate::algorithm::HashAlgorithm;
use crate::error::{CryptoError, CryptoResult};
use crate::pem::decode_certificates;

/// sha1WithRSAEncryption and friends: anything signed with SHA-1 or weaker.
const WEAK_SIGNATURE_OIDS: &[&str] = &[
    "1.2.840.113549.1.1.2",  // md2WithRSAEncryption
    "1.2.840.113549.1.1.4",  // md5WithRSAEncryption
    "1.2.840.113549.1.1.5",  // sha1WithRSAEncryption
    "1.3.14.3.2.29",         // sha1WithRSASignature (OIW)
    "1.2.840.10040.4.3",     // dsa-with-sha1
    "1.2.840.10045.4.1",     // ecdsa-with-SHA1
];

const RSA_ENCRYPTION_OID: &str = "1.2.840.113549.1.1.1";

/// A parsed certificate with the pieces the IdP needs kept in owned form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    der: Vec<u8>,
    public_key: Vec<u8>,
    signature_algorithm: String,
    subject: Vec<(String, String)>,
}

impl Certificate {
    /// Parses a DER certificate.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidCertificate` if the bytes are not a
    /// certificate or its key is not RSA.
    pub fn from_der(der: &[u8]) -> CryptoResult<Self> {
        let (_, cert) = X509Certificate::from_der(der)
            .map_err(|e| CryptoError::InvalidCertificate(format!("Failed to parse certificate: {e}")))?;

        let spki = cert.public_key();
        let key_alg = spki.algorithm.algorithm.to_id_string();
        if key_alg != RSA_ENCRYPTION_OID {
            return Err(CryptoError::UnsupportedAlgorithm(format!(
                "certificate key algorithm {key_alg}"
            )));
        }

        let mut subject = Vec::new();
        for rdn in cert.subject().iter() {
            for attr in rdn.iter() {
                if let Ok(value) = attr.as_str() {
                    subject.push((attr.attr_type().to_id_string(), value.to_string()));
                }
            }
        }

        Ok(Self {
            der: der.to_vec(),
            public_key: spki.subject_public_key.data.to_vec(),
            signature_algorithm: cert.signature_algorithm.algorithm.to_id_string(),
            subject,
        })
    }

    /// Parses the first certificate of a PEM document.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed PEM or certificate.
    pub fn from_pem(pem: &str) -> CryptoResult<Self> {
        let der = decode_certificates(pem)?.remove(0);
        Self::from_der(&der)
    }

    /// Parses the base64 body carried by an `X509Certificate` element.
    /// Embedded whitespace is ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not base64 of a certificate.
    pub fn from_base64(text: &str) -> CryptoResult<Self> {
        let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        let der = STANDARD
            .decode(compact)
            .map_err(|e| CryptoError::InvalidCertificate(format!("bad base64: {e}")))?;
        Self::from_der(&der)
    }

    /// DER encoding of the whole certificate.
    #[must_use]
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Base64 of the DER encoding, without line breaks.
    #[must_use]
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.der)
    }

    /// PKCS#1 `RSAPublicKey` of the subject.
    #[must_use]
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// Dotted OID of the issuer's signature algorithm.
    #[must_use]
    pub fn signature_algorithm(&self) -> &str {
        &self.signature_algorithm
    }

    /// True when the certificate is signed with SHA-1 or a weaker digest.
    #[must_use]
    pub fn has_weak_signature(&self) -> bool {
        WEAK_SIGNATURE_OIDS.contains(&self.signature_algorithm.as_str())
    }

    /// Subject attributes as `(dotted OID, value)` in encoded order.
    #[must_use]
    pub fn subject_attributes(&self) -> &[(String, String)] {
        &self.subject
    }

    /// Verifies `sig` over `data` with this certificate's key.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::Verification` on mismatch.
    pub fn verify(&self, data: &[u8], sig: &[u8], algorithm: HashAlgorithm) -> CryptoResult<()> {
        crate::rsa::rsa_verify(&self.public_key, data, sig, algorithm)
    }
}
