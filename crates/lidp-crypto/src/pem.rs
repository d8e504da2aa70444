//! PEM armor helpers.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ::pem::Pem;

use crate::error::{CryptoError, CryptoResult};

/// Decodes the first PEM block in `input`.
///
/// # Errors
///
/// Returns `CryptoError::Pem` if no well-formed block is present.
pub fn decode_pem(input: &str) -> CryptoResult<Pem> {
    ::pem::parse(input).map_err(|e| CryptoError::Pem(e.to_string()))
}

/// Decodes every `CERTIFICATE` block in `input`, in order.
///
/// # Errors
///
/// Returns `CryptoError::Pem` on malformed armor or when no certificate is
/// found.
pub fn decode_certificates(input: &str) -> CryptoResult<Vec<Vec<u8>>> {
    let certs: Vec<Vec<u8>> = ::pem::parse_many(input)
        .map_err(|e| CryptoError::Pem(e.to_string()))?
        .into_iter()
        .filter(|block| block.tag() == "CERTIFICATE")
        .map(Pem::into_contents)
        .collect();

    if certs.is_empty() {
        return Err(CryptoError::Pem("no CERTIFICATE block found".to_string()));
    }
    Ok(certs)
}

/// Base64 body of a DER certificate, as carried in `X509Certificate`
/// elements of XML-DSig and SAML metadata.
#[must_use]
pub fn certificate_base64(der: &[u8]) -> String {
    STANDARD.encode(der)
}
