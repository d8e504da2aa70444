//! SAML error types.
//!
//! Every failure the protocol engine can report maps onto one of these
//! kinds. Each kind knows its HTTP status, its SAML status code and the
//! SOAP fault code used on SOAP endpoints.

use thiserror::Error;

/// Result type for SAML operations.
pub type SamlResult<T> = Result<T, SamlError>;

/// SOAP fault code for errors caused by the caller.
pub const SOAP_FAULT_CLIENT: &str = "SOAP-ENV:Client";

/// SOAP fault code for errors on the IdP side.
pub const SOAP_FAULT_SERVER: &str = "SOAP-ENV:Server";

/// SAML protocol errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SamlError {
    /// Message could not be decoded or parsed.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// RelayState exceeds the 80 byte limit of the bindings profile.
    #[error("RelayState is {0} bytes, limit is 80")]
    RelayStateTooLong(usize),

    /// Issuer missing or not a registered service provider.
    #[error("unregistered issuer: {0}")]
    UnregisteredIssuer(String),

    /// AssertionConsumerService in the request does not match metadata.
    #[error("assertion consumer service mismatch: {0}")]
    AcsMismatch(String),

    /// Signature algorithm not accepted.
    #[error("unsupported signature algorithm: {0}")]
    UnsupportedSignatureAlgorithm(String),

    /// No certificate verified the signature, or the signature is absent.
    #[error("signature verification failed: {0}")]
    SignatureVerificationFailed(String),

    /// A referenced element does not match its digest.
    #[error("digest mismatch for reference {0}")]
    DigestMismatch(String),

    /// Artifact, pending request or session is absent or expired.
    #[error("cache miss")]
    CacheMiss,

    /// Response binding missing or not supported.
    #[error("unsupported binding: {0}")]
    UnsupportedBinding(String),

    /// Password login rejected.
    #[error("invalid login or password")]
    InvalidCredentials,

    /// Signing certificate uses SHA-1 or a weaker algorithm.
    #[error("unsupported certificate algorithm: {0}")]
    UnsupportedCertificateAlgorithm(String),

    /// Caller is not allowed to use this endpoint.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Unexpected failure on the IdP side.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SamlError {
    /// Returns the SAML status code for this error.
    #[must_use]
    pub fn status_code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "urn:oasis:names:tc:SAML:2.0:status:AuthnFailed",
            Self::UnsupportedBinding(_) | Self::UnsupportedSignatureAlgorithm(_) => {
                "urn:oasis:names:tc:SAML:2.0:status:RequestUnsupported"
            }
            Self::Forbidden(_) => "urn:oasis:names:tc:SAML:2.0:status:RequestDenied",
            Self::UnsupportedCertificateAlgorithm(_) | Self::Internal(_) => {
                "urn:oasis:names:tc:SAML:2.0:status:Responder"
            }
            _ => "urn:oasis:names:tc:SAML:2.0:status:Requester",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::MalformedRequest(_)
            | Self::RelayStateTooLong(_)
            | Self::UnregisteredIssuer(_)
            | Self::AcsMismatch(_)
            | Self::UnsupportedSignatureAlgorithm(_)
            | Self::SignatureVerificationFailed(_)
            | Self::DigestMismatch(_)
            | Self::CacheMiss => 400,
            Self::InvalidCredentials | Self::Forbidden(_) => 403,
            Self::UnsupportedBinding(_)
            | Self::UnsupportedCertificateAlgorithm(_)
            | Self::Internal(_) => 500,
        }
    }

    /// Returns the SOAP 1.1 fault code for this error.
    #[must_use]
    pub const fn soap_fault_code(&self) -> &'static str {
        match self {
            Self::UnsupportedBinding(_)
            | Self::UnsupportedCertificateAlgorithm(_)
            | Self::Internal(_) => SOAP_FAULT_SERVER,
            _ => SOAP_FAULT_CLIENT,
        }
    }
}

impl From<quick_xml::Error> for SamlError {
    fn from(err: quick_xml::Error) -> Self {
        Self::MalformedRequest(format!("XML: {err}"))
    }
}

impl From<quick_xml::events::attributes::AttrError> for SamlError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Self::MalformedRequest(format!("XML attribute: {err}"))
    }
}

impl From<quick_xml::escape::EscapeError> for SamlError {
    fn from(err: quick_xml::escape::EscapeError) -> Self {
        Self::MalformedRequest(format!("XML escape: {err}"))
    }
}

impl From<base64::DecodeError> for SamlError {
    fn from(err: base64::DecodeError) -> Self {
        Self::MalformedRequest(format!("base64: {err}"))
    }
}

impl From<lidp_crypto::CryptoError> for SamlError {
    fn from(err: lidp_crypto::CryptoError) -> Self {
        use lidp_crypto::CryptoError;
        match err {
            CryptoError::Verification => {
                Self::SignatureVerificationFailed("signature value does not verify".to_string())
            }
            CryptoError::UnsupportedAlgorithm(alg) => Self::UnsupportedSignatureAlgorithm(alg),
            CryptoError::InvalidCertificate(msg) | CryptoError::Pem(msg) => {
                Self::MalformedRequest(format!("certificate: {msg}"))
            }
            other => Self::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_status_codes() {
        let err = SamlError::MalformedRequest("test".to_string());
        assert_eq!(err.status_code(), "urn:oasis:names:tc:SAML:2.0:status:Requester");
        assert_eq!(err.http_status(), 400);
        assert_eq!(err.soap_fault_code(), SOAP_FAULT_CLIENT);

        let err = SamlError::InvalidCredentials;
        assert_eq!(err.status_code(), "urn:oasis:names:tc:SAML:2.0:status:AuthnFailed");
        assert_eq!(err.http_status(), 403);

        let err = SamlError::Internal("test".to_string());
        assert_eq!(err.status_code(), "urn:oasis:names:tc:SAML:2.0:status:Responder");
        assert_eq!(err.http_status(), 500);
        assert_eq!(err.soap_fault_code(), SOAP_FAULT_SERVER);
    }

    #[test]
    fn unsupported_binding_is_server_side() {
        let err = SamlError::UnsupportedBinding("urn:example".to_string());
        assert_eq!(err.http_status(), 500);
        assert_eq!(err.soap_fault_code(), SOAP_FAULT_SERVER);
    }

    #[test]
    fn cache_miss_is_a_client_error() {
        assert_eq!(SamlError::CacheMiss.http_status(), 400);
        assert_eq!(SamlError::CacheMiss.soap_fault_code(), SOAP_FAULT_CLIENT);
    }

    #[test]
    fn crypto_verification_maps_to_signature_failure() {
        let err: SamlError = lidp_crypto::CryptoError::Verification.into();
        assert!(matches!(err, SamlError::SignatureVerificationFailed(_)));
    }
}
