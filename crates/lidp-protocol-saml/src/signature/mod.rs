//! XML Signature support for SAML.
//!
//! Signatures are always produced as enveloped RSA-SHA256 signatures over
//! exclusive-canonicalized elements. Validation also accepts RSA-SHA1 for
//! service providers that still send it; DSA is refused.

mod signer;
mod validator;

pub use signer::*;
pub use validator::*;

use lidp_crypto::HashAlgorithm;

/// Enveloped signature transform.
pub const ENVELOPED_SIGNATURE: &str = "http://www.w3.org/2000/09/xmldsig#enveloped-signature";

/// Signature algorithm named by `SignatureMethod` or the redirect `SigAlg`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignatureAlgorithm {
    /// RSA with SHA-256.
    #[default]
    RsaSha256,
    /// RSA with SHA-1, verification only.
    RsaSha1,
    /// DSA with SHA-1, recognized so it can be refused by name.
    DsaSha1,
}

impl SignatureAlgorithm {
    /// Returns the URI for this signature algorithm.
    #[must_use]
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::RsaSha256 => "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256",
            Self::RsaSha1 => "http://www.w3.org/2000/09/xmldsig#rsa-sha1",
            Self::DsaSha1 => "http://www.w3.org/2000/09/xmldsig#dsa-sha1",
        }
    }

    /// Parses a signature algorithm from its URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri.trim() {
            "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256" => Some(Self::RsaSha256),
            "http://www.w3.org/2000/09/xmldsig#rsa-sha1" => Some(Self::RsaSha1),
            "http://www.w3.org/2000/09/xmldsig#dsa-sha1" => Some(Self::DsaSha1),
            _ => None,
        }
    }

    /// Digest used by an RSA algorithm; `None` for algorithms that are
    /// never verified.
    #[must_use]
    pub const fn verification_hash(&self) -> Option<HashAlgorithm> {
        match self {
            Self::RsaSha256 => Some(HashAlgorithm::Sha256),
            Self::RsaSha1 => Some(HashAlgorithm::Sha1),
            Self::DsaSha1 => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_algorithm_uri_roundtrip() {
        for alg in [
            SignatureAlgorithm::RsaSha256,
            SignatureAlgorithm::RsaSha1,
            SignatureAlgorithm::DsaSha1,
        ] {
            assert_eq!(SignatureAlgorithm::from_uri(alg.uri()), Some(alg));
        }
        assert_eq!(
            SignatureAlgorithm::from_uri("http://www.w3.org/2001/04/xmldsig-more#rsa-sha512"),
            None
        );
    }

    #[test]
    fn dsa_is_never_verified() {
        assert_eq!(SignatureAlgorithm::DsaSha1.verification_hash(), None);
        assert_eq!(
            SignatureAlgorithm::RsaSha1.verification_hash(),
            Some(HashAlgorithm::Sha1)
        );
    }
}
