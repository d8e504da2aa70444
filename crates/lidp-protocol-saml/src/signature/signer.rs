//! XML Signature creation.
//!
//! Signs one element of a rendered document with an enveloped RSA-SHA256
//! signature over its exclusive canonical form.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use lidp_crypto::{Certificate, HashAlgorithm, RsaSigningKey};

use super::{ENVELOPED_SIGNATURE, SignatureAlgorithm};
use crate::error::{SamlError, SamlResult};
use crate::types::{SAML_NS, XMLDSIG_NS};
use crate::xml::{EXC_C14N, Element, Node, canonicalize, escape_attr};

/// XML document signer.
///
/// The key is read-only after construction; share one signer behind an
/// `Arc` across request handlers.
#[derive(Debug)]
pub struct XmlSigner {
    key: RsaSigningKey,
    certificate: Certificate,
}

impl XmlSigner {
    /// Creates a signer from a key and its certificate.
    ///
    /// # Errors
    ///
    /// Returns `SamlError::UnsupportedCertificateAlgorithm` if the
    /// certificate itself is signed with SHA-1 or weaker.
    pub fn new(key: RsaSigningKey, certificate: Certificate) -> SamlResult<Self> {
        if certificate.has_weak_signature() {
            return Err(SamlError::UnsupportedCertificateAlgorithm(
                certificate.signature_algorithm().to_string(),
            ));
        }
        Ok(Self { key, certificate })
    }

    /// Creates a signer from PEM-encoded key and certificate.
    ///
    /// # Errors
    ///
    /// Returns `SamlError::Internal` for unreadable PEM and the errors of
    /// [`XmlSigner::new`].
    pub fn from_pem(private_key_pem: &str, certificate_pem: &str) -> SamlResult<Self> {
        let key = RsaSigningKey::from_pem(private_key_pem)
            .map_err(|e| SamlError::Internal(format!("signing key: {e}")))?;
        let certificate = Certificate::from_pem(certificate_pem)
            .map_err(|e| SamlError::Internal(format!("signing certificate: {e}")))?;
        Self::new(key, certificate)
    }

    /// The certificate embedded in every signature.
    #[must_use]
    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    /// Algorithm used for every signature this signer produces.
    #[must_use]
    pub const fn algorithm(&self) -> SignatureAlgorithm {
        SignatureAlgorithm::RsaSha256
    }

    /// Signs raw bytes and returns the base64 signature value, as used by
    /// the HTTP-Redirect binding.
    ///
    /// # Errors
    ///
    /// Returns `SamlError::Internal` if the key cannot sign.
    pub fn sign(&self, data: &[u8]) -> SamlResult<String> {
        Ok(STANDARD.encode(self.key.sign(data)?))
    }

    /// Signs the element of `xml` whose `ID` is `reference_id`.
    ///
    /// The `ds:Signature` is inserted right after the element's
    /// `saml:Issuer` (or first when there is none) and the whole document
    /// is returned without an XML declaration. The element must not change
    /// after this call.
    ///
    /// # Errors
    ///
    /// Returns `SamlError::Internal` if the document does not contain
    /// exactly one element with that ID or cannot be parsed.
    pub fn sign_element(&self, xml: &str, reference_id: &str) -> SamlResult<String> {
        let mut root = Element::parse(xml).map_err(|e| SamlError::Internal(e.to_string()))?;
        let paths = root.paths_by_id(reference_id);
        let [path] = paths.as_slice() else {
            return Err(SamlError::Internal(format!(
                "{} elements with ID {reference_id}",
                paths.len()
            )));
        };
        let target = root
            .at_path(path)
            .ok_or_else(|| SamlError::Internal("signed element vanished".into()))?;

        let canonical = canonicalize(target, &root.scope_at(path), &[]);
        let digest = STANDARD.encode(lidp_crypto::sha256(canonical.as_bytes()));

        let mut signature = Element::parse(&format!(
            r##"<ds:Signature xmlns:ds="{XMLDSIG_NS}"><ds:SignedInfo><ds:CanonicalizationMethod Algorithm="{EXC_C14N}"/><ds:SignatureMethod Algorithm="{method}"/><ds:Reference URI="#{id}"><ds:Transforms><ds:Transform Algorithm="{ENVELOPED_SIGNATURE}"/><ds:Transform Algorithm="{EXC_C14N}"/></ds:Transforms><ds:DigestMethod Algorithm="{digest_method}"/><ds:DigestValue>{digest}</ds:DigestValue></ds:Reference></ds:SignedInfo><ds:SignatureValue/><ds:KeyInfo><ds:X509Data><ds:X509Certificate>{certificate}</ds:X509Certificate></ds:X509Data></ds:KeyInfo></ds:Signature>"##,
            method = self.algorithm().uri(),
            id = escape_attr(reference_id),
            digest_method = HashAlgorithm::Sha256.digest_uri(),
            certificate = self.certificate.to_base64(),
        ))
        .map_err(|e| SamlError::Internal(e.to_string()))?;

        let signed_info = signature
            .child(XMLDSIG_NS, "SignedInfo")
            .ok_or_else(|| SamlError::Internal("SignedInfo missing".into()))?;
        let value = self.sign(canonicalize(signed_info, &signature.namespaces, &[]).as_bytes())?;
        if let Some(slot) = signature.at_path_mut(&[1]) {
            slot.children = vec![Node::Text(value)];
        }

        let target = root
            .at_path_mut(path)
            .ok_or_else(|| SamlError::Internal("signed element vanished".into()))?;
        let position = target
            .elements()
            .position(|e| e.is(SAML_NS, "Issuer"))
            .map_or(0, |index| index + 1);
        target.insert_element(position, signature);
        Ok(root.to_xml())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::XML_HEADER;

    const IDP_KEY: &str = include_str!("../../../../testdata/idp-key.pem");
    const IDP_CERT: &str = include_str!("../../../../testdata/idp-cert.pem");
    const SHA1_CERT: &str = include_str!("../../../../testdata/sha1-cert.pem");

    fn signer() -> XmlSigner {
        XmlSigner::from_pem(IDP_KEY, IDP_CERT).unwrap()
    }

    #[test]
    fn rejects_sha1_signed_certificate() {
        let err = XmlSigner::from_pem(IDP_KEY, SHA1_CERT).unwrap_err();
        assert!(matches!(err, SamlError::UnsupportedCertificateAlgorithm(_)));
    }

    #[test]
    fn inserts_signature_after_issuer() {
        let xml = format!(
            r#"{XML_HEADER}<samlp:Response xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" xmlns:saml="{SAML_NS}" ID="_r"><saml:Issuer>idp</saml:Issuer><saml:Assertion ID="_a"><saml:Issuer>idp</saml:Issuer><saml:Subject/></saml:Assertion></samlp:Response>"#
        );
        let signed = signer().sign_element(&xml, "_a").unwrap();
        let root = Element::parse(&signed).unwrap();
        let assertion = root.child(SAML_NS, "Assertion").unwrap();
        let names: Vec<&str> = assertion.elements().map(|e| e.local_name.as_str()).collect();
        assert_eq!(names, ["Issuer", "Signature", "Subject"]);
        assert!(root.child(XMLDSIG_NS, "Signature").is_none());

        let signature = assertion.child(XMLDSIG_NS, "Signature").unwrap();
        let reference = signature
            .child(XMLDSIG_NS, "SignedInfo")
            .and_then(|s| s.child(XMLDSIG_NS, "Reference"))
            .unwrap();
        assert_eq!(reference.attr("URI"), Some("#_a"));
        assert!(!signature.child_text(XMLDSIG_NS, "SignatureValue").unwrap().is_empty());
        assert_eq!(
            signature
                .descendant(XMLDSIG_NS, "X509Certificate")
                .map(Element::text),
            Some(signer().certificate().to_base64())
        );
    }

    #[test]
    fn digest_covers_normalized_line_endings() {
        let xml = format!(
            "<saml:Assertion xmlns:saml=\"{SAML_NS}\" ID=\"_a\"><saml:Issuer>idp</saml:Issuer><saml:AttributeValue>1 Main St\r\nSpringfield</saml:AttributeValue></saml:Assertion>"
        );
        let signed = signer().sign_element(&xml, "_a").unwrap();
        let digest = Element::parse(&signed)
            .unwrap()
            .descendant(XMLDSIG_NS, "DigestValue")
            .map(Element::text)
            .unwrap();

        let expected = format!(
            "<saml:Assertion xmlns:saml=\"{SAML_NS}\" ID=\"_a\"><saml:Issuer>idp</saml:Issuer><saml:AttributeValue>1 Main St\nSpringfield</saml:AttributeValue></saml:Assertion>"
        );
        assert_eq!(digest, STANDARD.encode(lidp_crypto::sha256(expected.as_bytes())));
    }

    #[test]
    fn unknown_or_duplicate_id_is_an_error() {
        let signer = signer();
        assert!(signer.sign_element("<a ID=\"x\"/>", "y").is_err());
        assert!(signer.sign_element("<a ID=\"x\"><b ID=\"x\"/></a>", "x").is_err());
    }

    #[test]
    fn raw_signature_verifies() {
        let signer = signer();
        let value = signer.sign(b"SAMLRequest=abc&SigAlg=x").unwrap();
        let sig = STANDARD.decode(value).unwrap();
        signer
            .certificate()
            .verify(b"SAMLRequest=abc&SigAlg=x", &sig, HashAlgorithm::Sha256)
            .unwrap();
    }
}
