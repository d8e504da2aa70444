//! XML Signature validation.
//!
//! Verifies enveloped signatures and hands back the exact subtrees the
//! signatures cover. Callers must read data from those copies, never from
//! the original document, or signature wrapping becomes possible.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use lidp_crypto::{Certificate, HashAlgorithm};
use tracing::debug;

use super::{ENVELOPED_SIGNATURE, SignatureAlgorithm};
use crate::error::{SamlError, SamlResult};
use crate::types::XMLDSIG_NS;
use crate::xml::{EXC_C14N, Element, canonicalize};

/// Where verification keys come from.
#[derive(Debug, Clone)]
pub enum KeySource {
    /// Only these certificates are accepted.
    Trusted(Vec<Certificate>),
    /// The certificate in the signature's own `KeyInfo`. This proves
    /// integrity only; callers must pin the certificate elsewhere.
    Embedded,
}

/// XML signature validator.
#[derive(Debug, Clone)]
pub struct SignatureValidator {
    keys: KeySource,
}

impl SignatureValidator {
    /// Validator accepting signatures from any of `certificates`.
    #[must_use]
    pub fn new(certificates: Vec<Certificate>) -> Self {
        Self {
            keys: KeySource::Trusted(certificates),
        }
    }

    /// Validator using the certificate embedded in each signature.
    #[must_use]
    pub const fn embedded() -> Self {
        Self {
            keys: KeySource::Embedded,
        }
    }

    /// Parses `xml` and validates every signature in it.
    ///
    /// # Errors
    ///
    /// See [`SignatureValidator::validate_element`].
    pub fn validate_references(&self, xml: &str) -> SamlResult<Vec<Element>> {
        self.validate_element(&Element::parse(xml)?)
    }

    /// Validates every `ds:Signature` below `root` and returns the
    /// referenced elements with the signature transforms applied.
    ///
    /// # Errors
    ///
    /// - `SignatureVerificationFailed` if there is no signature or no
    ///   candidate certificate verifies it.
    /// - `UnsupportedSignatureAlgorithm` for anything but exclusive
    ///   canonicalization with RSA-SHA1 or RSA-SHA256.
    /// - `DigestMismatch` if a referenced element was altered.
    /// - `MalformedRequest` for structural problems, including references
    ///   to missing or duplicated IDs.
    pub fn validate_element(&self, root: &Element) -> SamlResult<Vec<Element>> {
        let signatures = root.paths_named(XMLDSIG_NS, "Signature");
        if signatures.is_empty() {
            return Err(SamlError::SignatureVerificationFailed(
                "document is not signed".into(),
            ));
        }

        let mut validated = Vec::new();
        for path in &signatures {
            validated.extend(self.validate_signature(root, path)?);
        }
        Ok(validated)
    }

    fn validate_signature(&self, root: &Element, path: &[usize]) -> SamlResult<Vec<Element>> {
        let signature = root
            .at_path(path)
            .ok_or_else(|| malformed("signature path"))?;
        let signed_info_index = signature
            .elements()
            .position(|e| e.is(XMLDSIG_NS, "SignedInfo"))
            .ok_or_else(|| malformed("Signature has no SignedInfo"))?;
        let signed_info_path: Vec<usize> = path
            .iter()
            .copied()
            .chain(std::iter::once(signed_info_index))
            .collect();
        let signed_info = signature
            .elements()
            .nth(signed_info_index)
            .ok_or_else(|| malformed("Signature has no SignedInfo"))?;

        let c14n_method = signed_info
            .child(XMLDSIG_NS, "CanonicalizationMethod")
            .ok_or_else(|| malformed("SignedInfo has no CanonicalizationMethod"))?;
        if c14n_method.attr("Algorithm") != Some(EXC_C14N) {
            return Err(SamlError::UnsupportedSignatureAlgorithm(
                c14n_method.attr("Algorithm").unwrap_or_default().to_string(),
            ));
        }

        let method_uri = signed_info
            .child(XMLDSIG_NS, "SignatureMethod")
            .and_then(|m| m.attr("Algorithm"))
            .ok_or_else(|| malformed("SignedInfo has no SignatureMethod"))?;
        let hash = SignatureAlgorithm::from_uri(method_uri)
            .and_then(|alg| alg.verification_hash())
            .ok_or_else(|| SamlError::UnsupportedSignatureAlgorithm(method_uri.to_string()))?;

        let mut referenced = Vec::new();
        for reference in signed_info.children_named(XMLDSIG_NS, "Reference") {
            referenced.push(apply_reference(root, path, reference)?);
        }
        if referenced.is_empty() {
            return Err(malformed("SignedInfo has no Reference"));
        }

        let signature_value = signature
            .child_text(XMLDSIG_NS, "SignatureValue")
            .ok_or_else(|| malformed("Signature has no SignatureValue"))?;
        let signature_value = decode_base64(&signature_value)?;
        let canonical = canonicalize(
            signed_info,
            &root.scope_at(&signed_info_path),
            &inclusive_prefixes(c14n_method),
        );

        let embedded;
        let candidates: &[Certificate] = match &self.keys {
            KeySource::Trusted(certificates) => certificates,
            KeySource::Embedded => {
                embedded = embedded_certificates(signature)?;
                &embedded
            }
        };
        if candidates
            .iter()
            .any(|cert| cert.verify(canonical.as_bytes(), &signature_value, hash).is_ok())
        {
            debug!(references = referenced.len(), "signature verified");
            Ok(referenced)
        } else {
            Err(SamlError::SignatureVerificationFailed(format!(
                "no trusted certificate verifies the signature ({} tried)",
                candidates.len()
            )))
        }
    }
}

/// Resolves one `ds:Reference`, applies its transforms to a copy of the
/// target and checks the digest.
fn apply_reference(root: &Element, signature_path: &[usize], reference: &Element) -> SamlResult<Element> {
    let uri = reference.attr("URI").unwrap_or_default();
    let id = uri
        .strip_prefix('#')
        .filter(|id| !id.is_empty())
        .ok_or_else(|| malformed(&format!("unsupported reference URI {uri:?}")))?;
    let paths = root.paths_by_id(id);
    let [target_path] = paths.as_slice() else {
        return Err(malformed(&format!("{} elements with ID {id}", paths.len())));
    };
    let mut target = root
        .at_path(target_path)
        .ok_or_else(|| malformed("reference path"))?
        .clone();

    let mut inclusive = Vec::new();
    if let Some(transforms) = reference.child(XMLDSIG_NS, "Transforms") {
        for transform in transforms.children_named(XMLDSIG_NS, "Transform") {
            match transform.attr("Algorithm").unwrap_or_default() {
                ENVELOPED_SIGNATURE => remove_signature(&mut target, target_path, signature_path)?,
                EXC_C14N => inclusive = inclusive_prefixes(transform),
                other => return Err(SamlError::UnsupportedSignatureAlgorithm(other.to_string())),
            }
        }
    }

    let digest_uri = reference
        .child(XMLDSIG_NS, "DigestMethod")
        .and_then(|d| d.attr("Algorithm"))
        .ok_or_else(|| malformed("Reference has no DigestMethod"))?;
    let digest_alg = HashAlgorithm::from_digest_uri(digest_uri)
        .ok_or_else(|| SamlError::UnsupportedSignatureAlgorithm(digest_uri.to_string()))?;
    let expected = reference
        .child_text(XMLDSIG_NS, "DigestValue")
        .ok_or_else(|| malformed("Reference has no DigestValue"))?;

    let canonical = canonicalize(&target, &root.scope_at(target_path), &inclusive);
    let actual = lidp_crypto::hash(digest_alg, canonical.as_bytes());
    if decode_base64(&expected)? != actual {
        return Err(SamlError::DigestMismatch(id.to_string()));
    }
    Ok(target)
}

/// Enveloped-signature transform: drops the signature being checked from
/// the copy of the referenced element.
fn remove_signature(target: &mut Element, target_path: &[usize], signature_path: &[usize]) -> SamlResult<()> {
    let relative = signature_path
        .strip_prefix(target_path)
        .filter(|rest| !rest.is_empty())
        .ok_or_else(|| malformed("enveloped signature is not inside the referenced element"))?;
    let (last, parent) = relative
        .split_last()
        .ok_or_else(|| malformed("enveloped signature path"))?;
    target
        .at_path_mut(parent)
        .and_then(|p| p.remove_element(*last))
        .map(|_| ())
        .ok_or_else(|| malformed("enveloped signature path"))
}

fn inclusive_prefixes(method: &Element) -> Vec<String> {
    method
        .child(EXC_C14N, "InclusiveNamespaces")
        .and_then(|n| n.attr("PrefixList"))
        .map(|list| list.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

fn embedded_certificates(signature: &Element) -> SamlResult<Vec<Certificate>> {
    let certificates: Vec<Certificate> = signature
        .child(XMLDSIG_NS, "KeyInfo")
        .into_iter()
        .flat_map(|k| k.children_named(XMLDSIG_NS, "X509Data"))
        .flat_map(|d| d.children_named(XMLDSIG_NS, "X509Certificate"))
        .map(|c| Certificate::from_base64(&c.text()))
        .collect::<Result<_, _>>()?;
    if certificates.is_empty() {
        return Err(SamlError::SignatureVerificationFailed(
            "signature carries no certificate".into(),
        ));
    }
    Ok(certificates)
}

fn decode_base64(text: &str) -> SamlResult<Vec<u8>> {
    let compact: String = text.split_whitespace().collect();
    Ok(STANDARD.decode(compact)?)
}

fn malformed(message: &str) -> SamlError {
    SamlError::MalformedRequest(message.to_string())
}
