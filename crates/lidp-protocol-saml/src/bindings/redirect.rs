//! HTTP-Redirect Binding implementation.
//!
//! Messages travel DEFLATE-compressed (raw, no zlib header) and base64
//! encoded in the query string. The signature covers the query parameters
//! exactly as they were sent, so verification works from the raw query.

use std::io::{Read, Write};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use lidp_crypto::Certificate;
use url::form_urlencoded;

use super::MAX_RELAY_STATE_LEN;
use crate::error::{SamlError, SamlResult};
use crate::signature::{SignatureAlgorithm, XmlSigner};

/// Upper bound on an inflated message.
pub const MAX_INFLATED_LEN: u64 = 512 * 1024;

/// HTTP-Redirect binding encoder.
pub struct HttpRedirectBinding;

impl HttpRedirectBinding {
    /// Builds the unsigned redirect URL for a request.
    ///
    /// # Errors
    ///
    /// Returns `SamlError::Internal` if compression fails.
    pub fn encode_request(xml: &str, destination: &str, relay_state: Option<&str>) -> SamlResult<String> {
        let query = encoded_query(xml, relay_state, None)?;
        Ok(join_url(destination, &query))
    }

    /// Builds a redirect URL carrying `SigAlg` and `Signature` computed by
    /// `signer` over the query parameters.
    ///
    /// # Errors
    ///
    /// Returns `SamlError::Internal` if compression or signing fails.
    pub fn encode_signed_request(
        xml: &str,
        destination: &str,
        relay_state: Option<&str>,
        signer: &XmlSigner,
    ) -> SamlResult<String> {
        let content = encoded_query(xml, relay_state, Some(signer.algorithm().uri()))?;
        let signature = signer.sign(content.as_bytes())?;
        let query = format!("{content}&Signature={}", urlencoding::encode(&signature));
        Ok(join_url(destination, &query))
    }
}

/// A decoded `SAMLRequest` received on the redirect binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectRequest {
    /// Inflated request XML.
    pub xml: String,
    /// Decoded RelayState.
    pub relay_state: Option<String>,
    /// Decoded `SigAlg`.
    pub sig_alg: Option<String>,
    signature: Option<String>,
    signed_content: String,
}

impl RedirectRequest {
    /// Parses the raw (still percent-encoded) query string.
    ///
    /// RelayState is checked before the message is decoded.
    ///
    /// # Errors
    ///
    /// - `RelayStateTooLong` if RelayState exceeds 80 bytes.
    /// - `MalformedRequest` if `SAMLRequest` is missing or does not decode.
    pub fn from_query(raw_query: &str) -> SamlResult<Self> {
        let mut raw_request = None;
        let mut raw_relay_state = None;
        let mut raw_sig_alg = None;
        let mut raw_signature = None;
        for pair in raw_query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let slot = match key {
                "SAMLRequest" => &mut raw_request,
                "RelayState" => &mut raw_relay_state,
                "SigAlg" => &mut raw_sig_alg,
                "Signature" => &mut raw_signature,
                _ => continue,
            };
            if slot.replace(value).is_some() {
                return Err(SamlError::MalformedRequest(format!("{key} given twice")));
            }
        }

        let relay_state = raw_relay_state.map(decode_component);
        if let Some(state) = &relay_state {
            if state.len() > MAX_RELAY_STATE_LEN {
                return Err(SamlError::RelayStateTooLong(state.len()));
            }
        }

        let raw_request =
            raw_request.ok_or_else(|| SamlError::MalformedRequest("missing SAMLRequest".into()))?;
        let xml = decode_and_inflate(&decode_component(raw_request))?;

        Ok(Self {
            xml,
            relay_state,
            sig_alg: raw_sig_alg.map(decode_component),
            signature: raw_signature.map(decode_component),
            signed_content: signed_content(raw_request, raw_relay_state, raw_sig_alg),
        })
    }

    /// Verifies the query signature with the SP certificate.
    ///
    /// # Errors
    ///
    /// - `SignatureVerificationFailed` if `Signature` or `SigAlg` is
    ///   missing or the signature does not verify.
    /// - `UnsupportedSignatureAlgorithm` for DSA-SHA1 and unknown
    ///   algorithms.
    pub fn verify(&self, certificate: &Certificate) -> SamlResult<()> {
        let (Some(sig_alg), Some(signature)) = (&self.sig_alg, &self.signature) else {
            return Err(SamlError::SignatureVerificationFailed(
                "request is not signed".into(),
            ));
        };
        let hash = SignatureAlgorithm::from_uri(sig_alg)
            .and_then(|alg| alg.verification_hash())
            .ok_or_else(|| SamlError::UnsupportedSignatureAlgorithm(sig_alg.clone()))?;
        let compact: String = signature.split_whitespace().collect();
        let signature = STANDARD.decode(compact)?;
        certificate
            .verify(self.signed_content.as_bytes(), &signature, hash)
            .map_err(|_| {
                SamlError::SignatureVerificationFailed("query signature does not verify".into())
            })
    }
}

/// `SAMLRequest=..[&RelayState=..][&SigAlg=..]` from already-encoded parts.
fn signed_content(request: &str, relay_state: Option<&str>, sig_alg: Option<&str>) -> String {
    let mut content = format!("SAMLRequest={request}");
    if let Some(state) = relay_state {
        content.push_str("&RelayState=");
        content.push_str(state);
    }
    if let Some(alg) = sig_alg {
        content.push_str("&SigAlg=");
        content.push_str(alg);
    }
    content
}

fn join_url(destination: &str, query: &str) -> String {
    let separator = if destination.contains('?') { '&' } else { '?' };
    format!("{destination}{separator}{query}")
}

/// Deflates `xml` and percent-encodes every parameter.
fn encoded_query(xml: &str, relay_state: Option<&str>, sig_alg: Option<&str>) -> SamlResult<String> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(xml.as_bytes())
        .map_err(|e| SamlError::Internal(format!("deflate: {e}")))?;
    let compressed = encoder
        .finish()
        .map_err(|e| SamlError::Internal(format!("deflate: {e}")))?;
    let request = STANDARD.encode(compressed);
    let relay_state = relay_state.map(urlencoding::encode);
    let sig_alg = sig_alg.map(urlencoding::encode);
    Ok(signed_content(
        &urlencoding::encode(&request),
        relay_state.as_deref(),
        sig_alg.as_deref(),
    ))
}

fn decode_component(raw: &str) -> String {
    form_urlencoded::parse(format!("v={raw}").as_bytes())
        .next()
        .map(|(_, value)| value.into_owned())
        .unwrap_or_default()
}

/// Base64-decodes and inflates a redirect message.
///
/// # Errors
///
/// Returns `SamlError::MalformedRequest` for bad base64, bad DEFLATE data,
/// non-UTF-8 content, or output above [`MAX_INFLATED_LEN`].
pub fn decode_and_inflate(encoded: &str) -> SamlResult<String> {
    let compact: String = encoded.split_whitespace().collect();
    let compressed = STANDARD.decode(compact)?;
    let mut xml = Vec::new();
    DeflateDecoder::new(compressed.as_slice())
        .take(MAX_INFLATED_LEN + 1)
        .read_to_end(&mut xml)
        .map_err(|e| SamlError::MalformedRequest(format!("inflate: {e}")))?;
    if xml.len() as u64 > MAX_INFLATED_LEN {
        return Err(SamlError::MalformedRequest("inflated message too large".into()));
    }
    String::from_utf8(xml).map_err(|e| SamlError::MalformedRequest(format!("message is not UTF-8: {e}")))
}
