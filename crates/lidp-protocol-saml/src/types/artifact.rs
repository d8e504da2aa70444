//! SAML 2.0 artifacts and the artifact resolution messages.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};

use super::{Issuer, Response, SAML_NS, SAMLP_NS, Status};
use crate::error::{SamlError, SamlResult};
use crate::xml::{Element, escape, escape_attr, format_instant, parse_instant, required_attr};

/// Length of a type 0x0004 artifact.
pub const ARTIFACT_LEN: usize = 44;

/// Type code of SAML 2.0 artifacts.
pub const ARTIFACT_TYPE_CODE: u16 = 0x0004;

/// Endpoint index of the artifact resolution service.
pub const ARTIFACT_ENDPOINT_INDEX: u16 = 1;

/// A type 0x0004 artifact: type code, endpoint index, SHA-1 of the issuer
/// entity ID and a SHA-1 message handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Artifact([u8; ARTIFACT_LEN]);

impl Artifact {
    /// Creates a fresh artifact for `entity_id` with a random message handle.
    #[must_use]
    pub fn new(entity_id: &str) -> Self {
        let handle = lidp_crypto::sha1(lidp_crypto::new_key().as_bytes());
        Self::from_parts(entity_id, &handle)
    }

    fn from_parts(entity_id: &str, handle: &[u8]) -> Self {
        let mut bytes = [0u8; ARTIFACT_LEN];
        bytes[0..2].copy_from_slice(&ARTIFACT_TYPE_CODE.to_be_bytes());
        bytes[2..4].copy_from_slice(&ARTIFACT_ENDPOINT_INDEX.to_be_bytes());
        bytes[4..24].copy_from_slice(&lidp_crypto::sha1(entity_id.as_bytes()));
        bytes[24..44].copy_from_slice(handle);
        Self(bytes)
    }

    /// Decodes the base64 transport form.
    ///
    /// # Errors
    ///
    /// Returns `SamlError::MalformedRequest` unless the value decodes to 44
    /// bytes with type code 0x0004.
    pub fn decode(encoded: &str) -> SamlResult<Self> {
        let bytes = STANDARD.decode(encoded.trim())?;
        let bytes: [u8; ARTIFACT_LEN] = bytes.try_into().map_err(|b: Vec<u8>| {
            SamlError::MalformedRequest(format!("artifact has {} bytes", b.len()))
        })?;
        let artifact = Self(bytes);
        if artifact.type_code() != ARTIFACT_TYPE_CODE {
            return Err(SamlError::MalformedRequest(format!(
                "unsupported artifact type {:#06x}",
                artifact.type_code()
            )));
        }
        Ok(artifact)
    }

    /// Base64 transport form, also used as the cache key.
    #[must_use]
    pub fn encode(&self) -> String {
        STANDARD.encode(self.0)
    }

    /// Raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; ARTIFACT_LEN] {
        &self.0
    }

    /// Artifact type code.
    #[must_use]
    pub const fn type_code(&self) -> u16 {
        u16::from_be_bytes([self.0[0], self.0[1]])
    }

    /// Endpoint index.
    #[must_use]
    pub const fn endpoint_index(&self) -> u16 {
        u16::from_be_bytes([self.0[2], self.0[3]])
    }

    /// SHA-1 of the issuing entity ID.
    #[must_use]
    pub fn source_id(&self) -> &[u8] {
        &self.0[4..24]
    }

    /// Whether the artifact was issued by `entity_id`.
    #[must_use]
    pub fn is_from(&self, entity_id: &str) -> bool {
        self.source_id() == lidp_crypto::sha1(entity_id.as_bytes()).as_slice()
    }
}

/// `samlp:ArtifactResolve`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactResolve {
    /// Request ID.
    pub id: String,
    /// When the request was issued.
    pub issue_instant: DateTime<Utc>,
    /// Requesting SP.
    pub issuer: String,
    /// Base64 artifact.
    pub artifact: String,
}

impl ArtifactResolve {
    /// Renders the element.
    #[must_use]
    pub fn to_xml(&self) -> String {
        format!(
            r#"<samlp:ArtifactResolve xmlns:samlp="{SAMLP_NS}" xmlns:saml="{SAML_NS}" ID="{}" IssueInstant="{}" Version="2.0">{}<samlp:Artifact>{}</samlp:Artifact></samlp:ArtifactResolve>"#,
            escape_attr(&self.id),
            format_instant(self.issue_instant),
            Issuer::new(&self.issuer).to_xml(),
            escape(&self.artifact)
        )
    }

    /// Reads a `samlp:ArtifactResolve` element.
    ///
    /// # Errors
    ///
    /// Returns `SamlError::MalformedRequest` on missing parts.
    pub fn from_element(element: &Element) -> SamlResult<Self> {
        if !element.is(SAMLP_NS, "ArtifactResolve") {
            return Err(SamlError::MalformedRequest(format!(
                "expected ArtifactResolve, found {}",
                element.local_name
            )));
        }
        Ok(Self {
            id: required_attr(element, "ID")?.to_string(),
            issue_instant: parse_instant(required_attr(element, "IssueInstant")?)?,
            issuer: Issuer::from_parent(element)
                .map(|i| i.value)
                .ok_or_else(|| SamlError::MalformedRequest("ArtifactResolve has no Issuer".into()))?,
            artifact: element
                .child_text(SAMLP_NS, "Artifact")
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .ok_or_else(|| SamlError::MalformedRequest("ArtifactResolve has no Artifact".into()))?,
        })
    }
}

/// `samlp:ArtifactResponse`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactResponse {
    /// Response ID.
    pub id: String,
    /// ID of the ArtifactResolve being answered.
    pub in_response_to: String,
    /// When the response was issued.
    pub issue_instant: DateTime<Utc>,
    /// Issuing IdP.
    pub issuer: Issuer,
    /// Outcome of the resolution.
    pub status: Status,
    /// The resolved message.
    pub response: Option<Response>,
}

impl ArtifactResponse {
    /// Renders the element with the resolved Response inline.
    #[must_use]
    pub fn to_xml(&self) -> String {
        let response = self
            .response
            .as_ref()
            .map(Response::to_xml)
            .unwrap_or_default();
        format!(
            r#"<samlp:ArtifactResponse xmlns:samlp="{SAMLP_NS}" xmlns:saml="{SAML_NS}" ID="{}" InResponseTo="{}" IssueInstant="{}" Version="2.0">{}{}{response}</samlp:ArtifactResponse>"#,
            escape_attr(&self.id),
            escape_attr(&self.in_response_to),
            format_instant(self.issue_instant),
            self.issuer.to_xml(),
            self.status.to_xml()
        )
    }

    /// Reads a `samlp:ArtifactResponse` element.
    ///
    /// # Errors
    ///
    /// Returns `SamlError::MalformedRequest` on missing or invalid parts.
    pub fn from_element(element: &Element) -> SamlResult<Self> {
        if !element.is(SAMLP_NS, "ArtifactResponse") {
            return Err(SamlError::MalformedRequest(format!(
                "expected ArtifactResponse, found {}",
                element.local_name
            )));
        }
        Ok(Self {
            id: required_attr(element, "ID")?.to_string(),
            in_response_to: required_attr(element, "InResponseTo")?.to_string(),
            issue_instant: parse_instant(required_attr(element, "IssueInstant")?)?,
            issuer: Issuer::from_parent(element)
                .ok_or_else(|| SamlError::MalformedRequest("ArtifactResponse has no Issuer".into()))?,
            status: Status::from_parent(element)?,
            response: element
                .child(SAMLP_NS, "Response")
                .map(Response::from_element)
                .transpose()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn artifact_layout() {
        let artifact = Artifact::new("https://idp.example.com/");
        let bytes = artifact.as_bytes();
        assert_eq!(bytes.len(), 44);
        assert_eq!(&bytes[0..4], &[0, 4, 0, 1]);
        assert_eq!(
            artifact.source_id(),
            lidp_crypto::sha1(b"https://idp.example.com/").as_slice()
        );
        assert!(artifact.is_from("https://idp.example.com/"));
        assert!(!artifact.is_from("https://other.example.com/"));
        assert_ne!(Artifact::new("https://idp.example.com/"), artifact);
    }

    #[test]
    fn artifact_transport_form() {
        let artifact = Artifact::new("https://idp.example.com/");
        let encoded = artifact.encode();
        assert_eq!(encoded.len(), 60);
        assert_eq!(Artifact::decode(&encoded).unwrap(), artifact);
    }

    #[test]
    fn artifact_decode_rejects_garbage() {
        assert!(Artifact::decode("not base64!").is_err());
        assert!(Artifact::decode(&STANDARD.encode([0u8; 20])).is_err());
        let mut wrong_type = [0u8; 44];
        wrong_type[1] = 3;
        assert!(Artifact::decode(&STANDARD.encode(wrong_type)).is_err());
    }

    #[test]
    fn artifact_resolve_parses() {
        let resolve = ArtifactResolve {
            id: "_res".to_string(),
            issue_instant: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            issuer: "https://sp.example.com/saml".to_string(),
            artifact: Artifact::new("https://idp.example.com/").encode(),
        };
        let parsed = ArtifactResolve::from_element(&Element::parse(&resolve.to_xml()).unwrap()).unwrap();
        assert_eq!(parsed, resolve);
    }
}
