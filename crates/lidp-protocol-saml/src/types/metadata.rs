//! SAML 2.0 metadata documents.
//!
//! The IdP publishes an `EntityDescriptor` with SSO and attribute authority
//! roles; service providers are registered from theirs.

use serde::{Deserialize, Serialize};

use super::{MD_NS, NameIdFormat, PROTOCOL_SUPPORT, SamlBinding, XMLDSIG_NS};
use crate::error::{SamlError, SamlResult};
use crate::xml::{Element, XML_HEADER, escape, escape_attr, required_attr};

/// An `md:AssertionConsumerService` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionConsumerService {
    /// Endpoint index.
    pub index: u16,
    /// Whether this is the SP's default endpoint.
    #[serde(default)]
    pub is_default: bool,
    /// Binding URI.
    pub binding: String,
    /// Endpoint URL.
    pub location: String,
}

impl AssertionConsumerService {
    fn to_xml(&self) -> String {
        format!(
            r#"<md:AssertionConsumerService Binding="{}" Location="{}" index="{}"{}/>"#,
            escape_attr(&self.binding),
            escape_attr(&self.location),
            self.index,
            if self.is_default { r#" isDefault="true""# } else { "" }
        )
    }
}

/// The parts of an SP `EntityDescriptor` the IdP needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpMetadata {
    /// SP entity ID.
    pub entity_id: String,
    /// Base64 DER signing certificate.
    pub certificate: String,
    /// Endpoints in document order.
    pub assertion_consumer_services: Vec<AssertionConsumerService>,
}

impl SpMetadata {
    /// Parses an SP metadata document.
    ///
    /// # Errors
    ///
    /// Returns `SamlError::MalformedRequest` if the document has no
    /// `SPSSODescriptor`, no `X509Data`, or an unreadable endpoint.
    pub fn parse(xml: &str) -> SamlResult<Self> {
        let root = Element::parse(xml)?;
        if !root.is(MD_NS, "EntityDescriptor") {
            return Err(SamlError::MalformedRequest(
                "service provider entity descriptor not found".into(),
            ));
        }
        let entity_id = required_attr(&root, "entityID")?.to_string();
        let descriptor = root
            .child(MD_NS, "SPSSODescriptor")
            .ok_or_else(|| SamlError::MalformedRequest("missing SPSSODescriptor".into()))?;
        let certificate = descriptor
            .children_named(MD_NS, "KeyDescriptor")
            .filter(|k| k.attr("use").map_or(true, |u| u == "signing"))
            .filter_map(|k| k.child(XMLDSIG_NS, "KeyInfo"))
            .filter_map(|k| k.child(XMLDSIG_NS, "X509Data"))
            .find_map(|d| d.child_text(XMLDSIG_NS, "X509Certificate"))
            .ok_or_else(|| {
                SamlError::MalformedRequest(
                    "SPSSODescriptor does not contain the required X509Data element".into(),
                )
            })?;

        let assertion_consumer_services = descriptor
            .children_named(MD_NS, "AssertionConsumerService")
            .map(|acs| {
                let index = required_attr(acs, "index")?;
                Ok(AssertionConsumerService {
                    index: index.trim().parse().map_err(|_| {
                        SamlError::MalformedRequest(format!("bad ACS index {index:?}"))
                    })?,
                    is_default: matches!(acs.attr("isDefault").map(str::trim), Some("true" | "1")),
                    binding: required_attr(acs, "Binding")?.to_string(),
                    location: required_attr(acs, "Location")?.to_string(),
                })
            })
            .collect::<SamlResult<Vec<_>>>()?;

        Ok(Self {
            entity_id,
            certificate: certificate.split_whitespace().collect(),
            assertion_consumer_services,
        })
    }

    /// Renders the SP `EntityDescriptor`.
    #[must_use]
    pub fn to_xml(&self) -> String {
        let services: String = self
            .assertion_consumer_services
            .iter()
            .map(AssertionConsumerService::to_xml)
            .collect();
        format!(
            r#"{XML_HEADER}<md:EntityDescriptor xmlns:md="{MD_NS}" xmlns:ds="{XMLDSIG_NS}" entityID="{}"><md:SPSSODescriptor protocolSupportEnumeration="{PROTOCOL_SUPPORT}">{}<md:NameIDFormat>{}</md:NameIDFormat>{services}</md:SPSSODescriptor></md:EntityDescriptor>"#,
            escape_attr(&self.entity_id),
            key_descriptor(&self.certificate),
            NameIdFormat::X509SubjectName.uri()
        )
    }
}

/// Locations published in the IdP `EntityDescriptor`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdpMetadata {
    /// IdP entity ID.
    pub entity_id: String,
    /// Base64 DER signing certificate.
    pub certificate: String,
    /// HTTP-Redirect single sign-on URL.
    pub sso_location: String,
    /// SOAP artifact resolution URL.
    pub artifact_location: String,
    /// SOAP attribute service URL.
    pub attribute_location: String,
}

impl IdpMetadata {
    /// Renders the IdP `EntityDescriptor`.
    #[must_use]
    pub fn to_xml(&self) -> String {
        let key = key_descriptor(&self.certificate);
        let name_id_format = NameIdFormat::X509SubjectName.uri();
        let soap = SamlBinding::Soap.uri();
        format!(
            r#"{XML_HEADER}
<md:EntityDescriptor xmlns:md="{MD_NS}" xmlns:ds="{XMLDSIG_NS}" entityID="{entity_id}">
    <md:IDPSSODescriptor protocolSupportEnumeration="{PROTOCOL_SUPPORT}">
        {key}
        <md:ArtifactResolutionService Binding="{soap}" Location="{artifact}" index="1"/>
        <md:NameIDFormat>{name_id_format}</md:NameIDFormat>
        <md:SingleSignOnService Binding="{redirect}" Location="{sso}"/>
    </md:IDPSSODescriptor>
    <md:AttributeAuthorityDescriptor protocolSupportEnumeration="{PROTOCOL_SUPPORT}">
        {key}
        <md:AttributeService Binding="{soap}" Location="{attribute}"/>
        <md:NameIDFormat>{name_id_format}</md:NameIDFormat>
    </md:AttributeAuthorityDescriptor>
</md:EntityDescriptor>"#,
            entity_id = escape_attr(&self.entity_id),
            artifact = escape_attr(&self.artifact_location),
            redirect = SamlBinding::HttpRedirect.uri(),
            sso = escape_attr(&self.sso_location),
            attribute = escape_attr(&self.attribute_location),
        )
    }
}

fn key_descriptor(certificate: &str) -> String {
    format!(
        r#"<md:KeyDescriptor use="signing"><ds:KeyInfo><ds:X509Data><ds:X509Certificate>{}</ds:X509Certificate></ds:X509Data></ds:KeyInfo></md:KeyDescriptor>"#,
        escape(certificate)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const SP_METADATA: &str = include_str!("../../../../testdata/sp-metadata.xml");

    #[test]
    fn reads_sp_metadata() {
        let sp = SpMetadata::parse(SP_METADATA).unwrap();
        assert_eq!(sp.entity_id, "https://sp.example.com/saml");
        assert!(sp.certificate.starts_with("MIID"));
        assert!(!sp.certificate.contains(char::is_whitespace));
        assert_eq!(sp.assertion_consumer_services.len(), 2);
        let first = &sp.assertion_consumer_services[0];
        assert_eq!(first.index, 0);
        assert!(first.is_default);
        assert_eq!(first.binding, SamlBinding::HttpArtifact.uri());
        assert_eq!(first.location, "https://sp.example.com/saml/artifact");
        assert!(!sp.assertion_consumer_services[1].is_default);
    }

    #[test]
    fn missing_x509_data_is_an_error() {
        let xml = r#"<md:EntityDescriptor xmlns:md="urn:oasis:names:tc:SAML:2.0:metadata" entityID="sp"><md:SPSSODescriptor><md:KeyDescriptor/></md:SPSSODescriptor></md:EntityDescriptor>"#;
        let err = SpMetadata::parse(xml).unwrap_err();
        assert!(err.to_string().contains("X509Data"));
    }

    #[test]
    fn rendered_sp_metadata_reads_back() {
        let sp = SpMetadata::parse(SP_METADATA).unwrap();
        assert_eq!(SpMetadata::parse(&sp.to_xml()).unwrap(), sp);
    }

    #[test]
    fn idp_metadata_lists_services() {
        let xml = IdpMetadata {
            entity_id: "https://idp.example.com/".into(),
            certificate: "MIIB".into(),
            sso_location: "https://idp.example.com/SAML2/Redirect/SSO".into(),
            artifact_location: "https://idp.example.com/SAML2/SOAP/ArtifactResolution".into(),
            attribute_location: "https://idp.example.com/SAML2/SOAP/AttributeQuery".into(),
        }
        .to_xml();
        let root = Element::parse(&xml).unwrap();
        assert_eq!(root.attr("entityID"), Some("https://idp.example.com/"));
        let idp = root.child(MD_NS, "IDPSSODescriptor").unwrap();
        let ars = idp.child(MD_NS, "ArtifactResolutionService").unwrap();
        assert_eq!(ars.attr("index"), Some("1"));
        assert_eq!(ars.attr("Binding"), Some(SamlBinding::Soap.uri()));
        assert!(root.child(MD_NS, "AttributeAuthorityDescriptor").is_some());
        assert!(xml.contains("<ds:X509Certificate>MIIB</ds:X509Certificate>"));
    }
}
