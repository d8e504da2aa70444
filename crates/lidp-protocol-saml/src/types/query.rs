//! SAML AttributeQuery.

use chrono::{DateTime, Utc};

use super::{Issuer, NameId, SAML_NS, SAMLP_NS};
use crate::error::{SamlError, SamlResult};
use crate::xml::{Element, escape_attr, format_instant, optional_attr, parse_instant, required_attr};

/// `samlp:AttributeQuery` asking for every attribute of a subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeQuery {
    /// Request ID.
    pub id: String,
    /// When the query was issued.
    pub issue_instant: DateTime<Utc>,
    /// Requesting SP.
    pub issuer: String,
    /// Attribute service URL.
    pub destination: Option<String>,
    /// Subject whose attributes are requested.
    pub name_id: NameId,
}

impl AttributeQuery {
    /// Renders the element.
    #[must_use]
    pub fn to_xml(&self) -> String {
        format!(
            r#"<samlp:AttributeQuery xmlns:samlp="{SAMLP_NS}" xmlns:saml="{SAML_NS}"{} ID="{}" IssueInstant="{}" Version="2.0">{}<saml:Subject>{}</saml:Subject></samlp:AttributeQuery>"#,
            optional_attr("Destination", self.destination.as_deref()),
            escape_attr(&self.id),
            format_instant(self.issue_instant),
            Issuer::new(&self.issuer).to_xml(),
            self.name_id.to_xml()
        )
    }

    /// Reads a `samlp:AttributeQuery` element.
    ///
    /// # Errors
    ///
    /// Returns `SamlError::MalformedRequest` on missing parts.
    pub fn from_element(element: &Element) -> SamlResult<Self> {
        if !element.is(SAMLP_NS, "AttributeQuery") {
            return Err(SamlError::MalformedRequest(format!(
                "expected AttributeQuery, found {}",
                element.local_name
            )));
        }
        let name_id = element
            .child(SAML_NS, "Subject")
            .and_then(|s| s.child(SAML_NS, "NameID"))
            .ok_or_else(|| SamlError::MalformedRequest("AttributeQuery has no Subject NameID".into()))?;
        Ok(Self {
            id: required_attr(element, "ID")?.to_string(),
            issue_instant: parse_instant(required_attr(element, "IssueInstant")?)?,
            issuer: Issuer::from_parent(element)
                .map(|i| i.value)
                .ok_or_else(|| SamlError::MalformedRequest("AttributeQuery has no Issuer".into()))?,
            destination: element.attr("Destination").map(str::to_string),
            name_id: NameId::from_element(name_id)?,
        })
    }
}
