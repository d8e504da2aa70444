//! Issuer and NameID elements.

use serde::{Deserialize, Serialize};

use super::{NameIdFormat, SAML_NS};
use crate::error::{SamlError, SamlResult};
use crate::xml::{Element, escape, optional_attr};

/// `saml:Issuer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issuer {
    /// Entity ID.
    pub value: String,
    /// Optional `Format` attribute.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl Issuer {
    /// Issuer without a format attribute.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            format: None,
        }
    }

    /// Issuer with the `entity` format, as placed on every IdP-issued
    /// response and assertion.
    #[must_use]
    pub fn entity(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            format: Some(NameIdFormat::Entity.uri().to_string()),
        }
    }

    /// Renders the element with the `saml` prefix.
    #[must_use]
    pub fn to_xml(&self) -> String {
        format!(
            "<saml:Issuer{}>{}</saml:Issuer>",
            optional_attr("Format", self.format.as_deref()),
            escape(&self.value)
        )
    }

    /// Reads the `saml:Issuer` child of `parent`, if any.
    #[must_use]
    pub fn from_parent(parent: &Element) -> Option<Self> {
        parent.child(SAML_NS, "Issuer").map(|e| Self {
            value: e.text().trim().to_string(),
            format: e.attr("Format").map(str::to_string),
        })
    }
}

/// `saml:NameID`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NameId {
    /// Subject identifier.
    pub value: String,
    /// `Format` URI.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// `NameQualifier` (the IdP entity ID).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_qualifier: Option<String>,
    /// `SPNameQualifier` (the requesting SP).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sp_name_qualifier: Option<String>,
}

impl NameId {
    /// NameID with a value and format.
    #[must_use]
    pub fn new(value: impl Into<String>, format: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            format: Some(format.into()),
            name_qualifier: None,
            sp_name_qualifier: None,
        }
    }

    /// Sets both qualifiers.
    #[must_use]
    pub fn with_qualifiers(mut self, idp: impl Into<String>, sp: impl Into<String>) -> Self {
        self.name_qualifier = Some(idp.into());
        self.sp_name_qualifier = Some(sp.into());
        self
    }

    /// Renders the element with the `saml` prefix.
    #[must_use]
    pub fn to_xml(&self) -> String {
        format!(
            "<saml:NameID{}{}{}>{}</saml:NameID>",
            optional_attr("Format", self.format.as_deref()),
            optional_attr("NameQualifier", self.name_qualifier.as_deref()),
            optional_attr("SPNameQualifier", self.sp_name_qualifier.as_deref()),
            escape(&self.value)
        )
    }

    /// Parses a `saml:NameID` element.
    ///
    /// # Errors
    ///
    /// Returns `SamlError::MalformedRequest` if the element is not a NameID.
    pub fn from_element(element: &Element) -> SamlResult<Self> {
        if !element.is(SAML_NS, "NameID") {
            return Err(SamlError::MalformedRequest(format!(
                "expected NameID, found {}",
                element.local_name
            )));
        }
        Ok(Self {
            value: element.text().trim().to_string(),
            format: element.attr("Format").map(str::to_string),
            name_qualifier: element.attr("NameQualifier").map(str::to_string),
            sp_name_qualifier: element.attr("SPNameQualifier").map(str::to_string),
        })
    }
}
