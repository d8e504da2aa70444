//! SAML AuthnRequest types.
//!
//! Authentication request message sent by a service provider to an identity provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Issuer, SAML_NS, SAMLP_NS};
use crate::error::{SamlError, SamlResult};
use crate::xml::{Element, escape_attr, format_instant, optional_attr, parse_instant, required_attr};

/// SAML Authentication Request.
///
/// Serializable so a pending request can wait in the cache while the user
/// fills in the login form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthnRequest {
    /// Unique identifier for this request.
    pub id: String,

    /// Version of the SAML protocol (always "2.0").
    #[serde(default = "default_version")]
    pub version: String,

    /// Timestamp when this request was issued.
    pub issue_instant: DateTime<Utc>,

    /// The entity ID of the service provider issuing the request.
    pub issuer: String,

    /// The URL the request was sent to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,

    /// The URL where the response should be sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assertion_consumer_service_url: Option<String>,

    /// Index into the SP's assertion consumer service list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assertion_consumer_service_index: Option<u16>,

    /// Binding to use for the response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol_binding: Option<String>,

    /// The RelayState parameter that arrived alongside the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relay_state: Option<String>,
}

fn default_version() -> String {
    "2.0".to_string()
}

impl AuthnRequest {
    /// Creates a request with the mandatory fields.
    #[must_use]
    pub fn new(id: impl Into<String>, issuer: impl Into<String>, issue_instant: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            version: default_version(),
            issue_instant,
            issuer: issuer.into(),
            destination: None,
            assertion_consumer_service_url: None,
            assertion_consumer_service_index: None,
            protocol_binding: None,
            relay_state: None,
        }
    }

    /// Sets the destination URL.
    #[must_use]
    pub fn with_destination(mut self, url: impl Into<String>) -> Self {
        self.destination = Some(url.into());
        self
    }

    /// Sets the assertion consumer service URL.
    #[must_use]
    pub fn with_acs_url(mut self, url: impl Into<String>) -> Self {
        self.assertion_consumer_service_url = Some(url.into());
        self
    }

    /// Sets the assertion consumer service index.
    #[must_use]
    pub fn with_acs_index(mut self, index: u16) -> Self {
        self.assertion_consumer_service_index = Some(index);
        self
    }

    /// Sets the requested protocol binding URI.
    #[must_use]
    pub fn with_protocol_binding(mut self, binding: impl Into<String>) -> Self {
        self.protocol_binding = Some(binding.into());
        self
    }

    /// Renders a standalone `samlp:AuthnRequest` element.
    #[must_use]
    pub fn to_xml(&self) -> String {
        let index = self.assertion_consumer_service_index.map(|i| i.to_string());
        format!(
            r#"<samlp:AuthnRequest xmlns:samlp="{SAMLP_NS}" xmlns:saml="{SAML_NS}"{}{}{} ID="{}" IssueInstant="{}"{} Version="{}">{}</samlp:AuthnRequest>"#,
            optional_attr("AssertionConsumerServiceIndex", index.as_deref()),
            optional_attr(
                "AssertionConsumerServiceURL",
                self.assertion_consumer_service_url.as_deref()
            ),
            optional_attr("Destination", self.destination.as_deref()),
            escape_attr(&self.id),
            format_instant(self.issue_instant),
            optional_attr("ProtocolBinding", self.protocol_binding.as_deref()),
            escape_attr(&self.version),
            Issuer::new(&self.issuer).to_xml()
        )
    }

    /// Parses a request document.
    ///
    /// # Errors
    ///
    /// Returns `SamlError::MalformedRequest` if the XML is not an
    /// AuthnRequest with an ID, IssueInstant and Issuer.
    pub fn parse(xml: &str) -> SamlResult<Self> {
        Self::from_element(&Element::parse(xml)?)
    }

    /// Reads a `samlp:AuthnRequest` element.
    ///
    /// # Errors
    ///
    /// See [`AuthnRequest::parse`].
    pub fn from_element(element: &Element) -> SamlResult<Self> {
        if !element.is(SAMLP_NS, "AuthnRequest") {
            return Err(SamlError::MalformedRequest(format!(
                "expected AuthnRequest, found {}",
                element.local_name
            )));
        }
        let issuer = Issuer::from_parent(element)
            .filter(|i| !i.value.is_empty())
            .ok_or_else(|| SamlError::MalformedRequest("AuthnRequest has no Issuer".into()))?;
        let assertion_consumer_service_index = element
            .attr("AssertionConsumerServiceIndex")
            .map(|v| {
                v.trim().parse::<u16>().map_err(|_| {
                    SamlError::MalformedRequest(format!("bad AssertionConsumerServiceIndex {v:?}"))
                })
            })
            .transpose()?;
        Ok(Self {
            id: required_attr(element, "ID")?.to_string(),
            version: element.attr("Version").unwrap_or("2.0").to_string(),
            issue_instant: parse_instant(required_attr(element, "IssueInstant")?)?,
            issuer: issuer.value,
            destination: element.attr("Destination").map(str::to_string),
            assertion_consumer_service_url: element
                .attr("AssertionConsumerServiceURL")
                .map(str::to_string),
            assertion_consumer_service_index,
            protocol_binding: element.attr("ProtocolBinding").map(str::to_string),
            relay_state: None,
        })
    }
}
