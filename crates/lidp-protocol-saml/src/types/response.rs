//! SAML Response and Status types.

use chrono::{DateTime, Utc};

use super::{Assertion, Issuer, SAML_NS, SAMLP_NS, status_codes};
use crate::error::{SamlError, SamlResult};
use crate::xml::{Element, escape, escape_attr, format_instant, optional_attr, parse_instant, required_attr};

/// SAML protocol status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    /// Top-level status code URI.
    pub code: String,
    /// Optional status message.
    pub message: Option<String>,
}

impl Status {
    /// Creates a success status.
    #[must_use]
    pub fn success() -> Self {
        Self {
            code: status_codes::SUCCESS.to_string(),
            message: None,
        }
    }

    /// Creates an error status with a code URI and message.
    #[must_use]
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: Some(message.into()),
        }
    }

    /// Creates the status matching a protocol error.
    #[must_use]
    pub fn from_error(error: &SamlError) -> Self {
        Self::error(error.status_code(), error.to_string())
    }

    /// Whether the code is Success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.code == status_codes::SUCCESS
    }

    /// Renders `samlp:Status`.
    #[must_use]
    pub fn to_xml(&self) -> String {
        let message = self
            .message
            .as_ref()
            .map(|m| format!("<samlp:StatusMessage>{}</samlp:StatusMessage>", escape(m)))
            .unwrap_or_default();
        format!(
            r#"<samlp:Status><samlp:StatusCode Value="{}"/>{message}</samlp:Status>"#,
            escape(&self.code)
        )
    }

    /// Reads the `samlp:Status` child of `parent`.
    ///
    /// # Errors
    ///
    /// Returns `SamlError::MalformedRequest` if there is no status code.
    pub fn from_parent(parent: &Element) -> SamlResult<Self> {
        let status = parent
            .child(SAMLP_NS, "Status")
            .ok_or_else(|| SamlError::MalformedRequest("missing Status".into()))?;
        let code = status
            .child(SAMLP_NS, "StatusCode")
            .and_then(|c| c.attr("Value"))
            .ok_or_else(|| SamlError::MalformedRequest("missing StatusCode".into()))?;
        Ok(Self {
            code: code.to_string(),
            message: status.child_text(SAMLP_NS, "StatusMessage"),
        })
    }
}

/// SAML Response.
///
/// Built once per authentication event and rendered with its assertion
/// inline; signing happens on the rendered text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Response ID.
    pub id: String,
    /// ID of the request being answered.
    pub in_response_to: Option<String>,
    /// When the response was issued.
    pub issue_instant: DateTime<Utc>,
    /// Issuing IdP.
    pub issuer: Issuer,
    /// ACS URL the response is delivered to.
    pub destination: Option<String>,
    /// Outcome.
    pub status: Status,
    /// The assertion, absent on error responses.
    pub assertion: Option<Assertion>,
}

impl Response {
    /// Renders the `samlp:Response` element.
    #[must_use]
    pub fn to_xml(&self) -> String {
        let assertion = self
            .assertion
            .as_ref()
            .map(Assertion::to_xml)
            .unwrap_or_default();
        format!(
            r#"<samlp:Response xmlns:samlp="{SAMLP_NS}" xmlns:saml="{SAML_NS}"{} ID="{}"{} IssueInstant="{}" Version="2.0">{}{}{assertion}</samlp:Response>"#,
            optional_attr("Destination", self.destination.as_deref()),
            escape_attr(&self.id),
            optional_attr("InResponseTo", self.in_response_to.as_deref()),
            format_instant(self.issue_instant),
            self.issuer.to_xml(),
            self.status.to_xml(),
        )
    }

    /// Reads a `samlp:Response` element.
    ///
    /// # Errors
    ///
    /// Returns `SamlError::MalformedRequest` on missing or invalid parts.
    pub fn from_element(element: &Element) -> SamlResult<Self> {
        if !element.is(SAMLP_NS, "Response") {
            return Err(SamlError::MalformedRequest(format!(
                "expected Response, found {}",
                element.local_name
            )));
        }
        Ok(Self {
            id: required_attr(element, "ID")?.to_string(),
            in_response_to: element.attr("InResponseTo").map(str::to_string),
            issue_instant: parse_instant(required_attr(element, "IssueInstant")?)?,
            issuer: Issuer::from_parent(element)
                .ok_or_else(|| SamlError::MalformedRequest("Response has no Issuer".into()))?,
            destination: element.attr("Destination").map(str::to_string),
            status: Status::from_parent(element)?,
            assertion: element
                .child(SAML_NS, "Assertion")
                .map(Assertion::from_element)
                .transpose()?,
        })
    }
}
