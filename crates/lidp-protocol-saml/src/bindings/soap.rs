//! SOAP 1.1 binding: envelopes for artifact resolution, attribute query
//! and ECP, plus SOAP faults.

use crate::error::{SamlError, SamlResult};
use crate::types::{ECP_NS, SOAP_ENV_NS};
use crate::xml::{Element, XML_HEADER, escape, escape_attr};

/// `SOAPAction` header value for SAML SOAP requests.
pub const SOAP_ACTION: &str = "http://www.oasis-open.org/committees/security";

/// SOAP actor for headers aimed at the next hop.
pub const SOAP_ACTOR_NEXT: &str = "http://schemas.xmlsoap.org/soap/actor/next";

/// A parsed SOAP envelope.
#[derive(Debug, Clone)]
pub struct SoapEnvelope {
    root: Element,
}

impl SoapEnvelope {
    /// Parses an envelope, requiring a `Body`.
    ///
    /// # Errors
    ///
    /// Returns `SamlError::MalformedRequest` if the document is not a SOAP
    /// 1.1 envelope with a body.
    pub fn parse(xml: &str) -> SamlResult<Self> {
        let root = Element::parse(xml)?;
        if !root.is(SOAP_ENV_NS, "Envelope") {
            return Err(SamlError::MalformedRequest("not a SOAP envelope".into()));
        }
        if root.child(SOAP_ENV_NS, "Body").is_none() {
            return Err(SamlError::MalformedRequest("SOAP envelope has no Body".into()));
        }
        Ok(Self { root })
    }

    /// The whole envelope, for signature validation.
    #[must_use]
    pub fn root(&self) -> &Element {
        &self.root
    }

    /// The `Header` element, if any.
    #[must_use]
    pub fn header(&self) -> Option<&Element> {
        self.root.child(SOAP_ENV_NS, "Header")
    }

    /// The first element inside `Body`.
    ///
    /// # Errors
    ///
    /// Returns `SamlError::MalformedRequest` for an empty body.
    pub fn payload(&self) -> SamlResult<&Element> {
        self.root
            .child(SOAP_ENV_NS, "Body")
            .and_then(|body| body.elements().next())
            .ok_or_else(|| SamlError::MalformedRequest("SOAP Body is empty".into()))
    }

    /// `(faultcode, faultstring)` when the body is a fault.
    #[must_use]
    pub fn fault(&self) -> Option<(String, String)> {
        let fault = self.payload().ok().filter(|p| p.is(SOAP_ENV_NS, "Fault"))?;
        let text = |name: &str| {
            fault
                .elements()
                .find(|e| e.local_name == name)
                .map(|e| e.text().trim().to_string())
                .unwrap_or_default()
        };
        Some((text("faultcode"), text("faultstring")))
    }
}

/// Wraps a message in a SOAP envelope with the XML declaration.
#[must_use]
pub fn soap_envelope(body: &str) -> String {
    format!(
        r#"{XML_HEADER}<SOAP-ENV:Envelope xmlns:SOAP-ENV="{SOAP_ENV_NS}"><SOAP-ENV:Body>{body}</SOAP-ENV:Body></SOAP-ENV:Envelope>"#
    )
}

/// A SOAP fault envelope.
#[must_use]
pub fn soap_fault(code: &str, message: &str) -> String {
    soap_envelope(&format!(
        "<SOAP-ENV:Fault><faultcode>{}</faultcode><faultstring>{}</faultstring></SOAP-ENV:Fault>",
        escape(code),
        escape(message)
    ))
}

/// ECP response envelope: `ecp:Response` and `ecp:RequestAuthenticated`
/// headers around the signed SAML Response.
#[must_use]
pub fn ecp_envelope(acs_url: &str, response: &str) -> String {
    format!(
        r#"{XML_HEADER}<SOAP-ENV:Envelope xmlns:SOAP-ENV="{SOAP_ENV_NS}"><SOAP-ENV:Header><ecp:Response xmlns:ecp="{ECP_NS}" SOAP-ENV:mustUnderstand="1" SOAP-ENV:actor="{SOAP_ACTOR_NEXT}" AssertionConsumerServiceURL="{}"/><ecp:RequestAuthenticated xmlns:ecp="{ECP_NS}" SOAP-ENV:actor="{SOAP_ACTOR_NEXT}"/></SOAP-ENV:Header><SOAP-ENV:Body>{response}</SOAP-ENV:Body></SOAP-ENV:Envelope>"#,
        escape_attr(acs_url)
    )
}
