//! SAML 2.0 protocol support for the identity provider.
//!
//! - [`types`] - protocol messages and metadata with their XML encodings
//! - [`xml`] - namespace-aware tree and exclusive canonicalization
//! - [`signature`] - enveloped XML-DSig creation and validation
//! - [`bindings`] - HTTP-Redirect, HTTP-POST and SOAP
//! - [`error`] - the protocol error taxonomy
//!
//! Messages are rendered to text, then signed by element ID, so nothing may
//! touch a message after [`signature::XmlSigner::sign_element`] returns.
//!
//! # SAML Specifications
//!
//! - [SAML 2.0 Core](https://docs.oasis-open.org/security/saml/v2.0/saml-core-2.0-os.pdf)
//! - [SAML 2.0 Bindings](https://docs.oasis-open.org/security/saml/v2.0/saml-bindings-2.0-os.pdf)
//! - [SAML 2.0 Profiles](https://docs.oasis-open.org/security/saml/v2.0/saml-profiles-2.0-os.pdf)
//! - [Exclusive XML Canonicalization](https://www.w3.org/TR/xml-exc-c14n/)
//! - [XML Signature](https://www.w3.org/TR/xmldsig-core1/)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bindings;
pub mod error;
pub mod signature;
pub mod types;
pub mod xml;

pub use error::{SamlError, SamlResult};
pub use types::*;
