//! SAML bindings implementation.
//!
//! - **HTTP-Redirect** carries signed AuthnRequests from the SP.
//! - **HTTP-POST** delivers signed responses through an HTML form.
//! - **SOAP** carries artifact resolution, attribute queries and ECP.

pub mod post;
pub mod redirect;
pub mod soap;

pub use post::*;
pub use redirect::*;
pub use soap::*;

/// Longest RelayState accepted, in bytes.
pub const MAX_RELAY_STATE_LEN: usize = 80;
