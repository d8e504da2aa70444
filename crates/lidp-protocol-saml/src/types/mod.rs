//! SAML 2.0 message types and their XML encodings.

mod artifact;
mod assertion;
mod authn_request;
mod constants;
mod metadata;
mod name_id;
mod query;
mod response;

pub use artifact::*;
pub use assertion::*;
pub use authn_request::*;
pub use constants::*;
pub use metadata::*;
pub use name_id::*;
pub use query::*;
pub use response::*;
