//! # lidp-idp
//!
//! SAML 2.0 identity provider engine.
//!
//! - [`IdentityProvider`]: HTTP-Redirect SSO, login form, artifact
//!   resolution, attribute query and ECP
//! - [`ServiceProviderRegistry`]: trusted SPs loaded from metadata
//! - [`make_response`]: the one place assertions are built
//! - [`ResponseMarshaller`]: HTTP-POST, HTTP-Artifact and PAOS delivery
//! - [`AttributeRetriever`]: attribute sources merged per user
//! - [`idp_router`]: axum routes for all of the above
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use lidp_idp::{IdentityProvider, IdpConfig, idp_router};
//!
//! let idp = IdentityProvider::new(IdpConfig::new("idp.example.com"), signer)
//!     .with_registry(registry);
//! let app = idp_router(Arc::new(idp));
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod attributes;
pub mod audit;
pub mod config;
pub mod engine;
pub mod error;
pub mod marshal;
pub mod registry;
pub mod response;
pub mod routes;

pub use attributes::{
    AttributeRetriever, Attributes, CacheRetriever, JsonFileRetriever, StaticRetriever,
    collect_attributes,
};
pub use audit::{Auditor, LoginType, TracingAuditor};
pub use config::IdpConfig;
pub use engine::{
    ClientCertificate, INVALID_LOGIN_MESSAGE, IdentityProvider, LOGIN_PATH, Outcome,
    RequestContext, login_url,
};
pub use error::{IdpError, IdpResult};
pub use marshal::{ArtifactMarshaller, Dispatch, EcpMarshaller, PostMarshaller, ResponseMarshaller};
pub use registry::{ServiceProvider, ServiceProviderRegistry};
pub use response::{
    ArtifactEntry, PendingRequest, ResponseTarget, assertion_lifetime, make_response,
    sign_assertion,
};
pub use routes::{IdpState, idp_router};
