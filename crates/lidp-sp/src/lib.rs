//! # lidp-sp
//!
//! Companion SAML 2.0 service provider for the lite identity provider:
//! sends signed AuthnRequests over HTTP-Redirect, receives artifacts,
//! resolves them over SOAP and issues attribute queries.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use lidp_sp::{ServiceProvider, SpConfig, artifact_router};
//!
//! let sp = Arc::new(ServiceProvider::new(config, signer));
//! let location = sp.redirect_url(b"/home").await?;
//! let app = artifact_router("/saml/artifact", sp, Arc::new(|_state, _assertion| Redirect::to("/").into_response()));
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod client;
pub mod config;
pub mod error;
pub mod handler;

pub use client::ServiceProvider;
pub use config::SpConfig;
pub use error::{SpError, SpResult};
pub use handler::{ArtifactCallback, artifact_router};
