//! Response marshallers: how a finished sign-on reaches the SP.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use lidp_auth::User;
use lidp_cache::{CacheProvider, CacheProviderExt};
use lidp_protocol_saml::bindings::post::HttpPostBinding;
use lidp_protocol_saml::bindings::soap::ecp_envelope;
use lidp_protocol_saml::signature::XmlSigner;
use lidp_protocol_saml::{Artifact, SamlBinding};

use crate::error::IdpResult;
use crate::response::{ArtifactEntry, PendingRequest, ResponseTarget, make_response, sign_assertion};

/// What to send back to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// `302 Found` to an SP endpoint or back to the login form.
    Redirect(String),
    /// `307 Temporary Redirect` to the login form.
    Login(String),
    /// HTML page, the self-submitting POST form.
    Html(String),
    /// SOAP envelope.
    Soap(String),
}

/// Turns an authenticated request into a [`Dispatch`] for one binding.
#[async_trait]
pub trait ResponseMarshaller: Send + Sync {
    /// The binding handled.
    fn binding(&self) -> SamlBinding;

    /// Builds, signs where needed, and packages the response.
    async fn marshal(&self, pending: &PendingRequest, user: &User) -> IdpResult<Dispatch>;
}

/// HTTP-POST: the signed Response in a self-submitting form.
#[derive(Debug, Clone)]
pub struct PostMarshaller {
    entity_id: String,
    signer: Arc<XmlSigner>,
}

impl PostMarshaller {
    /// Creates a marshaller issuing as `entity_id`.
    #[must_use]
    pub fn new(entity_id: impl Into<String>, signer: Arc<XmlSigner>) -> Self {
        Self {
            entity_id: entity_id.into(),
            signer,
        }
    }
}

#[async_trait]
impl ResponseMarshaller for PostMarshaller {
    fn binding(&self) -> SamlBinding {
        SamlBinding::HttpPost
    }

    async fn marshal(&self, pending: &PendingRequest, user: &User) -> IdpResult<Dispatch> {
        let target = ResponseTarget::authn(&self.entity_id, pending, user);
        let response = make_response(&self.entity_id, &target, user, Utc::now());
        let signed = sign_assertion(&self.signer, &response.to_xml(), &response)?;
        Ok(Dispatch::Html(HttpPostBinding::encode_response(
            &signed,
            &pending.acs_url,
            pending.request.relay_state.as_deref(),
        )))
    }
}

/// HTTP-Artifact: stores the user and request under a fresh artifact and
/// redirects the browser to the ACS with `SAMLart`.
#[derive(Clone)]
pub struct ArtifactMarshaller {
    entity_id: String,
    cache: Arc<dyn CacheProvider>,
}

impl ArtifactMarshaller {
    /// Creates a marshaller writing artifact entries to `cache`.
    #[must_use]
    pub fn new(entity_id: impl Into<String>, cache: Arc<dyn CacheProvider>) -> Self {
        Self {
            entity_id: entity_id.into(),
            cache,
        }
    }
}

impl std::fmt::Debug for ArtifactMarshaller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactMarshaller")
            .field("entity_id", &self.entity_id)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ResponseMarshaller for ArtifactMarshaller {
    fn binding(&self) -> SamlBinding {
        SamlBinding::HttpArtifact
    }

    async fn marshal(&self, pending: &PendingRequest, user: &User) -> IdpResult<Dispatch> {
        let artifact = Artifact::new(&self.entity_id).encode();
        let entry = ArtifactEntry {
            user: user.clone(),
            request: pending.clone(),
        };
        self.cache.set_json(&artifact, &entry).await?;
        tracing::info!(sp = %pending.request.issuer, user = %user.name, "issued artifact");

        let mut query = format!("SAMLart={}", urlencoding::encode(&artifact));
        if let Some(state) = &pending.request.relay_state {
            query.push_str("&RelayState=");
            query.push_str(&urlencoding::encode(state));
        }
        let separator = if pending.acs_url.contains('?') { '&' } else { '?' };
        Ok(Dispatch::Redirect(format!(
            "{}{separator}{query}",
            pending.acs_url
        )))
    }
}

/// ECP: the signed Response inside a PAOS envelope with the ECP headers.
#[derive(Debug, Clone)]
pub struct EcpMarshaller {
    entity_id: String,
    signer: Arc<XmlSigner>,
}

impl EcpMarshaller {
    /// Creates a marshaller issuing as `entity_id`.
    #[must_use]
    pub fn new(entity_id: impl Into<String>, signer: Arc<XmlSigner>) -> Self {
        Self {
            entity_id: entity_id.into(),
            signer,
        }
    }
}

#[async_trait]
impl ResponseMarshaller for EcpMarshaller {
    fn binding(&self) -> SamlBinding {
        SamlBinding::Paos
    }

    async fn marshal(&self, pending: &PendingRequest, user: &User) -> IdpResult<Dispatch> {
        let target = ResponseTarget::authn(&self.entity_id, pending, user);
        let response = make_response(&self.entity_id, &target, user, Utc::now());
        let signed = sign_assertion(&self.signer, &response.to_xml(), &response)?;
        Ok(Dispatch::Soap(ecp_envelope(&pending.acs_url, &signed)))
    }
}
