//! Service provider side of the artifact and attribute query profiles.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, info, warn};

use lidp_cache::CacheProvider;
use lidp_crypto::{new_id, new_key};
use lidp_protocol_saml::bindings::redirect::HttpRedirectBinding;
use lidp_protocol_saml::bindings::soap::{SOAP_ACTION, SoapEnvelope, soap_envelope};
use lidp_protocol_saml::signature::{SignatureValidator, XmlSigner};
use lidp_protocol_saml::{
    ArtifactResolve, Assertion, AssertionConsumerService, AttributeQuery, AuthnRequest, NameId, NameIdFormat,
    SAML_NS, SAMLP_NS, SamlBinding, SpMetadata, Status,
};

use crate::config::SpConfig;
use crate::error::{SpError, SpResult};

/// A SAML service provider using the HTTP-Artifact binding.
pub struct ServiceProvider {
    config: SpConfig,
    signer: XmlSigner,
    client: Client,
    state_cache: Option<Arc<dyn CacheProvider>>,
}

impl std::fmt::Debug for ServiceProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceProvider")
            .field("entity_id", &self.config.entity_id)
            .field("state_cache", &self.state_cache.is_some())
            .finish_non_exhaustive()
    }
}

impl ServiceProvider {
    /// Creates a client signing its requests with `signer`.
    ///
    /// Without a state cache the application state itself travels as
    /// RelayState.
    #[must_use]
    pub fn new(config: SpConfig, signer: XmlSigner) -> Self {
        Self {
            config,
            signer,
            client: Client::new(),
            state_cache: None,
        }
    }

    /// Uses `client` for SOAP calls, e.g. one carrying a TLS identity.
    #[must_use]
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Keeps application state in `cache`; RelayState becomes its key.
    #[must_use]
    pub fn with_state_cache(mut self, cache: Arc<dyn CacheProvider>) -> Self {
        self.state_cache = Some(cache);
        self
    }

    /// Client configuration.
    #[must_use]
    pub fn config(&self) -> &SpConfig {
        &self.config
    }

    /// URL sending the browser to the IdP with a signed AuthnRequest that
    /// asks for an artifact at the configured ACS.
    ///
    /// # Errors
    ///
    /// Fails if the state cannot be stored or the request signed.
    pub async fn redirect_url(&self, state: &[u8]) -> SpResult<String> {
        let relay_state = match &self.state_cache {
            Some(cache) => {
                let key = new_key();
                cache.set(&key, state.to_vec()).await?;
                key
            }
            None => String::from_utf8_lossy(state).into_owned(),
        };
        let request = AuthnRequest::new(new_id(), &self.config.entity_id, Utc::now())
            .with_destination(&self.config.idp_redirect_endpoint)
            .with_acs_url(&self.config.assertion_consumer_service_url)
            .with_protocol_binding(SamlBinding::HttpArtifact.uri());
        debug!(id = %request.id, "built authentication request");
        Ok(HttpRedirectBinding::encode_signed_request(
            &request.to_xml(),
            &self.config.idp_redirect_endpoint,
            Some(&relay_state),
            &self.signer,
        )?)
    }

    /// Application state for the RelayState the IdP sent back. Cached
    /// state is released once.
    ///
    /// # Errors
    ///
    /// `MissingRelayState` when absent, `InvalidRelayState` when unknown.
    pub async fn retrieve_state(&self, relay_state: Option<&str>) -> SpResult<Vec<u8>> {
        let relay_state = relay_state.filter(|s| !s.is_empty()).ok_or_else(|| {
            info!("received a request without RelayState");
            SpError::MissingRelayState
        })?;
        match &self.state_cache {
            None => Ok(relay_state.as_bytes().to_vec()),
            Some(cache) => cache.take(relay_state).await.map_err(|_| {
                info!("RelayState not found in cache");
                SpError::InvalidRelayState
            }),
        }
    }

    /// Resolves `artifact` over SOAP and returns the signed assertion.
    ///
    /// # Errors
    ///
    /// Transport errors, SOAP faults, non-200 answers, answers without an
    /// assertion, and assertions not signed by the IdP.
    pub async fn resolve_artifact(&self, artifact: &str) -> SpResult<Assertion> {
        let resolve = ArtifactResolve {
            id: new_id(),
            issue_instant: Utc::now(),
            issuer: self.config.entity_id.clone(),
            artifact: artifact.to_string(),
        };
        let signed = self.signer.sign_element(&resolve.to_xml(), &resolve.id)?;
        let body = self.post_soap(&self.config.idp_artifact_endpoint, signed).await?;
        self.signed_assertion(&body)
    }

    /// Asks the IdP for the attributes of an X.509 subject.
    ///
    /// # Errors
    ///
    /// See [`ServiceProvider::resolve_artifact`].
    pub async fn query(&self, name_id: &str) -> SpResult<Assertion> {
        let query = AttributeQuery {
            id: new_id(),
            issue_instant: Utc::now(),
            issuer: self.config.entity_id.clone(),
            destination: Some(self.config.idp_query_endpoint.clone()),
            name_id: NameId::new(name_id, NameIdFormat::X509SubjectName.uri()),
        };
        let signed = self.signer.sign_element(&query.to_xml(), &query.id)?;
        let body = self.post_soap(&self.config.idp_query_endpoint, signed).await?;
        self.signed_assertion(&body)
    }

    /// Checks the assertion's conditions against the clock, allowing the
    /// configured margin either way.
    ///
    /// # Errors
    ///
    /// `InvalidTime` when expired or not yet valid.
    pub fn validate_assertion(&self, assertion: &Assertion) -> SpResult<()> {
        self.validate_assertion_at(assertion, Utc::now())
    }

    fn validate_assertion_at(&self, assertion: &Assertion, now: DateTime<Utc>) -> SpResult<()> {
        let Some(conditions) = &assertion.conditions else {
            return Ok(());
        };
        let margin = chrono::Duration::from_std(self.config.timestamp_margin)
            .unwrap_or_else(|_| chrono::Duration::zero());
        if now - margin >= conditions.not_on_or_after {
            return Err(SpError::InvalidTime(format!(
                "expired at {}",
                conditions.not_on_or_after
            )));
        }
        if now + margin < conditions.not_before {
            return Err(SpError::InvalidTime(format!(
                "not valid before {}",
                conditions.not_before
            )));
        }
        Ok(())
    }

    /// SP metadata with the signing certificate and the artifact ACS.
    #[must_use]
    pub fn metadata(&self) -> String {
        SpMetadata {
            entity_id: self.config.entity_id.clone(),
            certificate: self.signer.certificate().to_base64(),
            assertion_consumer_services: vec![AssertionConsumerService {
                index: 0,
                is_default: true,
                binding: SamlBinding::HttpArtifact.uri().to_string(),
                location: self.config.assertion_consumer_service_url.clone(),
            }],
        }
        .to_xml()
    }

    async fn post_soap(&self, endpoint: &str, message: String) -> SpResult<String> {
        let response = self
            .client
            .post(endpoint)
            .header(CONTENT_TYPE, "text/xml")
            .header("SOAPAction", SOAP_ACTION)
            .body(soap_envelope(&message))
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if status.as_u16() != 200 {
            if let Some((code, message)) = SoapEnvelope::parse(&body).ok().and_then(|e| e.fault()) {
                warn!(%code, %message, "identity provider returned a fault");
                return Err(SpError::Fault { code, message });
            }
            return Err(SpError::UnexpectedStatus(status.as_u16()));
        }
        Ok(body)
    }

    /// The assertion inside a SOAP answer, taken from the copy the IdP
    /// signature covers.
    fn signed_assertion(&self, body: &str) -> SpResult<Assertion> {
        let envelope = SoapEnvelope::parse(body)?;
        let payload = envelope.payload()?;
        // An ArtifactResponse wraps the Response unless resolution failed.
        let status = Status::from_parent(payload.child(SAMLP_NS, "Response").unwrap_or(payload))?;
        if !status.is_success() {
            return Err(SpError::NoAssertion(status.code));
        }

        let validated = SignatureValidator::new(vec![self.config.idp_certificate.clone()])
            .validate_element(envelope.root())
            .map_err(|err| {
                warn!(error = %err, "assertion signature did not verify");
                err
            })?;
        let assertion = validated
            .iter()
            .find(|e| e.is(SAML_NS, "Assertion"))
            .ok_or_else(|| SpError::NoAssertion(status.code.clone()))?;
        Ok(Assertion::from_element(assertion)?)
    }
}
