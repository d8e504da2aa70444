//! The identity provider engine.
//!
//! [`IdentityProvider`] owns everything a request needs: configuration,
//! signing key, SP registry, caches, authenticators, attribute sources,
//! auditor and response marshallers. HTTP handlers in [`crate::routes`]
//! only translate between axum and the operations here.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use lidp_auth::{
    AuthContext, AuthError, Authenticator, PasswordAuthenticator, PasswordValidator,
    PkiAuthenticator, StaticPasswordValidator, User,
};
use lidp_cache::{CacheProvider, CacheProviderExt, InMemoryCache};
use lidp_crypto::{new_id, new_key};
use lidp_protocol_saml::bindings::redirect::RedirectRequest;
use lidp_protocol_saml::bindings::soap::{SoapEnvelope, soap_envelope};
use lidp_protocol_saml::signature::{SignatureValidator, XmlSigner};
use lidp_protocol_saml::xml::Element;
use lidp_protocol_saml::{
    Artifact, ArtifactResolve, ArtifactResponse, AttributeQuery, AuthnContextClass, AuthnRequest,
    IdpMetadata, Issuer, NameIdFormat, SamlBinding, SamlError, Status, XMLDSIG_NS,
};

use crate::attributes::{AttributeRetriever, collect_attributes};
use crate::audit::{Auditor, LoginType, TracingAuditor};
use crate::config::IdpConfig;
use crate::error::IdpResult;
use crate::marshal::{ArtifactMarshaller, Dispatch, EcpMarshaller, PostMarshaller, ResponseMarshaller};
use crate::registry::{ServiceProvider, ServiceProviderRegistry};
use crate::response::{
    ArtifactEntry, PendingRequest, ResponseTarget, make_response, sign_assertion,
};

/// Path of the login form.
pub const LOGIN_PATH: &str = "/ui/login.html";

/// Message shown on the login form after a rejected password.
pub const INVALID_LOGIN_MESSAGE: &str = "Invalid login or password. Please try again.";

/// DER certificate chain the client presented during the TLS handshake,
/// leaf first. The server inserts it as a request extension.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientCertificate(pub Vec<Vec<u8>>);

/// Transport facts about one request.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Client IP address, empty when unknown.
    pub ip: String,
    /// Verified client certificate chain.
    pub client_certificate: Option<ClientCertificate>,
    /// Value of the session cookie.
    pub session_id: Option<String>,
}

impl RequestContext {
    /// Context for a client at `ip`.
    #[must_use]
    pub fn new(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            ..Self::default()
        }
    }

    /// Sets the client certificate chain.
    #[must_use]
    pub fn with_client_certificate(mut self, chain: Vec<Vec<u8>>) -> Self {
        self.client_certificate = Some(ClientCertificate(chain));
        self
    }

    /// Sets the session cookie value.
    #[must_use]
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// Result of a browser-facing operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// What to send back.
    pub dispatch: Dispatch,
    /// New session to set as a cookie.
    pub session: Option<String>,
}

impl Outcome {
    fn without_session(dispatch: Dispatch) -> Self {
        Self {
            dispatch,
            session: None,
        }
    }
}

/// SAML 2.0 identity provider.
pub struct IdentityProvider {
    config: IdpConfig,
    entity_id: String,
    signer: Arc<XmlSigner>,
    registry: ServiceProviderRegistry,
    temp_cache: Arc<dyn CacheProvider>,
    user_cache: Arc<dyn CacheProvider>,
    pki: Arc<dyn Authenticator>,
    password: Arc<dyn Authenticator>,
    retrievers: Vec<Arc<dyn AttributeRetriever>>,
    auditor: Arc<dyn Auditor>,
    marshallers: Vec<Arc<dyn ResponseMarshaller>>,
}

impl std::fmt::Debug for IdentityProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityProvider")
            .field("entity_id", &self.entity_id)
            .field("service_providers", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl IdentityProvider {
    /// Creates an engine with in-memory caches, no service providers, no
    /// password users and no attribute sources.
    #[must_use]
    pub fn new(config: IdpConfig, signer: XmlSigner) -> Self {
        let entity_id = config.entity_id();
        let signer = Arc::new(signer);
        let temp_cache: Arc<dyn CacheProvider> =
            Arc::new(InMemoryCache::new(config.temp_cache_duration()));
        let user_cache: Arc<dyn CacheProvider> =
            Arc::new(InMemoryCache::new(config.user_cache_duration()));
        let marshallers: Vec<Arc<dyn ResponseMarshaller>> = vec![
            Arc::new(PostMarshaller::new(&entity_id, signer.clone())),
            Arc::new(ArtifactMarshaller::new(&entity_id, temp_cache.clone())),
            Arc::new(EcpMarshaller::new(&entity_id, signer.clone())),
        ];
        Self {
            config,
            entity_id,
            signer,
            registry: ServiceProviderRegistry::new(),
            temp_cache,
            user_cache,
            pki: Arc::new(PkiAuthenticator),
            password: Arc::new(PasswordAuthenticator::new(Arc::new(
                StaticPasswordValidator::new(Vec::<(String, String)>::new()),
            ))),
            retrievers: Vec::new(),
            auditor: Arc::new(TracingAuditor),
            marshallers,
        }
    }

    /// Replaces the cache for pending requests and artifacts.
    #[must_use]
    pub fn with_temp_cache(mut self, cache: Arc<dyn CacheProvider>) -> Self {
        let marshaller = Arc::new(ArtifactMarshaller::new(&self.entity_id, cache.clone()));
        self.temp_cache = cache;
        self.with_marshaller(marshaller)
    }

    /// Replaces the session cache.
    #[must_use]
    pub fn with_user_cache(mut self, cache: Arc<dyn CacheProvider>) -> Self {
        self.user_cache = cache;
        self
    }

    /// Replaces the SP registry.
    #[must_use]
    pub fn with_registry(mut self, registry: ServiceProviderRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Registers one service provider.
    #[must_use]
    pub fn with_service_provider(mut self, provider: ServiceProvider) -> Self {
        self.registry.register(provider);
        self
    }

    /// Sets the password store used by the login form.
    #[must_use]
    pub fn with_password_validator(mut self, validator: Arc<dyn PasswordValidator>) -> Self {
        self.password = Arc::new(PasswordAuthenticator::new(validator));
        self
    }

    /// Replaces the certificate authenticator.
    #[must_use]
    pub fn with_certificate_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.pki = authenticator;
        self
    }

    /// Appends an attribute source. Later sources win on name clashes.
    #[must_use]
    pub fn with_attribute_retriever(mut self, retriever: Arc<dyn AttributeRetriever>) -> Self {
        self.retrievers.push(retriever);
        self
    }

    /// Replaces the auditor.
    #[must_use]
    pub fn with_auditor(mut self, auditor: Arc<dyn Auditor>) -> Self {
        self.auditor = auditor;
        self
    }

    /// Installs a marshaller, replacing any for the same binding.
    #[must_use]
    pub fn with_marshaller(mut self, marshaller: Arc<dyn ResponseMarshaller>) -> Self {
        let binding = marshaller.binding();
        self.marshallers.retain(|m| m.binding() != binding);
        self.marshallers.push(marshaller);
        self
    }

    /// Engine configuration.
    #[must_use]
    pub fn config(&self) -> &IdpConfig {
        &self.config
    }

    /// Entity ID placed on issued messages.
    #[must_use]
    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    /// Registered service providers.
    #[must_use]
    pub fn registry(&self) -> &ServiceProviderRegistry {
        &self.registry
    }

    /// IdP metadata document.
    #[must_use]
    pub fn metadata(&self) -> String {
        IdpMetadata {
            entity_id: self.entity_id.clone(),
            certificate: self.signer.certificate().to_base64(),
            sso_location: self.config.sso_location(),
            artifact_location: self.config.artifact_location(),
            attribute_location: self.config.attribute_location(),
        }
        .to_xml()
    }

    /// `Set-Cookie` value for a new session.
    #[must_use]
    pub fn session_cookie(&self, session_id: &str) -> String {
        format!(
            "{}={session_id}; Path=/; HttpOnly; Secure",
            self.config.cookie_name
        )
    }

    /// HTTP-Redirect single sign-on.
    ///
    /// Validates the request, then answers from an existing session, a
    /// client certificate, or by parking the request and sending the
    /// browser to the login form.
    ///
    /// # Errors
    ///
    /// Any validation failure; nothing is cached for a rejected request.
    pub async fn single_sign_on(&self, raw_query: &str, ctx: &RequestContext) -> IdpResult<Outcome> {
        let pending = self.validate_redirect_request(raw_query)?;

        if let Some(user) = self.session_user(ctx).await {
            info!(user = %user.name, sp = %pending.request.issuer, "answering from existing session");
            let dispatch = self.dispatch(&pending, &user).await?;
            return Ok(Outcome::without_session(dispatch));
        }

        if let Some(chain) = &ctx.client_certificate {
            let user = self
                .pki
                .authenticate(&AuthContext::certificate(chain.0.clone(), &ctx.ip))
                .await?;
            return self.complete_login(&pending, user, LoginType::Certificate).await;
        }

        let request_id = new_key();
        self.temp_cache.set_json(&request_id, &pending).await?;
        debug!(request_id = %request_id, "sending client to login form");
        Ok(Outcome::without_session(Dispatch::Login(login_url(
            &request_id,
            None,
        ))))
    }

    /// Login form submission for a parked request.
    ///
    /// A wrong password sends the browser back to the form; the request
    /// stays parked. A correct one consumes the request and answers it.
    ///
    /// # Errors
    ///
    /// `CacheMiss` when the request ID is unknown or expired.
    pub async fn password_login(
        &self,
        request_id: &str,
        name: &str,
        password: &str,
        ctx: &RequestContext,
    ) -> IdpResult<Outcome> {
        if request_id.is_empty() {
            return Err(SamlError::CacheMiss.into());
        }
        self.temp_cache.get(request_id).await?;

        let user = match self
            .password
            .authenticate(&AuthContext::password(name, password, &ctx.ip))
            .await
        {
            Ok(user) => user,
            Err(AuthError::InvalidCredentials) => {
                warn!(user = %name, ip = %ctx.ip, "password login rejected");
                return Ok(Outcome::without_session(Dispatch::Redirect(login_url(
                    request_id,
                    Some(INVALID_LOGIN_MESSAGE),
                ))));
            }
            Err(err) => return Err(err.into()),
        };

        let pending: PendingRequest = self.temp_cache.take_json(request_id).await?;
        self.complete_login(&pending, user, LoginType::Password).await
    }

    /// Answers `pending` for `user` with the marshaller of its binding.
    ///
    /// # Errors
    ///
    /// `UnsupportedBinding` when no marshaller handles the binding.
    pub async fn dispatch(&self, pending: &PendingRequest, user: &User) -> IdpResult<Dispatch> {
        let marshaller = self
            .marshallers
            .iter()
            .find(|m| m.binding().uri() == pending.binding)
            .ok_or_else(|| SamlError::UnsupportedBinding(pending.binding.clone()))?;
        marshaller.marshal(pending, user).await
    }

    /// SOAP artifact resolution. Each artifact resolves once, and only for
    /// the SP whose request it answers.
    ///
    /// # Errors
    ///
    /// - `UnregisteredIssuer` for unknown requesters.
    /// - `SignatureVerificationFailed` for unsigned or badly signed requests.
    /// - `CacheMiss` for unknown, expired or already resolved artifacts.
    /// - `Forbidden` when the artifact was issued to another SP; the
    ///   artifact stays resolvable by its owner.
    pub async fn resolve_artifact(&self, body: &str) -> IdpResult<String> {
        let envelope = SoapEnvelope::parse(body)?;
        let payload = envelope.payload()?;
        let unverified = ArtifactResolve::from_element(payload)?;
        let sp = self.registry.get(&unverified.issuer)?;
        if !is_signed(payload) {
            return Err(SamlError::SignatureVerificationFailed("ArtifactResolve is not signed".into()).into());
        }
        let resolve = ArtifactResolve::from_element(&validate_with(sp, &envelope, &unverified.id)?)?;
        ensure_issuer(sp, &resolve.issuer)?;

        let artifact = Artifact::decode(&resolve.artifact)?;
        if !artifact.is_from(&self.entity_id) {
            return Err(SamlError::MalformedRequest("artifact was issued by another IdP".into()).into());
        }
        let key = artifact.encode();
        let issued: ArtifactEntry = self.temp_cache.get_json(&key).await?;
        if issued.request.request.issuer != resolve.issuer {
            warn!(
                requester = %resolve.issuer,
                audience = %issued.request.request.issuer,
                "artifact resolution by the wrong service provider"
            );
            return Err(SamlError::Forbidden("artifact was issued to another service provider".into()).into());
        }
        let entry: ArtifactEntry = self.temp_cache.take_json(&key).await?;

        let now = Utc::now();
        let target = ResponseTarget::authn(&self.entity_id, &entry.request, &entry.user);
        let response = make_response(&self.entity_id, &target, &entry.user, now);
        let artifact_response = ArtifactResponse {
            id: new_id(),
            in_response_to: resolve.id.clone(),
            issue_instant: now,
            issuer: Issuer::entity(&self.entity_id),
            status: Status::success(),
            response: Some(response.clone()),
        };
        let signed = sign_assertion(&self.signer, &artifact_response.to_xml(), &response)?;
        info!(sp = %resolve.issuer, user = %entry.user.name, "resolved artifact");
        Ok(soap_envelope(&signed))
    }

    /// SOAP attribute query.
    ///
    /// # Errors
    ///
    /// `UnregisteredIssuer` for unknown requesters, signature errors when a
    /// signed query does not verify, or attribute source failures.
    pub async fn attribute_query(&self, body: &str) -> IdpResult<String> {
        let envelope = SoapEnvelope::parse(body)?;
        let payload = envelope.payload()?;
        let mut query = AttributeQuery::from_element(payload)?;
        let sp = self.registry.get(&query.issuer)?;
        if is_signed(payload) {
            let validated = validate_with(sp, &envelope, &query.id)?;
            query = AttributeQuery::from_element(&validated)?;
            ensure_issuer(sp, &query.issuer)?;
        }

        let mut user = User::new(
            &query.name_id.value,
            NameIdFormat::Unspecified,
            AuthnContextClass::Unspecified,
            "",
        );
        if let Some(format) = &query.name_id.format {
            user.format.clone_from(format);
        }
        user.attributes = collect_attributes(&self.retrievers, &user).await?;

        let response = make_response(
            &self.entity_id,
            &ResponseTarget::query(&query),
            &user,
            Utc::now(),
        );
        let signed = sign_assertion(&self.signer, &response.to_xml(), &response)?;
        info!(sp = %query.issuer, subject = %user.name, "answered attribute query");
        Ok(soap_envelope(&signed))
    }

    /// ECP single sign-on. Requires a client certificate and a signed
    /// AuthnRequest inside the PAOS envelope.
    ///
    /// # Errors
    ///
    /// `Forbidden` without a client certificate; otherwise the validation
    /// and authentication failures of browser SSO.
    pub async fn ecp(&self, body: &str, ctx: &RequestContext) -> IdpResult<String> {
        let Some(chain) = &ctx.client_certificate else {
            return Err(SamlError::Forbidden("client certificate required".into()).into());
        };
        let envelope = SoapEnvelope::parse(body)?;
        let unverified = AuthnRequest::from_element(envelope.payload()?)?;
        let sp = self.registry.get(&unverified.issuer)?;
        let request = AuthnRequest::from_element(&validate_with(sp, &envelope, &unverified.id)?)?;
        ensure_issuer(sp, &request.issuer)?;
        let acs = sp.resolve_acs(&request)?;
        let pending = PendingRequest {
            acs_url: acs.location.clone(),
            binding: SamlBinding::Paos.uri().to_string(),
            request,
        };

        let mut user = self
            .pki
            .authenticate(&AuthContext::certificate(chain.0.clone(), &ctx.ip))
            .await?;
        user.attributes = collect_attributes(&self.retrievers, &user).await?;
        self.auditor.log_success(&user, LoginType::Certificate);

        match self.dispatch(&pending, &user).await? {
            Dispatch::Soap(xml) => Ok(xml),
            _ => Err(SamlError::Internal("ECP marshaller did not produce SOAP".into()).into()),
        }
    }

    fn validate_redirect_request(&self, raw_query: &str) -> IdpResult<PendingRequest> {
        let redirect = RedirectRequest::from_query(raw_query)?;
        let mut request = AuthnRequest::parse(&redirect.xml)?;
        request.relay_state.clone_from(&redirect.relay_state);
        info!(id = %request.id, sp = %request.issuer, "received authentication request");

        let sp = self.registry.get(&request.issuer)?;
        let acs = sp.resolve_acs(&request)?;
        redirect.verify(&sp.certificate)?;

        let binding = request
            .protocol_binding
            .clone()
            .unwrap_or_else(|| acs.binding.clone());
        Ok(PendingRequest {
            acs_url: acs.location.clone(),
            binding,
            request,
        })
    }

    async fn complete_login(
        &self,
        pending: &PendingRequest,
        mut user: User,
        login_type: LoginType,
    ) -> IdpResult<Outcome> {
        user.attributes = collect_attributes(&self.retrievers, &user).await?;
        self.auditor.log_success(&user, login_type);
        let dispatch = self.dispatch(pending, &user).await?;
        let session = new_key();
        self.user_cache.set_json(&session, &user).await?;
        Ok(Outcome {
            dispatch,
            session: Some(session),
        })
    }

    async fn session_user(&self, ctx: &RequestContext) -> Option<User> {
        let session_id = ctx.session_id.as_deref().filter(|s| !s.is_empty())?;
        match self.user_cache.get_json::<User>(session_id).await {
            Ok(user) => Some(user),
            Err(err) => {
                debug!(error = %err, "session cookie did not resolve");
                None
            }
        }
    }
}

/// Login form URL for a parked request.
#[must_use]
pub fn login_url(request_id: &str, error: Option<&str>) -> String {
    let mut url = format!("{LOGIN_PATH}?requestId={}", urlencoding::encode(request_id));
    if let Some(error) = error {
        url.push_str("&error=");
        url.push_str(&urlencoding::encode(error));
    }
    url
}

fn is_signed(payload: &Element) -> bool {
    payload.child(XMLDSIG_NS, "Signature").is_some()
}

/// Validates the envelope's signatures with the SP certificate and returns
/// the signed copy of the element with ID `id`.
fn validate_with(sp: &ServiceProvider, envelope: &SoapEnvelope, id: &str) -> IdpResult<Element> {
    SignatureValidator::new(vec![sp.certificate.clone()])
        .validate_element(envelope.root())?
        .into_iter()
        .find(|e| e.attr("ID") == Some(id))
        .ok_or_else(|| {
            SamlError::SignatureVerificationFailed("message is not covered by its signature".into())
                .into()
        })
}

fn ensure_issuer(sp: &ServiceProvider, issuer: &str) -> IdpResult<()> {
    if sp.entity_id == issuer {
        Ok(())
    } else {
        Err(SamlError::UnregisteredIssuer(issuer.to_string()).into())
    }
}
