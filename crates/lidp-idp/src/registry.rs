//! Registered service providers.
//!
//! Built once from SP metadata at startup and read-only afterwards.

use std::collections::HashMap;

use lidp_crypto::Certificate;
use lidp_protocol_saml::{AssertionConsumerService, AuthnRequest, SamlError, SamlResult, SpMetadata};

/// A service provider the IdP will answer.
#[derive(Debug, Clone)]
pub struct ServiceProvider {
    /// SP entity ID.
    pub entity_id: String,
    /// Certificate used to verify the SP's requests.
    pub certificate: Certificate,
    /// Endpoints from the SP metadata.
    pub assertion_consumer_services: Vec<AssertionConsumerService>,
}

impl ServiceProvider {
    /// Registers an SP from its metadata, parsing the certificate once.
    ///
    /// # Errors
    ///
    /// Returns `SamlError::MalformedRequest` if the certificate is unusable.
    pub fn from_metadata(metadata: SpMetadata) -> SamlResult<Self> {
        let certificate = Certificate::from_base64(&metadata.certificate).map_err(|e| {
            SamlError::MalformedRequest(format!(
                "certificate of {} is unusable: {e}",
                metadata.entity_id
            ))
        })?;
        Ok(Self {
            entity_id: metadata.entity_id,
            certificate,
            assertion_consumer_services: metadata.assertion_consumer_services,
        })
    }

    /// The endpoint flagged as default.
    #[must_use]
    pub fn default_acs(&self) -> Option<&AssertionConsumerService> {
        self.assertion_consumer_services.iter().find(|a| a.is_default)
    }

    /// Picks the endpoint a response to `request` goes to.
    ///
    /// An explicit index wins, then an exact URL match, then the default
    /// endpoint. A URL in the request must equal the chosen endpoint's
    /// location.
    ///
    /// # Errors
    ///
    /// Returns `SamlError::AcsMismatch` when no endpoint qualifies or the
    /// request names a URL the metadata does not register.
    pub fn resolve_acs(&self, request: &AuthnRequest) -> SamlResult<&AssertionConsumerService> {
        let services = &self.assertion_consumer_services;
        let by_index = request
            .assertion_consumer_service_index
            .and_then(|index| services.iter().find(|a| a.index == index));
        let by_url = request
            .assertion_consumer_service_url
            .as_deref()
            .and_then(|url| services.iter().find(|a| a.location == url));

        let acs = by_index
            .or(by_url)
            .or_else(|| self.default_acs())
            .ok_or_else(|| {
                SamlError::AcsMismatch(format!(
                    "unable to determine assertion consumer service for {}",
                    self.entity_id
                ))
            })?;

        if let Some(url) = request.assertion_consumer_service_url.as_deref() {
            if url != acs.location {
                return Err(SamlError::AcsMismatch(format!(
                    "{url} is not registered for {}",
                    self.entity_id
                )));
            }
        }
        tracing::debug!(sp = %self.entity_id, acs = %acs.location, index = acs.index, "resolved assertion consumer service");
        Ok(acs)
    }
}

/// Service providers keyed by entity ID.
#[derive(Debug, Clone, Default)]
pub struct ServiceProviderRegistry {
    providers: HashMap<String, ServiceProvider>,
}

impl ServiceProviderRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an SP.
    pub fn register(&mut self, provider: ServiceProvider) {
        self.providers.insert(provider.entity_id.clone(), provider);
    }

    /// Adds an SP from metadata.
    ///
    /// # Errors
    ///
    /// Fails if the metadata certificate cannot be parsed.
    pub fn register_metadata(&mut self, metadata: SpMetadata) -> SamlResult<()> {
        self.register(ServiceProvider::from_metadata(metadata)?);
        Ok(())
    }

    /// Looks up an SP by entity ID.
    ///
    /// # Errors
    ///
    /// Returns `SamlError::UnregisteredIssuer` for an empty or unknown ID.
    pub fn get(&self, entity_id: &str) -> SamlResult<&ServiceProvider> {
        if entity_id.is_empty() {
            return Err(SamlError::UnregisteredIssuer(
                "request does not contain an issuer".into(),
            ));
        }
        self.providers
            .get(entity_id)
            .ok_or_else(|| SamlError::UnregisteredIssuer(entity_id.to_string()))
    }

    /// Number of registered SPs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether no SP is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
