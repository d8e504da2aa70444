//! Service provider client configuration.

use std::time::Duration;

use lidp_crypto::Certificate;

/// Where the SP lives and which IdP it talks to.
#[derive(Debug, Clone)]
pub struct SpConfig {
    /// SP entity ID, the Issuer of every request.
    pub entity_id: String,
    /// URL the IdP redirects artifacts to.
    pub assertion_consumer_service_url: String,
    /// IdP HTTP-Redirect SSO endpoint.
    pub idp_redirect_endpoint: String,
    /// IdP SOAP artifact resolution endpoint.
    pub idp_artifact_endpoint: String,
    /// IdP SOAP attribute query endpoint.
    pub idp_query_endpoint: String,
    /// IdP signing certificate.
    pub idp_certificate: Certificate,
    /// Clock skew tolerated on assertion conditions.
    pub timestamp_margin: Duration,
}

impl SpConfig {
    /// Configuration for an SP at `entity_id` whose IdP publishes its
    /// endpoints under `idp_base` with the default paths.
    #[must_use]
    pub fn new(
        entity_id: impl Into<String>,
        assertion_consumer_service_url: impl Into<String>,
        idp_base: &str,
        idp_certificate: Certificate,
    ) -> Self {
        let base = idp_base.trim_end_matches('/');
        Self {
            entity_id: entity_id.into(),
            assertion_consumer_service_url: assertion_consumer_service_url.into(),
            idp_redirect_endpoint: format!("{base}/SAML2/Redirect/SSO"),
            idp_artifact_endpoint: format!("{base}/SAML2/SOAP/ArtifactResolution"),
            idp_query_endpoint: format!("{base}/SAML2/SOAP/AttributeQuery"),
            idp_certificate,
            timestamp_margin: Duration::ZERO,
        }
    }

    /// Sets the tolerated clock skew.
    #[must_use]
    pub const fn with_timestamp_margin(mut self, margin: Duration) -> Self {
        self.timestamp_margin = margin;
        self
    }
}
