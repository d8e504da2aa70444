//! Identity provider configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings the engine is constructed from.
///
/// Paths are relative to the server root; published locations are
/// `https://<server_name><path>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdpConfig {
    /// Host name (and optional port) the IdP is reached at.
    pub server_name: String,

    /// Entity ID; derived from `server_name` when empty.
    pub entity_id: String,

    /// HTTP-Redirect single sign-on path.
    pub sso_service_path: String,

    /// SOAP artifact resolution path.
    pub artifact_service_path: String,

    /// SOAP attribute query path.
    pub attribute_service_path: String,

    /// SOAP ECP path.
    pub ecp_service_path: String,

    /// Metadata path.
    pub metadata_path: String,

    /// Session cookie name.
    pub cookie_name: String,

    /// Lifetime of pending requests and artifacts, in seconds.
    pub temp_cache_ttl: u64,

    /// Lifetime of user sessions, in seconds.
    pub user_cache_ttl: u64,
}

impl Default for IdpConfig {
    fn default() -> Self {
        Self {
            server_name: "localhost".to_string(),
            entity_id: String::new(),
            sso_service_path: "/SAML2/Redirect/SSO".to_string(),
            artifact_service_path: "/SAML2/SOAP/ArtifactResolution".to_string(),
            attribute_service_path: "/SAML2/SOAP/AttributeQuery".to_string(),
            ecp_service_path: "/SAML2/SOAP/ECP".to_string(),
            metadata_path: "/metadata".to_string(),
            cookie_name: "lidp-session".to_string(),
            temp_cache_ttl: 5 * 60,
            user_cache_ttl: 8 * 60 * 60,
        }
    }
}

impl IdpConfig {
    /// Creates a configuration for `server_name` with default paths.
    #[must_use]
    pub fn new(server_name: impl Into<String>) -> Self {
        Self {
            server_name: server_name.into(),
            ..Self::default()
        }
    }

    /// Sets an explicit entity ID.
    #[must_use]
    pub fn with_entity_id(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = entity_id.into();
        self
    }

    /// Sets the session cookie name.
    #[must_use]
    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    /// The entity ID, defaulting to `https://<server_name>/`.
    #[must_use]
    pub fn entity_id(&self) -> String {
        if self.entity_id.is_empty() {
            format!("https://{}/", self.server_name)
        } else {
            self.entity_id.clone()
        }
    }

    /// Absolute URL of a path on this server.
    #[must_use]
    pub fn location(&self, path: &str) -> String {
        format!("https://{}{}", self.server_name, path)
    }

    /// Published single sign-on location.
    #[must_use]
    pub fn sso_location(&self) -> String {
        self.location(&self.sso_service_path)
    }

    /// Published artifact resolution location.
    #[must_use]
    pub fn artifact_location(&self) -> String {
        self.location(&self.artifact_service_path)
    }

    /// Published attribute service location.
    #[must_use]
    pub fn attribute_location(&self) -> String {
        self.location(&self.attribute_service_path)
    }

    /// Returns the pending request and artifact lifetime.
    #[must_use]
    pub const fn temp_cache_duration(&self) -> Duration {
        Duration::from_secs(self.temp_cache_ttl)
    }

    /// Returns the session lifetime.
    #[must_use]
    pub const fn user_cache_duration(&self) -> Duration {
        Duration::from_secs(self.user_cache_ttl)
    }
}
