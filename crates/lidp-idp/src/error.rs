//! Engine error type.

use lidp_auth::AuthError;
use lidp_cache::CacheError;
use lidp_protocol_saml::SamlError;
use thiserror::Error;

/// Result type for engine operations.
pub type IdpResult<T> = Result<T, IdpError>;

/// Errors raised by the protocol engine and its collaborators.
#[derive(Debug, Error)]
pub enum IdpError {
    /// Protocol failure; carries the SAML error taxonomy.
    #[error(transparent)]
    Saml(#[from] SamlError),

    /// Cache backend failure other than a miss.
    #[error("cache error: {0}")]
    Cache(CacheError),

    /// Attribute source could not be read.
    #[error("attribute retrieval failed: {0}")]
    Attributes(String),

    /// I/O error while loading configuration data.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error while loading configuration data.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<CacheError> for IdpError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::CacheMiss => Self::Saml(SamlError::CacheMiss),
            other => Self::Cache(other),
        }
    }
}

impl From<AuthError> for IdpError {
    fn from(err: AuthError) -> Self {
        Self::Saml(err.into())
    }
}

impl IdpError {
    /// The protocol-level view of this error.
    #[must_use]
    pub fn to_saml(&self) -> SamlError {
        match self {
            Self::Saml(err) => err.clone(),
            other => SamlError::Internal(other.to_string()),
        }
    }

    /// HTTP status for this error.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        self.to_saml().http_status()
    }

    /// SOAP fault code for this error.
    #[must_use]
    pub fn soap_fault_code(&self) -> &'static str {
        self.to_saml().soap_fault_code()
    }
}
