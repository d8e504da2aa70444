//! Service provider client errors.

use lidp_cache::CacheError;
use lidp_protocol_saml::SamlError;
use thiserror::Error;

/// Result type for service provider operations.
pub type SpResult<T> = Result<T, SpError>;

/// Errors raised while talking to the IdP or checking its answers.
#[derive(Debug, Error)]
pub enum SpError {
    /// Message could not be built, parsed or verified.
    #[error(transparent)]
    Saml(#[from] SamlError),

    /// RelayState store failure.
    #[error("state cache error: {0}")]
    Cache(#[from] CacheError),

    /// Transport failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IdP answered with a status other than 200.
    #[error("unexpected status code {0} from identity provider")]
    UnexpectedStatus(u16),

    /// IdP answered with a SOAP fault.
    #[error("identity provider fault {code}: {message}")]
    Fault {
        /// `faultcode`.
        code: String,
        /// `faultstring`.
        message: String,
    },

    /// The answer carried no assertion.
    #[error("identity provider returned no assertion (status {0})")]
    NoAssertion(String),

    /// Callback arrived without RelayState.
    #[error("identity provider did not return RelayState")]
    MissingRelayState,

    /// RelayState unknown to the state cache.
    #[error("provided RelayState is invalid")]
    InvalidRelayState,

    /// Assertion outside its validity window.
    #[error("assertion is not valid at this time: {0}")]
    InvalidTime(String),
}
