//! Authentication error types.

use std::fmt;

use lidp_protocol_saml::SamlError;

/// Authentication operation errors.
#[derive(Debug)]
pub enum AuthError {
    /// Unknown user or wrong password.
    InvalidCredentials,
    /// The credentials kind is not handled by this authenticator.
    UnsupportedCredentials,
    /// A presented client certificate could not be used.
    InvalidCertificate(String),
    /// Internal error.
    Internal(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCredentials => write!(f, "invalid credentials"),
            Self::UnsupportedCredentials => write!(f, "unsupported credential type"),
            Self::InvalidCertificate(msg) => write!(f, "invalid client certificate: {msg}"),
            Self::Internal(msg) => write!(f, "internal authentication error: {msg}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<AuthError> for SamlError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => Self::InvalidCredentials,
            AuthError::UnsupportedCredentials | AuthError::InvalidCertificate(_) => {
                Self::Forbidden(err.to_string())
            }
            AuthError::Internal(msg) => Self::Internal(msg),
        }
    }
}

/// Result type for authentication operations.
pub type AuthResult<T> = Result<T, AuthError>;
