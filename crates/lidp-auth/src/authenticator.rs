//! Authenticator trait and implementations.
//!
//! An authenticator turns presented credentials into a [`User`]. The
//! engine holds one per credential kind: a client certificate captured by
//! the TLS listener, or a name and password from the login form.

use std::sync::Arc;

use async_trait::async_trait;

use lidp_crypto::Certificate;
use lidp_protocol_saml::{AuthnContextClass, NameIdFormat};

use crate::error::{AuthError, AuthResult};
use crate::password::PasswordValidator;
use crate::pki::subject_dn;
use crate::user::User;

/// Credentials presented with a request.
#[derive(Debug, Clone)]
pub enum Credentials {
    /// DER certificate chain from the TLS handshake, leaf first.
    Certificate {
        /// The chain.
        chain: Vec<Vec<u8>>,
    },
    /// Login form input.
    Password {
        /// User name.
        name: String,
        /// Clear-text password.
        password: String,
    },
}

/// Request-scoped input to an authenticator.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Credentials to check.
    pub credentials: Credentials,
    /// Remote address of the client.
    pub ip: String,
}

impl AuthContext {
    /// Creates a context for a client certificate chain.
    #[must_use]
    pub fn certificate(chain: Vec<Vec<u8>>, ip: impl Into<String>) -> Self {
        Self {
            credentials: Credentials::Certificate { chain },
            ip: ip.into(),
        }
    }

    /// Creates a context for a login form submission.
    #[must_use]
    pub fn password(
        name: impl Into<String>,
        password: impl Into<String>,
        ip: impl Into<String>,
    ) -> Self {
        Self {
            credentials: Credentials::Password {
                name: name.into(),
                password: password.into(),
            },
            ip: ip.into(),
        }
    }
}

/// Authenticator trait.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Returns the authenticator ID.
    fn id(&self) -> &'static str;

    /// Authenticates the user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UnsupportedCredentials` when handed a credential
    /// kind it does not handle, `AuthError::InvalidCredentials` when the
    /// check fails.
    async fn authenticate(&self, context: &AuthContext) -> AuthResult<User>;
}

/// Accepts any client certificate the TLS layer already verified and names
/// the user after its subject DN.
#[derive(Debug, Clone, Copy, Default)]
pub struct PkiAuthenticator;

#[async_trait]
impl Authenticator for PkiAuthenticator {
    fn id(&self) -> &'static str {
        "pki"
    }

    async fn authenticate(&self, context: &AuthContext) -> AuthResult<User> {
        let Credentials::Certificate { chain } = &context.credentials else {
            return Err(AuthError::UnsupportedCredentials);
        };
        let leaf = chain
            .first()
            .ok_or_else(|| AuthError::InvalidCertificate("empty chain".to_string()))?;
        let cert =
            Certificate::from_der(leaf).map_err(|e| AuthError::InvalidCertificate(e.to_string()))?;

        let name = subject_dn(&cert);
        if name.is_empty() {
            return Err(AuthError::InvalidCertificate("empty subject".to_string()));
        }
        tracing::info!(subject = %name, ip = %context.ip, "certificate login");
        Ok(User::new(
            name,
            NameIdFormat::X509SubjectName,
            AuthnContextClass::X509,
            context.ip.clone(),
        ))
    }
}

/// Checks form logins against a [`PasswordValidator`].
#[derive(Clone)]
pub struct PasswordAuthenticator {
    validator: Arc<dyn PasswordValidator>,
}

impl PasswordAuthenticator {
    /// Creates an authenticator over `validator`.
    #[must_use]
    pub fn new(validator: Arc<dyn PasswordValidator>) -> Self {
        Self { validator }
    }
}

impl std::fmt::Debug for PasswordAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordAuthenticator").finish_non_exhaustive()
    }
}

#[async_trait]
impl Authenticator for PasswordAuthenticator {
    fn id(&self) -> &'static str {
        "password"
    }

    async fn authenticate(&self, context: &AuthContext) -> AuthResult<User> {
        let Credentials::Password { name, password } = &context.credentials else {
            return Err(AuthError::UnsupportedCredentials);
        };
        if name.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }
        self.validator.validate(name, password)?;

        tracing::info!(user = %name, ip = %context.ip, "password login");
        Ok(User::new(
            name.clone(),
            NameIdFormat::Unspecified,
            AuthnContextClass::PasswordProtectedTransport,
            context.ip.clone(),
        ))
    }
}
