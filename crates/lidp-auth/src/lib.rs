//! # lidp-auth
//!
//! User authentication for the identity provider.
//!
//! - [`PkiAuthenticator`]: names the user after the TLS client
//!   certificate's subject DN
//! - [`PasswordAuthenticator`]: login form backed by a
//!   [`PasswordValidator`] (Argon2id or bcrypt hashes)
//!
//! ## Example
//!
//! ```ignore
//! use lidp_auth::{AuthContext, Authenticator, PasswordAuthenticator, StaticPasswordValidator};
//! use std::sync::Arc;
//!
//! let validator = StaticPasswordValidator::new([("jdoe", hash)]);
//! let auth = PasswordAuthenticator::new(Arc::new(validator));
//! let user = auth.authenticate(&AuthContext::password("jdoe", "pw", ip)).await?;
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod authenticator;
pub mod error;
pub mod password;
pub mod pki;
pub mod user;

pub use authenticator::{
    AuthContext, Authenticator, Credentials, PasswordAuthenticator, PkiAuthenticator,
};
pub use error::{AuthError, AuthResult};
pub use password::{
    PasswordHasherService, PasswordPolicy, PasswordValidator, StaticPasswordValidator,
};
pub use pki::subject_dn;
pub use user::User;
