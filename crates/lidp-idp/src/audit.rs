//! Login auditing.

use std::fmt;

use lidp_auth::User;

/// How a user authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginType {
    /// TLS client certificate.
    Certificate,
    /// Login form.
    Password,
}

impl fmt::Display for LoginType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Certificate => write!(f, "certificate"),
            Self::Password => write!(f, "password"),
        }
    }
}

/// Receives successful login events.
pub trait Auditor: Send + Sync {
    /// Records a successful login.
    fn log_success(&self, user: &User, login_type: LoginType);
}

/// Emits login events on the `audit` tracing target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditor;

impl Auditor for TracingAuditor {
    fn log_success(&self, user: &User, login_type: LoginType) {
        tracing::info!(
            target: "audit",
            user = %user.name,
            ip = %user.ip,
            login_type = %login_type,
            "login succeeded"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_type_display() {
        assert_eq!(LoginType::Certificate.to_string(), "certificate");
        assert_eq!(LoginType::Password.to_string(), "password");
    }
}
