//! SAML 2.0 constants and URIs.

/// SAML 2.0 assertion namespace URI.
pub const SAML_NS: &str = "urn:oasis:names:tc:SAML:2.0:assertion";

/// SAML 2.0 protocol namespace URI.
pub const SAMLP_NS: &str = "urn:oasis:names:tc:SAML:2.0:protocol";

/// SAML 2.0 metadata namespace URI.
pub const MD_NS: &str = "urn:oasis:names:tc:SAML:2.0:metadata";

/// XML Digital Signature namespace URI.
pub const XMLDSIG_NS: &str = "http://www.w3.org/2000/09/xmldsig#";

/// SOAP 1.1 envelope namespace URI.
pub const SOAP_ENV_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// ECP profile namespace URI.
pub const ECP_NS: &str = "urn:oasis:names:tc:SAML:2.0:profiles:SSO:ecp";

/// PAOS namespace URI.
pub const PAOS_NS: &str = "urn:liberty:paos:2003-08";

/// SAML protocol support enumeration used in metadata.
pub const PROTOCOL_SUPPORT: &str = "urn:oasis:names:tc:SAML:2.0:protocol";

/// Subject confirmation method for bearer assertions.
pub const CM_BEARER: &str = "urn:oasis:names:tc:SAML:2.0:cm:bearer";

/// Attribute name format used for every released attribute.
pub const ATTRNAME_FORMAT_BASIC: &str = "urn:oasis:names:tc:SAML:2.0:attrname-format:basic";

/// Bindings this IdP speaks or publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamlBinding {
    /// HTTP POST.
    HttpPost,
    /// HTTP Redirect.
    HttpRedirect,
    /// HTTP Artifact.
    HttpArtifact,
    /// SOAP back channel.
    Soap,
    /// Reverse SOAP, used by ECP.
    Paos,
}

impl SamlBinding {
    /// Binding URI.
    #[must_use]
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::HttpPost => "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST",
            Self::HttpRedirect => "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect",
            Self::HttpArtifact => "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Artifact",
            Self::Soap => "urn:oasis:names:tc:SAML:2.0:bindings:SOAP",
            Self::Paos => "urn:oasis:names:tc:SAML:2.0:bindings:PAOS",
        }
    }
}

/// NameID formats issued or echoed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NameIdFormat {
    /// Password users.
    #[default]
    Unspecified,
    /// Certificate users, named by subject DN.
    X509SubjectName,
    /// Issuer elements.
    Entity,
}

impl NameIdFormat {
    /// Format URI.
    #[must_use]
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::Unspecified => "urn:oasis:names:tc:SAML:1.1:nameid-format:unspecified",
            Self::X509SubjectName => "urn:oasis:names:tc:SAML:1.1:nameid-format:X509SubjectName",
            Self::Entity => "urn:oasis:names:tc:SAML:2.0:nameid-format:entity",
        }
    }
}

/// Authentication context classes stated in AuthnStatements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AuthnContextClass {
    /// Attribute query subjects, never authenticated here.
    #[default]
    Unspecified,
    /// Login form over TLS.
    PasswordProtectedTransport,
    /// TLS client certificate.
    X509,
}

impl AuthnContextClass {
    /// Class URI.
    #[must_use]
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::Unspecified => "urn:oasis:names:tc:SAML:2.0:ac:classes:unspecified",
            Self::PasswordProtectedTransport => {
                "urn:oasis:names:tc:SAML:2.0:ac:classes:PasswordProtectedTransport"
            }
            Self::X509 => "urn:oasis:names:tc:SAML:2.0:ac:classes:X509",
        }
    }
}

/// Top-level SAML status codes.
pub mod status_codes {
    /// Success status code.
    pub const SUCCESS: &str = "urn:oasis:names:tc:SAML:2.0:status:Success";

    /// Requester error status code.
    pub const REQUESTER: &str = "urn:oasis:names:tc:SAML:2.0:status:Requester";

    /// Responder error status code.
    pub const RESPONDER: &str = "urn:oasis:names:tc:SAML:2.0:status:Responder";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_users_get_unspecified_format() {
        assert_eq!(
            NameIdFormat::default().uri(),
            "urn:oasis:names:tc:SAML:1.1:nameid-format:unspecified"
        );
        assert!(AuthnContextClass::X509.uri().ends_with(":X509"));
    }

    #[test]
    fn ecp_uses_paos() {
        assert!(SamlBinding::Paos.uri().ends_with(":PAOS"));
        assert_ne!(SamlBinding::HttpPost, SamlBinding::HttpArtifact);
    }
}
