//! Builds the engine from the server configuration.

use std::sync::Arc;

use anyhow::{Context, anyhow};

use lidp_auth::StaticPasswordValidator;
use lidp_idp::{IdentityProvider, JsonFileRetriever, ServiceProviderRegistry};
use lidp_protocol_saml::signature::XmlSigner;

use crate::config::ServerConfig;

/// Loads the signing key, service providers, users and attribute store
/// named by `config`.
///
/// Responses are signed with the TLS key pair unless a separate signing
/// pair is configured.
pub fn build_identity_provider(config: &ServerConfig) -> anyhow::Result<IdentityProvider> {
    let (certificate, private_key) = config.signing_key_pair().ok_or_else(|| {
        anyhow!("no signing key: set signing_certificate/signing_private_key or the TLS pair")
    })?;
    let certificate_pem = std::fs::read_to_string(certificate)
        .with_context(|| format!("reading {}", certificate.display()))?;
    let key_pem = std::fs::read_to_string(private_key)
        .with_context(|| format!("reading {}", private_key.display()))?;
    let signer = XmlSigner::from_pem(&key_pem, &certificate_pem).context("loading signing key")?;

    let mut registry = ServiceProviderRegistry::new();
    for metadata in &config.sps {
        registry
            .register_metadata(metadata.clone())
            .with_context(|| format!("registering service provider {}", metadata.entity_id))?;
    }
    tracing::info!(count = registry.len(), "registered service providers");

    let users = StaticPasswordValidator::new(
        config
            .users
            .iter()
            .map(|user| (user.name.clone(), user.hash.clone())),
    );

    let mut idp = IdentityProvider::new(config.idp.clone(), signer)
        .with_registry(registry)
        .with_password_validator(Arc::new(users));

    if let Some(path) = &config.attribute_store {
        let retriever = JsonFileRetriever::from_file(path)
            .with_context(|| format!("loading attribute store {}", path.display()))?;
        idp = idp.with_attribute_retriever(Arc::new(retriever));
    }

    Ok(idp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use lidp_protocol_saml::SpMetadata;

    fn testdata(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../testdata").join(name)
    }

    fn config() -> ServerConfig {
        ServerConfig {
            tls_certificate: Some(testdata("idp-cert.pem")),
            tls_private_key: Some(testdata("idp-key.pem")),
            sps: vec![SpMetadata::parse(include_str!("../../../testdata/sp-metadata.xml")).unwrap()],
            ..ServerConfig::default()
        }
    }

    #[test]
    fn builds_from_configuration() {
        let idp = build_identity_provider(&config()).unwrap();
        assert_eq!(idp.registry().len(), 1);
        assert_eq!(idp.entity_id(), "https://localhost/");
    }

    #[test]
    fn signing_key_is_required() {
        let config = ServerConfig {
            tls_private_key: None,
            ..config()
        };
        let err = build_identity_provider(&config).unwrap_err();
        assert!(err.to_string().contains("no signing key"));
    }

    #[test]
    fn separate_signing_key_without_tls() {
        let config = ServerConfig {
            tls_certificate: None,
            tls_private_key: None,
            signing_certificate: Some(testdata("idp-cert.pem")),
            signing_private_key: Some(testdata("idp-key.pem")),
            ..config()
        };
        assert!(build_identity_provider(&config).is_ok());
    }

    #[test]
    fn missing_attribute_store_is_an_error() {
        let config = ServerConfig {
            attribute_store: Some(testdata("no-such-store.json")),
            ..config()
        };
        assert!(build_identity_provider(&config).is_err());
    }
}
