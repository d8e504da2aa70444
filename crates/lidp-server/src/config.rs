//! Server configuration.
//!
//! Configuration is read from a JSON file; scalar settings can be
//! overridden with `LIDP_*` environment variables (a `.env` file is
//! honoured). Relative paths in the file are resolved against the file's
//! directory.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use lidp_idp::IdpConfig;
use lidp_protocol_saml::SpMetadata;

/// A password user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEntry {
    /// Login name.
    pub name: String,
    /// Argon2 PHC or bcrypt hash.
    pub hash: String,
}

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to.
    pub listen_address: String,

    /// Engine settings.
    #[serde(flatten)]
    pub idp: IdpConfig,

    /// PEM certificate for TLS; also signs responses unless
    /// `signing_certificate` is set.
    pub tls_certificate: Option<PathBuf>,

    /// PEM private key for TLS.
    pub tls_private_key: Option<PathBuf>,

    /// PEM certificate for response signing.
    pub signing_certificate: Option<PathBuf>,

    /// PEM private key for response signing.
    pub signing_private_key: Option<PathBuf>,

    /// PEM bundle of CAs trusted for client certificates.
    pub tls_client_ca: Option<PathBuf>,

    /// JSON attribute store (`name -> {attribute -> [values]}`).
    pub attribute_store: Option<PathBuf>,

    /// Password users.
    pub users: Vec<UserEntry>,

    /// Registered service providers.
    pub sps: Vec<SpMetadata>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0:9443".to_string(),
            idp: IdpConfig::default(),
            tls_certificate: None,
            tls_private_key: None,
            signing_certificate: None,
            signing_private_key: None,
            tls_client_ca: None,
            attribute_store: None,
            users: Vec::new(),
            sps: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Reads the file as written, without overrides or path resolution.
    pub fn read(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading configuration {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("parsing configuration {}", path.display()))
    }

    /// Loads the configuration used to run the server.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let mut config = Self::read(path)?;
        config.apply_overrides(|name| std::env::var(name).ok())?;
        let dir = std::fs::canonicalize(path)
            .ok()
            .and_then(|p| p.parent().map(Path::to_path_buf))
            .unwrap_or_default();
        config.resolve_paths(&dir);
        Ok(config)
    }

    /// Writes the configuration back to `path`.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)
            .with_context(|| format!("writing configuration {}", path.display()))
    }

    /// Applies `LIDP_*` overrides looked up through `var`.
    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        let set_string = |target: &mut String, name: &str| {
            if let Some(value) = var(name) {
                *target = value;
            }
        };
        set_string(&mut self.listen_address, "LIDP_LISTEN_ADDRESS");
        set_string(&mut self.idp.server_name, "LIDP_SERVER_NAME");
        set_string(&mut self.idp.entity_id, "LIDP_ENTITY_ID");
        set_string(&mut self.idp.cookie_name, "LIDP_COOKIE_NAME");

        let set_path = |target: &mut Option<PathBuf>, name: &str| {
            if let Some(value) = var(name) {
                *target = Some(PathBuf::from(value));
            }
        };
        set_path(&mut self.tls_certificate, "LIDP_TLS_CERTIFICATE");
        set_path(&mut self.tls_private_key, "LIDP_TLS_PRIVATE_KEY");
        set_path(&mut self.signing_certificate, "LIDP_SIGNING_CERTIFICATE");
        set_path(&mut self.signing_private_key, "LIDP_SIGNING_PRIVATE_KEY");
        set_path(&mut self.tls_client_ca, "LIDP_TLS_CLIENT_CA");
        set_path(&mut self.attribute_store, "LIDP_ATTRIBUTE_STORE");

        if let Some(value) = var("LIDP_TEMP_CACHE_TTL") {
            self.idp.temp_cache_ttl = value
                .parse()
                .with_context(|| format!("LIDP_TEMP_CACHE_TTL={value}"))?;
        }
        if let Some(value) = var("LIDP_USER_CACHE_TTL") {
            self.idp.user_cache_ttl = value
                .parse()
                .with_context(|| format!("LIDP_USER_CACHE_TTL={value}"))?;
        }
        Ok(())
    }

    /// Makes relative file paths relative to `dir`.
    pub fn resolve_paths(&mut self, dir: &Path) {
        for path in [
            &mut self.tls_certificate,
            &mut self.tls_private_key,
            &mut self.signing_certificate,
            &mut self.signing_private_key,
            &mut self.tls_client_ca,
            &mut self.attribute_store,
        ]
        .into_iter()
        .flatten()
        {
            if path.is_relative() {
                *path = dir.join(&*path);
            }
        }
    }

    /// TLS certificate and key, when both are configured.
    pub fn tls_key_pair(&self) -> Option<(&Path, &Path)> {
        Some((self.tls_certificate.as_deref()?, self.tls_private_key.as_deref()?))
    }

    /// Certificate and key that sign responses: the signing pair when
    /// configured, otherwise the TLS pair.
    pub fn signing_key_pair(&self) -> Option<(&Path, &Path)> {
        match (&self.signing_certificate, &self.signing_private_key) {
            (Some(certificate), Some(key)) => Some((certificate.as_path(), key.as_path())),
            _ => self.tls_key_pair(),
        }
    }

    /// Adds `metadata`, replacing an entry with the same entity ID.
    /// Returns whether an entry was replaced.
    pub fn upsert_service_provider(&mut self, metadata: SpMetadata) -> bool {
        match self.sps.iter_mut().find(|sp| sp.entity_id == metadata.entity_id) {
            Some(existing) => {
                *existing = metadata;
                true
            }
            None => {
                self.sps.push(metadata);
                false
            }
        }
    }
}
