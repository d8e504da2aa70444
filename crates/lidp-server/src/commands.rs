//! Administrative commands run from the CLI.

use std::io::BufRead;
use std::path::Path;

use anyhow::{Context, bail};
use url::Url;

use lidp_auth::PasswordHasherService;
use lidp_protocol_saml::SpMetadata;

use crate::config::ServerConfig;

/// Fetches SP metadata from an `http(s)` URL or reads it from a file.
pub async fn fetch_metadata(source: &str) -> anyhow::Result<String> {
    match Url::parse(source) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {
            let response = reqwest::Client::new()
                .get(url.clone())
                .send()
                .await
                .with_context(|| format!("fetching {url}"))?;
            if !response.status().is_success() {
                bail!("fetching {url}: HTTP {}", response.status());
            }
            Ok(response.text().await?)
        }
        _ => std::fs::read_to_string(source).with_context(|| format!("reading {source}")),
    }
}

/// Adds or replaces a service provider in the configuration file.
///
/// Returns the entity ID that was written.
pub async fn add_service_provider(config_path: &Path, source: &str) -> anyhow::Result<String> {
    let xml = fetch_metadata(source).await?;
    let metadata = SpMetadata::parse(&xml).context("parsing service provider metadata")?;
    let entity_id = metadata.entity_id.clone();

    let mut config = ServerConfig::read(config_path)?;
    let replaced = config.upsert_service_provider(metadata);
    config.save(config_path)?;

    tracing::info!(entity_id = %entity_id, replaced, "service provider saved");
    Ok(entity_id)
}

/// Hashes `password`, reading one line from `input` when it is absent.
pub fn hash_password(password: Option<String>, input: impl BufRead) -> anyhow::Result<String> {
    let password = match password {
        Some(password) => password,
        None => {
            let mut line = String::new();
            let mut input = input;
            input.read_line(&mut line).context("reading password")?;
            line.trim_end_matches(['\r', '\n']).to_string()
        }
    };
    if password.is_empty() {
        bail!("password is empty");
    }
    Ok(PasswordHasherService::default().hash(&password)?)
}
