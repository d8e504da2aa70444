//! # lidp
//!
//! Command-line entry point for the lite SAML identity provider.

#![forbid(unsafe_code)]

use std::io;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lidp_server::{Server, ServerConfig, commands};

#[derive(Debug, Parser)]
#[command(name = "lidp", version, about = "Lite SAML 2.0 identity provider")]
struct Cli {
    /// Configuration file.
    #[arg(long, short, env = "LIDP_CONFIG", default_value = "config.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the identity provider.
    Serve,
    /// Add or replace a service provider from a metadata file or URL.
    AddServiceProvider {
        /// Path or http(s) URL of the SP metadata.
        metadata: String,
    },
    /// Print the hash of a password for the users list.
    HashPassword {
        /// Password; read from stdin when omitted.
        password: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve => {
            tracing::info!("lidp starting...");
            let config = ServerConfig::load(&cli.config)?;
            Server::new(config)?.run().await?;
        }
        Command::AddServiceProvider { metadata } => {
            let entity_id = commands::add_service_provider(&cli.config, &metadata).await?;
            println!("{entity_id}");
        }
        Command::HashPassword { password } => {
            let hash = commands::hash_password(password, io::stdin().lock())?;
            println!("{hash}");
        }
    }
    Ok(())
}
