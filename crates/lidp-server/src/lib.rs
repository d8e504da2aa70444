//! # lidp-server
//!
//! HTTPS server for the lite SAML 2.0 identity provider.
//!
//! The server loads a JSON configuration, builds the engine from it and
//! serves the SAML endpoints and login page over TLS, requesting (but not
//! requiring) client certificates. Without a TLS key pair it serves plain
//! HTTP for deployment behind a terminating proxy.
//!
//! ## Usage
//!
//! ```ignore
//! use lidp_server::{Server, ServerConfig};
//!
//! let config = ServerConfig::load("config.json".as_ref())?;
//! let server = Server::new(config)?;
//! server.run().await?;
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod app;
pub mod commands;
pub mod config;
pub mod router;
pub mod tls;
pub mod ui;

pub use app::build_identity_provider;
pub use config::{ServerConfig, UserEntry};
pub use router::create_router;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;

use lidp_idp::IdentityProvider;

/// The identity provider server.
pub struct Server {
    config: ServerConfig,
    idp: Arc<IdentityProvider>,
    tls: Option<Arc<rustls::ServerConfig>>,
}

impl Server {
    /// Creates a server, loading every file the configuration names.
    pub fn new(config: ServerConfig) -> anyhow::Result<Self> {
        let idp = build_identity_provider(&config)?;
        let tls = match config.tls_key_pair() {
            Some((certificate, private_key)) => Some(tls::load_tls_config(
                certificate,
                private_key,
                config.tls_client_ca.as_deref(),
            )?),
            None => {
                tracing::warn!("no TLS key pair configured, serving plain HTTP");
                None
            }
        };
        Ok(Self {
            config,
            idp: Arc::new(idp),
            tls,
        })
    }

    /// Binds the configured address and serves until a shutdown signal.
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(&self.config.listen_address).await?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serves on `listener` until `shutdown` resolves.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let app = self.router();
        let addr = listener.local_addr()?;
        match self.tls {
            Some(tls) => {
                tracing::info!("Server listening on https://{} as {}", addr, self.idp.entity_id());
                tls::serve_tls(listener, tls, app, shutdown).await?;
            }
            None => {
                tracing::info!("Server listening on http://{} as {}", addr, self.idp.entity_id());
                axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
                    .with_graceful_shutdown(shutdown)
                    .await?;
            }
        }
        tracing::info!("Server shutdown complete");
        Ok(())
    }

    /// Returns the server configuration.
    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the application router without starting the server.
    pub fn router(&self) -> Router {
        create_router(self.idp.clone())
    }
}

/// Waits for a shutdown signal.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
