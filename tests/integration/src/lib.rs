//! Fixtures shared by the end-to-end tests.
//!
//! Everything is built from the keys, certificates and metadata under
//! `testdata/`: the IdP signs with `idp-key.pem`, the registered SP with
//! `sp-key.pem`, and the browser presents `client-cert.pem`, issued by
//! `ca-cert.pem`.

#![forbid(unsafe_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Method, Request};
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use lidp_crypto::Certificate;
use lidp_idp::ClientCertificate;
use lidp_protocol_saml::bindings::redirect::HttpRedirectBinding;
use lidp_protocol_saml::signature::XmlSigner;
use lidp_protocol_saml::{AuthnRequest, SpMetadata};
use lidp_server::{Server, ServerConfig, UserEntry, build_identity_provider, create_router};

/// Entity ID of the registered SP.
pub const SP: &str = "https://sp.example.com/saml";
/// The SP's HTTP-POST assertion consumer service.
pub const POST_ACS: &str = "https://sp.example.com/saml/post";
/// The SP's default HTTP-Artifact assertion consumer service.
pub const ARTIFACT_ACS: &str = "https://sp.example.com/saml/artifact";
/// Subject of `client-cert.pem` in RFC 4514 order.
pub const CLIENT_DN: &str = "CN=Jane Doe, OU=People, O=Example Corp, L=Arlington, ST=Virginia, C=US";
/// Password of the `jdoe` user.
pub const PASSWORD: &str = "secret";

/// Path of a file under `testdata/`.
pub fn testdata(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../testdata")
        .join(name)
}

fn read(name: &str) -> String {
    std::fs::read_to_string(testdata(name)).unwrap_or_else(|e| panic!("{name}: {e}"))
}

/// Server configuration pointing at the test keys, users and SP.
pub fn server_config() -> ServerConfig {
    let mut config = ServerConfig {
        listen_address: "127.0.0.1:0".to_string(),
        tls_certificate: Some(testdata("idp-cert.pem")),
        tls_private_key: Some(testdata("idp-key.pem")),
        tls_client_ca: Some(testdata("ca-cert.pem")),
        attribute_store: Some(testdata("attributes.json")),
        users: vec![UserEntry {
            name: "jdoe".to_string(),
            hash: bcrypt::hash(PASSWORD, 4).unwrap_or_default(),
        }],
        ..ServerConfig::default()
    };
    config.idp.server_name = "idp.example.com".to_string();
    config.upsert_service_provider(sp_metadata());
    config
}

/// Metadata of the registered SP.
pub fn sp_metadata() -> SpMetadata {
    SpMetadata::parse(&read("sp-metadata.xml")).unwrap_or_else(|e| panic!("sp metadata: {e}"))
}

/// The full application router, as served.
pub fn app() -> Router {
    let idp = build_identity_provider(&server_config())
        .unwrap_or_else(|e| panic!("building identity provider: {e:#}"));
    create_router(Arc::new(idp))
}

/// Signer holding the SP key.
pub fn sp_signer() -> XmlSigner {
    XmlSigner::from_pem(&read("sp-key.pem"), &read("sp-cert.pem"))
        .unwrap_or_else(|e| panic!("sp signer: {e}"))
}

/// The IdP signing certificate.
pub fn idp_certificate() -> Certificate {
    Certificate::from_pem(&read("idp-cert.pem")).unwrap_or_else(|e| panic!("idp cert: {e}"))
}

/// DER chain of the browser's client certificate.
pub fn client_chain() -> Vec<Vec<u8>> {
    lidp_crypto::pem::decode_certificates(&read("client-cert.pem"))
        .unwrap_or_else(|e| panic!("client cert: {e}"))
}

/// Query string of a signed HTTP-Redirect AuthnRequest from the SP.
pub fn redirect_query(request: &AuthnRequest, relay_state: Option<&str>) -> String {
    let url = HttpRedirectBinding::encode_signed_request(
        &request.to_xml(),
        "https://idp.example.com/SAML2/Redirect/SSO",
        relay_state,
        &sp_signer(),
    )
    .unwrap_or_else(|e| panic!("encoding request: {e}"));
    url.split_once('?').map(|(_, q)| q.to_string()).unwrap_or_default()
}

/// A request as it arrives from a remote browser.
pub fn browser_request(method: Method, uri: &str) -> axum::http::request::Builder {
    let addr: SocketAddr = ([10, 0, 0, 7], 50000).into();
    Request::builder()
        .method(method)
        .uri(uri)
        .extension(ConnectInfo(addr))
}

/// A GET from a browser that presented the client certificate.
pub fn certificate_get(uri: &str) -> Request<Body> {
    browser_request(Method::GET, uri)
        .extension(ClientCertificate(client_chain()))
        .body(Body::empty())
        .unwrap_or_else(|e| panic!("request: {e}"))
}

/// Body of a response as text.
pub async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap_or_default();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Decoded `SAMLResponse` field of an HTTP-POST form.
pub fn post_form_response(html: &str) -> String {
    let marker = r#"name="SAMLResponse" value=""#;
    let start = html.find(marker).map(|i| i + marker.len()).unwrap_or(0);
    let end = html[start..].find('"').map(|i| start + i).unwrap_or(start);
    String::from_utf8(STANDARD.decode(&html[start..end]).unwrap_or_default()).unwrap_or_default()
}

/// The IdP serving on an ephemeral local port.
pub struct TestServer {
    /// `https://127.0.0.1:<port>`, or `http://` without TLS.
    pub base_url: String,
    _shutdown: oneshot::Sender<()>,
}

impl TestServer {
    /// Starts the server with [`server_config`].
    pub async fn start() -> anyhow::Result<Self> {
        Self::start_with(server_config()).await
    }

    /// Starts the server with `config`.
    pub async fn start_with(config: ServerConfig) -> anyhow::Result<Self> {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("lidp_idp=debug,lidp_server=debug")
            .try_init();

        let scheme = if config.tls_key_pair().is_some() { "https" } else { "http" };
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let base_url = format!("{scheme}://{}", listener.local_addr()?);
        let server = Server::new(config)?;
        let (shutdown, stopped) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let shutdown = async move {
                let _ = stopped.await;
            };
            if let Err(e) = server.serve(listener, shutdown).await {
                eprintln!("server error: {e:#}");
            }
        });
        Ok(Self {
            base_url,
            _shutdown: shutdown,
        })
    }

    /// A browser that presents the client certificate and does not
    /// follow redirects.
    pub fn browser(&self) -> anyhow::Result<reqwest::Client> {
        let identity = format!("{}{}", read("client-cert.pem"), read("client-key.pem"));
        Ok(reqwest::Client::builder()
            .identity(reqwest::Identity::from_pem(identity.as_bytes())?)
            .danger_accept_invalid_certs(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()?)
    }

    /// A back-channel client without a certificate.
    pub fn back_channel(&self) -> anyhow::Result<reqwest::Client> {
        Ok(reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .build()?)
    }
}
