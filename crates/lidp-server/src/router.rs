//! Router configuration.
//!
//! Combines the engine's SAML endpoints with the login page and the
//! layers every response passes through.

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::http::header::STRICT_TRANSPORT_SECURITY;
use axum::routing::get;
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use lidp_idp::{IdentityProvider, LOGIN_PATH, idp_router};

use crate::ui;

/// HSTS policy sent with every response.
pub const HSTS_POLICY: &str = "max-age=63072000; includeSubDomains";

/// Creates the main application router.
pub fn create_router(idp: Arc<IdentityProvider>) -> Router {
    let login = Router::new().route(LOGIN_PATH, get(ui::login_page));

    idp_router(idp)
        .merge(login)
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::overriding(
            STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static(HSTS_POLICY),
        ))
}
