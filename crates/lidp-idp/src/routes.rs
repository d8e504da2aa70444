//! Axum routes for the IdP endpoints.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, FromRequestParts, RawQuery, State};
use axum::http::header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE};
use axum::http::request::Parts;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use serde::Deserialize;

use lidp_protocol_saml::SamlError;
use lidp_protocol_saml::bindings::soap::soap_fault;

use crate::engine::{ClientCertificate, IdentityProvider, LOGIN_PATH, Outcome, RequestContext};
use crate::error::IdpError;
use crate::marshal::Dispatch;

const TEXT_XML: &str = "text/xml; charset=utf-8";
const METADATA_CONTENT_TYPE: &str = "application/samlmetadata+xml";

/// Shared handler state.
pub type IdpState = Arc<IdentityProvider>;

/// Builds the router for every IdP endpoint at its configured path.
pub fn idp_router(idp: IdpState) -> Router {
    let config = idp.config().clone();
    Router::new()
        .route(&config.sso_service_path, get(single_sign_on))
        .route(&config.artifact_service_path, post(resolve_artifact))
        .route(&config.attribute_service_path, post(attribute_query))
        .route(&config.ecp_service_path, post(ecp))
        .route(&config.metadata_path, get(metadata))
        .route(LOGIN_PATH, post(password_login))
        .with_state(idp)
}

impl FromRequestParts<IdpState> for RequestContext {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, idp: &IdpState) -> Result<Self, Self::Rejection> {
        let ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_default();
        let client_certificate = parts.extensions.get::<ClientCertificate>().cloned();
        let session_id = session_cookie(parts, &idp.config().cookie_name);
        Ok(Self {
            ip,
            client_certificate,
            session_id,
        })
    }
}

fn session_cookie(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

async fn single_sign_on(
    State(idp): State<IdpState>,
    ctx: RequestContext,
    RawQuery(query): RawQuery,
) -> Response {
    match idp
        .single_sign_on(query.as_deref().unwrap_or_default(), &ctx)
        .await
    {
        Ok(outcome) => outcome_response(&idp, outcome),
        Err(err) => {
            tracing::warn!(error = %err, ip = %ctx.ip, "authentication request rejected");
            plain_error(&err)
        }
    }
}

/// Fields of the login form.
#[derive(Debug, Deserialize)]
struct LoginForm {
    #[serde(rename = "requestId", default)]
    request_id: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

async fn password_login(
    State(idp): State<IdpState>,
    ctx: RequestContext,
    Form(form): Form<LoginForm>,
) -> Response {
    match idp
        .password_login(&form.request_id, &form.username, &form.password, &ctx)
        .await
    {
        Ok(outcome) => outcome_response(&idp, outcome),
        Err(err) => {
            tracing::warn!(error = %err, "login form submission failed");
            plain_error(&err)
        }
    }
}

async fn resolve_artifact(State(idp): State<IdpState>, body: String) -> Response {
    soap_response(idp.resolve_artifact(&body).await, "artifact resolution")
}

async fn attribute_query(State(idp): State<IdpState>, body: String) -> Response {
    soap_response(idp.attribute_query(&body).await, "attribute query")
}

async fn ecp(State(idp): State<IdpState>, ctx: RequestContext, body: String) -> Response {
    match idp.ecp(&body, &ctx).await {
        Err(IdpError::Saml(SamlError::Forbidden(reason))) => {
            tracing::warn!(ip = %ctx.ip, %reason, "ECP request refused");
            (StatusCode::FORBIDDEN, "403 Forbidden").into_response()
        }
        result => soap_response(result, "ECP"),
    }
}

async fn metadata(State(idp): State<IdpState>) -> Response {
    ([(CONTENT_TYPE, METADATA_CONTENT_TYPE)], idp.metadata()).into_response()
}

fn soap_response(result: Result<String, IdpError>, operation: &str) -> Response {
    match result {
        Ok(xml) => ([(CONTENT_TYPE, TEXT_XML)], xml).into_response(),
        Err(err) => {
            tracing::warn!(error = %err, operation, "SOAP request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(CONTENT_TYPE, TEXT_XML)],
                soap_fault(err.soap_fault_code(), &err.to_string()),
            )
                .into_response()
        }
    }
}

fn outcome_response(idp: &IdentityProvider, outcome: Outcome) -> Response {
    let mut response = match outcome.dispatch {
        Dispatch::Redirect(location) => (StatusCode::FOUND, [(LOCATION, location)]).into_response(),
        Dispatch::Login(location) => {
            (StatusCode::TEMPORARY_REDIRECT, [(LOCATION, location)]).into_response()
        }
        Dispatch::Html(page) => Html(page).into_response(),
        Dispatch::Soap(xml) => ([(CONTENT_TYPE, TEXT_XML)], xml).into_response(),
    };
    if let Some(session) = outcome.session {
        match HeaderValue::from_str(&idp.session_cookie(&session)) {
            Ok(cookie) => {
                response.headers_mut().append(SET_COOKIE, cookie);
            }
            Err(err) => tracing::error!(error = %err, "session cookie is not a valid header"),
        }
    }
    response
}

fn plain_error(err: &IdpError) -> Response {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, err.to_string()).into_response()
}
