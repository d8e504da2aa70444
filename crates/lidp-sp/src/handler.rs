//! Axum endpoint receiving artifacts at the assertion consumer service.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;

use lidp_protocol_saml::Assertion;

use crate::client::ServiceProvider;

/// Application hook run once an artifact resolved to a valid assertion.
pub trait ArtifactCallback: Send + Sync {
    /// Builds the response for the browser from the state passed to
    /// [`ServiceProvider::redirect_url`] and the assertion.
    fn on_assertion(&self, state: Vec<u8>, assertion: Assertion) -> Response;
}

impl<F> ArtifactCallback for F
where
    F: Fn(Vec<u8>, Assertion) -> Response + Send + Sync,
{
    fn on_assertion(&self, state: Vec<u8>, assertion: Assertion) -> Response {
        self(state, assertion)
    }
}

#[derive(Clone)]
struct AcsState {
    sp: Arc<ServiceProvider>,
    callback: Arc<dyn ArtifactCallback>,
}

#[derive(Debug, Deserialize)]
struct ArtifactParams {
    #[serde(rename = "SAMLart", default)]
    artifact: String,
    #[serde(rename = "RelayState")]
    relay_state: Option<String>,
}

/// Router serving the ACS at `path`.
pub fn artifact_router(
    path: &str,
    sp: Arc<ServiceProvider>,
    callback: Arc<dyn ArtifactCallback>,
) -> Router {
    Router::new()
        .route(path, get(artifact_handler))
        .with_state(AcsState { sp, callback })
}

async fn artifact_handler(
    State(state): State<AcsState>,
    Query(params): Query<ArtifactParams>,
) -> Response {
    let app_state = match state.sp.retrieve_state(params.relay_state.as_deref()).await {
        Ok(app_state) => app_state,
        Err(err) => return (StatusCode::UNAUTHORIZED, err.to_string()).into_response(),
    };
    let assertion = match state.sp.resolve_artifact(&params.artifact).await {
        Ok(assertion) => assertion,
        Err(err) => {
            tracing::warn!(error = %err, "artifact resolution failed");
            return (StatusCode::UNAUTHORIZED, err.to_string()).into_response();
        }
    };
    if let Err(err) = state.sp.validate_assertion(&assertion) {
        return (StatusCode::BAD_REQUEST, err.to_string()).into_response();
    }
    state.callback.on_assertion(app_state, assertion)
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::Body;
    use axum::http::Request;
    use lidp_crypto::Certificate;
    use lidp_protocol_saml::signature::XmlSigner;
    use tower::ServiceExt;

    use crate::config::SpConfig;

    fn router() -> Router {
        let sp = ServiceProvider::new(
            SpConfig::new(
                "https://sp.example.com/saml",
                "https://sp.example.com/saml/artifact",
                "https://127.0.0.1:1",
                Certificate::from_pem(include_str!("../../../testdata/idp-cert.pem")).unwrap(),
            ),
            XmlSigner::from_pem(
                include_str!("../../../testdata/sp-key.pem"),
                include_str!("../../../testdata/sp-cert.pem"),
            )
            .unwrap(),
        );
        artifact_router(
            "/saml/artifact",
            Arc::new(sp),
            Arc::new(|_state: Vec<u8>, _assertion: Assertion| StatusCode::OK.into_response()),
        )
    }

    #[tokio::test]
    async fn missing_relay_state_is_unauthorized() {
        let response = router()
            .oneshot(
                Request::get("/saml/artifact?SAMLart=abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
