//! The companion SP client against the IdP served over TLS.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::IntoResponse;
use tower::ServiceExt;
use url::Url;

use lidp_protocol_saml::Assertion;
use lidp_server::ServerConfig;
use lidp_sp::{ServiceProvider, SpConfig, SpError, artifact_router};

use lidp_integration_tests::*;

fn service_provider(server: &TestServer) -> anyhow::Result<Arc<ServiceProvider>> {
    let config = SpConfig::new(SP, ARTIFACT_ACS, &server.base_url, idp_certificate())
        .with_timestamp_margin(Duration::from_secs(5));
    Ok(Arc::new(
        ServiceProvider::new(config, sp_signer()).with_http_client(server.back_channel()?),
    ))
}

fn artifact_of(location: &Url) -> String {
    location
        .query_pairs()
        .find(|(key, _)| key == "SAMLart")
        .map(|(_, value)| value.into_owned())
        .unwrap_or_default()
}

/// Redirect, certificate login, artifact delivery and resolution.
#[tokio::test]
async fn sp_signs_in_over_artifact_binding() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let sp = service_provider(&server)?;

    let redirect = sp.redirect_url(b"/home").await?;
    assert!(redirect.starts_with(&format!("{}/SAML2/Redirect/SSO?", server.base_url)));

    let response = server.browser()?.get(&redirect).send().await?;
    assert_eq!(response.status().as_u16(), 302);
    assert!(response.headers().contains_key("set-cookie"));
    let location = Url::parse(
        response
            .headers()
            .get("location")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default(),
    )?;
    assert_eq!(location.path(), "/saml/artifact");

    let acs = artifact_router(
        "/saml/artifact",
        sp.clone(),
        Arc::new(|state: Vec<u8>, assertion: Assertion| {
            let subject = assertion
                .subject
                .map(|s| s.name_id.value)
                .unwrap_or_default();
            format!("{}|{subject}", String::from_utf8_lossy(&state)).into_response()
        }),
    );
    let delivered = acs
        .oneshot(
            Request::get(format!(
                "{}?{}",
                location.path(),
                location.query().unwrap_or_default()
            ))
            .body(Body::empty())?,
        )
        .await?;
    assert_eq!(delivered.status(), StatusCode::OK);
    assert_eq!(body_text(delivered).await, format!("/home|{CLIENT_DN}"));

    let replay = sp.resolve_artifact(&artifact_of(&location)).await;
    assert!(matches!(replay, Err(SpError::Fault { .. })), "{replay:?}");
    Ok(())
}

#[tokio::test]
async fn sp_attribute_query() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let sp = service_provider(&server)?;

    let assertion = sp.query(CLIENT_DN).await?;
    let attributes = assertion
        .attribute_statement
        .map(|s| s.attributes)
        .unwrap_or_default();
    let mail = attributes.iter().find(|a| a.name == "mail");
    assert_eq!(
        mail.map(|a| a.values.clone()),
        Some(vec!["jane.doe@example.com".to_string()])
    );
    Ok(())
}

#[tokio::test]
async fn browser_without_certificate_is_sent_to_login() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let sp = service_provider(&server)?;
    let browser = reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .redirect(reqwest::redirect::Policy::none())
        .build()?;

    let response = browser.get(sp.redirect_url(b"/home").await?).send().await?;
    assert_eq!(response.status().as_u16(), 307);
    assert_eq!(
        response
            .headers()
            .get("strict-transport-security")
            .and_then(|v| v.to_str().ok()),
        Some("max-age=63072000; includeSubDomains")
    );
    let login = response
        .headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(login.starts_with("/ui/login.html?requestId="));

    let page = browser
        .get(format!("{}{login}", server.base_url))
        .send()
        .await?;
    assert_eq!(page.status().as_u16(), 200);
    assert!(page.text().await?.contains(r#"name="password""#));
    Ok(())
}

#[tokio::test]
async fn unreachable_idp_is_a_transport_error() -> anyhow::Result<()> {
    let config = SpConfig::new(SP, ARTIFACT_ACS, "https://127.0.0.1:1", idp_certificate());
    let sp = ServiceProvider::new(config, sp_signer());
    assert!(matches!(
        sp.resolve_artifact("AAQAAA").await,
        Err(SpError::Http(_))
    ));
    Ok(())
}

#[tokio::test]
async fn plain_http_without_tls_key_pair() -> anyhow::Result<()> {
    let config = ServerConfig {
        signing_certificate: Some(testdata("idp-cert.pem")),
        signing_private_key: Some(testdata("idp-key.pem")),
        tls_certificate: None,
        tls_private_key: None,
        ..server_config()
    };
    let server = TestServer::start_with(config).await?;
    assert!(server.base_url.starts_with("http://"));

    let sp = service_provider(&server)?;
    let assertion = sp.query(CLIENT_DN).await?;
    assert!(assertion.attribute_statement.is_some());
    Ok(())
}
