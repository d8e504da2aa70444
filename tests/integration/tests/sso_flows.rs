//! Browser single sign-on through the HTTP-Redirect endpoint.

use axum::body::Body;
use axum::http::header::{COOKIE, LOCATION, SET_COOKIE, STRICT_TRANSPORT_SECURITY};
use axum::http::{Method, StatusCode};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use tower::ServiceExt;

use lidp_crypto::new_id;
use lidp_protocol_saml::bindings::soap::{SoapEnvelope, soap_envelope};
use lidp_protocol_saml::signature::SignatureValidator;
use lidp_protocol_saml::xml::Element;
use lidp_protocol_saml::{
    ArtifactResolve, ArtifactResponse, AuthnRequest, Response, SamlBinding,
};

use lidp_integration_tests::*;

const SSO: &str = "/SAML2/Redirect/SSO";

fn post_binding_request() -> AuthnRequest {
    AuthnRequest::new(new_id(), SP, Utc::now())
        .with_acs_url(POST_ACS)
        .with_protocol_binding(SamlBinding::HttpPost.uri())
}

fn artifact_binding_request() -> AuthnRequest {
    AuthnRequest::new(new_id(), SP, Utc::now())
        .with_acs_index(0)
        .with_protocol_binding(SamlBinding::HttpArtifact.uri())
}

fn location(response: &axum::response::Response) -> String {
    response
        .headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn query_param(url: &str, name: &str) -> Option<String> {
    let query = url.split_once('?')?.1;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// Valid request, HTTP-POST binding, client certificate presented.
#[tokio::test]
async fn certificate_login_posts_signed_response() -> anyhow::Result<()> {
    let request = post_binding_request();
    let uri = format!("{SSO}?{}", redirect_query(&request, Some("state-a")));
    let response = app().oneshot(certificate_get(&uri)).await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key(STRICT_TRANSPORT_SECURITY));
    assert!(response.headers().contains_key(SET_COOKIE));

    let html = body_text(response).await;
    assert!(html.contains(&format!(r#"action="{POST_ACS}""#)));
    assert!(html.contains(r#"name="RelayState" value="state-a""#));

    let xml = post_form_response(&html);
    let saml_response = Response::from_element(&Element::parse(&xml)?)?;
    assert_eq!(saml_response.in_response_to.as_deref(), Some(request.id.as_str()));
    assert_eq!(saml_response.destination.as_deref(), Some(POST_ACS));
    assert!(xml.contains("Signature"));
    SignatureValidator::new(vec![idp_certificate()]).validate_references(&xml)?;

    let subject = saml_response.assertion.and_then(|a| a.subject);
    assert_eq!(subject.map(|s| s.name_id.value).as_deref(), Some(CLIENT_DN));
    Ok(())
}

/// Tampering with the signed assertion breaks validation.
#[tokio::test]
async fn modified_assertion_fails_validation() -> anyhow::Result<()> {
    let uri = format!("{SSO}?{}", redirect_query(&post_binding_request(), None));
    let html = body_text(app().oneshot(certificate_get(&uri)).await?).await;
    let xml = post_form_response(&html);
    let tampered = xml.replacen("Jane Doe", "John Doe", 1);
    assert_ne!(xml, tampered);
    assert!(SignatureValidator::new(vec![idp_certificate()])
        .validate_references(&tampered)
        .is_err());
    Ok(())
}

/// Same request with the HTTP-Artifact binding, then one resolution.
#[tokio::test]
async fn artifact_binding_redirects_and_resolves_once() -> anyhow::Result<()> {
    let app = app();
    let request = artifact_binding_request();
    let uri = format!("{SSO}?{}", redirect_query(&request, Some("state-b")));
    let response = app.clone().oneshot(certificate_get(&uri)).await?;

    assert_eq!(response.status(), StatusCode::FOUND);
    let location = location(&response);
    assert!(location.starts_with(&format!("{ARTIFACT_ACS}?")));
    assert_eq!(query_param(&location, "RelayState").as_deref(), Some("state-b"));
    let artifact = query_param(&location, "SAMLart").unwrap_or_default();
    assert_eq!(STANDARD.decode(&artifact)?.len(), 44);

    let resolve_body = || {
        let resolve = ArtifactResolve {
            id: new_id(),
            issue_instant: Utc::now(),
            issuer: SP.into(),
            artifact: artifact.clone(),
        };
        sp_signer()
            .sign_element(&resolve.to_xml(), &resolve.id)
            .map(|signed| soap_envelope(&signed))
    };

    let response = app
        .clone()
        .oneshot(
            browser_request(Method::POST, "/SAML2/SOAP/ArtifactResolution")
                .body(Body::from(resolve_body()?))?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let xml = body_text(response).await;
    let envelope = SoapEnvelope::parse(&xml)?;
    let resolved = ArtifactResponse::from_element(envelope.payload()?)?;
    let saml_response = resolved.response.ok_or_else(|| anyhow::anyhow!("no Response"))?;
    assert_eq!(saml_response.in_response_to.as_deref(), Some(request.id.as_str()));
    assert!(saml_response.assertion.is_some());
    SignatureValidator::new(vec![idp_certificate()]).validate_references(&xml)?;

    let replay = app
        .oneshot(
            browser_request(Method::POST, "/SAML2/SOAP/ArtifactResolution")
                .body(Body::from(resolve_body()?))?,
        )
        .await?;
    assert_eq!(replay.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let fault = SoapEnvelope::parse(&body_text(replay).await)?.fault();
    let (code, _) = fault.ok_or_else(|| anyhow::anyhow!("expected a SOAP fault"))?;
    assert_eq!(code, "SOAP-ENV:Client");
    Ok(())
}

/// Wrong password returns to the form; the right one completes the
/// request and later requests ride on the session.
#[tokio::test]
async fn password_login_flow() -> anyhow::Result<()> {
    let app = app();
    let uri = format!("{SSO}?{}", redirect_query(&post_binding_request(), None));
    let response = app
        .clone()
        .oneshot(browser_request(Method::GET, &uri).body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let login = location(&response);
    assert!(login.starts_with("/ui/login.html?requestId="));
    let request_id = query_param(&login, "requestId").unwrap_or_default();

    let page = app
        .clone()
        .oneshot(browser_request(Method::GET, &login).body(Body::empty())?)
        .await?;
    assert_eq!(page.status(), StatusCode::OK);
    assert!(body_text(page).await.contains(&request_id));

    let form = |password: &str| {
        format!(
            "requestId={}&username=jdoe&password={}",
            urlencoding::encode(&request_id),
            urlencoding::encode(password)
        )
    };
    let post_login = |body: String| {
        browser_request(Method::POST, "/ui/login.html")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(body))
    };

    let rejected = app.clone().oneshot(post_login(form("wrong"))?).await?;
    assert_eq!(rejected.status(), StatusCode::FOUND);
    assert!(!rejected.headers().contains_key(SET_COOKIE));
    let retry = location(&rejected);
    assert!(retry.starts_with("/ui/login.html?"));
    assert_eq!(
        query_param(&retry, "error").as_deref(),
        Some("Invalid login or password. Please try again.")
    );

    let accepted = app.clone().oneshot(post_login(form(PASSWORD))?).await?;
    assert_eq!(accepted.status(), StatusCode::OK);
    let cookie = accepted
        .headers()
        .get(SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .unwrap_or_default()
        .to_string();
    assert!(cookie.starts_with("lidp-session="));
    let assertion = Response::from_element(&Element::parse(&post_form_response(
        &body_text(accepted).await,
    ))?)?
    .assertion;
    let subject = assertion.and_then(|a| a.subject);
    assert_eq!(subject.map(|s| s.name_id.value).as_deref(), Some("jdoe"));

    let uri = format!("{SSO}?{}", redirect_query(&post_binding_request(), None));
    let again = app
        .oneshot(
            browser_request(Method::GET, &uri)
                .header(COOKIE, cookie)
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(again.status(), StatusCode::OK);
    assert!(!again.headers().contains_key(SET_COOKIE));
    Ok(())
}

#[tokio::test]
async fn long_relay_state_is_rejected_before_login() -> anyhow::Result<()> {
    let relay_state = "r".repeat(81);
    let uri = format!(
        "{SSO}?{}",
        redirect_query(&post_binding_request(), Some(&relay_state))
    );
    let response = app().oneshot(certificate_get(&uri)).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(!response.headers().contains_key(SET_COOKIE));
    assert!(!response.headers().contains_key(LOCATION));
    Ok(())
}

#[tokio::test]
async fn relay_state_of_eighty_characters_is_accepted() -> anyhow::Result<()> {
    let relay_state = "r".repeat(80);
    let uri = format!(
        "{SSO}?{}",
        redirect_query(&post_binding_request(), Some(&relay_state))
    );
    let response = app().oneshot(certificate_get(&uri)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn unregistered_issuer_is_rejected() -> anyhow::Result<()> {
    let request = AuthnRequest::new(new_id(), "https://rogue.example.com/", Utc::now());
    let uri = format!("{SSO}?{}", redirect_query(&request, None));
    let response = app().oneshot(certificate_get(&uri)).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(!response.headers().contains_key(SET_COOKIE));
    Ok(())
}

#[tokio::test]
async fn unregistered_acs_is_rejected() -> anyhow::Result<()> {
    let request = AuthnRequest::new(new_id(), SP, Utc::now())
        .with_acs_url("https://evil.example.com/acs");
    let uri = format!("{SSO}?{}", redirect_query(&request, None));
    let response = app().oneshot(certificate_get(&uri)).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn dsa_signature_is_rejected() -> anyhow::Result<()> {
    let query = std::fs::read_to_string(testdata("redirect-rsa-sha1.query"))?
        .trim()
        .replace("rsa-sha1", "dsa-sha1");
    let response = app()
        .oneshot(certificate_get(&format!("{SSO}?{query}")))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

/// A request signed with RSA-SHA1 by an external toolchain.
#[tokio::test]
async fn rsa_sha1_signed_request_is_accepted() -> anyhow::Result<()> {
    let query = std::fs::read_to_string(testdata("redirect-rsa-sha1.query"))?;
    let response = app()
        .oneshot(certificate_get(&format!("{SSO}?{}", query.trim())))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains(r#"name="RelayState" value="legacy-state""#));
    let saml_response = Response::from_element(&Element::parse(&post_form_response(&html))?)?;
    assert_eq!(
        saml_response.in_response_to.as_deref(),
        Some("_legacy-request-1")
    );
    Ok(())
}

#[tokio::test]
async fn garbage_request_is_malformed() -> anyhow::Result<()> {
    let response = app()
        .oneshot(certificate_get(&format!("{SSO}?SAMLRequest=%21%21%21")))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}
