//! SOAP back-channel services, ECP and metadata.

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{Method, StatusCode};
use chrono::Utc;
use tower::ServiceExt;

use lidp_crypto::new_id;
use lidp_idp::ClientCertificate;
use lidp_protocol_saml::bindings::soap::{SoapEnvelope, soap_envelope};
use lidp_protocol_saml::{
    ATTRNAME_FORMAT_BASIC, AttributeQuery, AuthnRequest, NameId, NameIdFormat, Response,
    SAMLP_NS, SamlBinding,
};

use lidp_integration_tests::*;

fn attribute_query(subject: &str) -> AttributeQuery {
    AttributeQuery {
        id: new_id(),
        issue_instant: Utc::now(),
        issuer: SP.into(),
        destination: Some("https://idp.example.com/SAML2/SOAP/AttributeQuery".into()),
        name_id: NameId::new(subject, NameIdFormat::X509SubjectName.uri()),
    }
}

async fn post_soap(uri: &str, body: String) -> anyhow::Result<axum::response::Response> {
    Ok(app()
        .oneshot(
            browser_request(Method::POST, uri)
                .header(CONTENT_TYPE, "text/xml")
                .body(Body::from(body))?,
        )
        .await?)
}

/// Attribute query for a known subject.
#[tokio::test]
async fn attribute_query_returns_registered_attributes() -> anyhow::Result<()> {
    let query = attribute_query(CLIENT_DN);
    let signed = sp_signer().sign_element(&query.to_xml(), &query.id)?;
    let response = post_soap("/SAML2/SOAP/AttributeQuery", soap_envelope(&signed)).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let xml = body_text(response).await;
    let envelope = SoapEnvelope::parse(&xml)?;
    let payload = envelope.payload()?;
    assert!(payload.is(SAMLP_NS, "Response"));
    let saml_response = Response::from_element(payload)?;
    assert_eq!(saml_response.in_response_to.as_deref(), Some(query.id.as_str()));

    let assertion = saml_response
        .assertion
        .ok_or_else(|| anyhow::anyhow!("no assertion"))?;
    assert!(assertion.authn_statement.is_none());
    let mut attributes = assertion
        .attribute_statement
        .ok_or_else(|| anyhow::anyhow!("no attributes"))?
        .attributes;
    attributes.sort_by(|a, b| a.name.cmp(&b.name));

    let names: Vec<&str> = attributes.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, ["mail", "roles"]);
    assert!(attributes
        .iter()
        .all(|a| a.name_format.as_deref() == Some(ATTRNAME_FORMAT_BASIC)));
    assert_eq!(attributes[0].values, ["jane.doe@example.com"]);
    assert_eq!(attributes[1].values, ["staff", "admin"]);
    Ok(())
}

#[tokio::test]
async fn attribute_query_with_bad_signature_faults() -> anyhow::Result<()> {
    let query = attribute_query(CLIENT_DN);
    let signed = sp_signer()
        .sign_element(&query.to_xml(), &query.id)?
        .replace(CLIENT_DN, "CN=Mallory");
    let response = post_soap("/SAML2/SOAP/AttributeQuery", soap_envelope(&signed)).await?;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(SoapEnvelope::parse(&body_text(response).await)?.fault().is_some());
    Ok(())
}

#[tokio::test]
async fn artifact_resolve_for_unknown_artifact_faults() -> anyhow::Result<()> {
    let resolve = lidp_protocol_saml::ArtifactResolve {
        id: new_id(),
        issue_instant: Utc::now(),
        issuer: SP.into(),
        artifact: lidp_protocol_saml::Artifact::new("https://idp.example.com/").encode(),
    };
    let signed = sp_signer().sign_element(&resolve.to_xml(), &resolve.id)?;
    let response = post_soap("/SAML2/SOAP/ArtifactResolution", soap_envelope(&signed)).await?;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok()),
        Some("text/xml; charset=utf-8")
    );
    let fault = SoapEnvelope::parse(&body_text(response).await)?.fault();
    assert_eq!(fault.map(|(code, _)| code).as_deref(), Some("SOAP-ENV:Client"));
    Ok(())
}

fn ecp_body() -> anyhow::Result<String> {
    let request = AuthnRequest::new(new_id(), SP, Utc::now())
        .with_acs_url(POST_ACS)
        .with_protocol_binding(SamlBinding::Paos.uri());
    Ok(soap_envelope(
        &sp_signer().sign_element(&request.to_xml(), &request.id)?,
    ))
}

#[tokio::test]
async fn ecp_with_certificate_returns_paos_response() -> anyhow::Result<()> {
    let response = app()
        .oneshot(
            browser_request(Method::POST, "/SAML2/SOAP/ECP")
                .extension(ClientCertificate(client_chain()))
                .body(Body::from(ecp_body()?))?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let xml = body_text(response).await;
    let envelope = SoapEnvelope::parse(&xml)?;
    let header = envelope.header().ok_or_else(|| anyhow::anyhow!("no SOAP header"))?;
    assert!(!header.children.is_empty());
    let saml_response = Response::from_element(envelope.payload()?)?;
    assert_eq!(saml_response.destination.as_deref(), Some(POST_ACS));
    let subject = saml_response.assertion.and_then(|a| a.subject);
    assert_eq!(subject.map(|s| s.name_id.value).as_deref(), Some(CLIENT_DN));
    Ok(())
}

#[tokio::test]
async fn ecp_without_certificate_is_forbidden() -> anyhow::Result<()> {
    let response = post_soap("/SAML2/SOAP/ECP", ecp_body()?).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_text(response).await, "403 Forbidden");
    Ok(())
}

#[tokio::test]
async fn metadata_describes_the_idp() -> anyhow::Result<()> {
    let response = app()
        .oneshot(browser_request(Method::GET, "/metadata").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok()),
        Some("application/samlmetadata+xml")
    );
    let xml = body_text(response).await;
    for expected in [
        "EntityDescriptor",
        "IDPSSODescriptor",
        "SingleSignOnService",
        "ArtifactResolutionService",
        "AttributeService",
        "X509Certificate",
        r#"entityID="https://idp.example.com/""#,
    ] {
        assert!(xml.contains(expected), "metadata lacks {expected}");
    }
    Ok(())
}
