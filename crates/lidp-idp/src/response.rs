//! Response construction.
//!
//! Every endpoint that issues an assertion goes through [`make_response`]:
//! browser SSO over POST or artifact, ECP, and attribute queries. Signing is
//! a separate step on the rendered text, so a built [`Response`] can still
//! be wrapped (for example in an ArtifactResponse) before the assertion is
//! signed.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use lidp_auth::User;
use lidp_protocol_saml::signature::XmlSigner;
use lidp_protocol_saml::{
    Assertion, AttributeQuery, AttributeStatement, AuthnRequest, AuthnStatement, Conditions,
    Issuer, NameId, Response, SamlResult, Status, Subject, SubjectConfirmation,
};

/// Validity window of issued assertions and bearer confirmations.
#[must_use]
pub fn assertion_lifetime() -> Duration {
    Duration::minutes(5)
}

/// An AuthnRequest that passed validation, with the endpoint and binding
/// the response will use. Cached while the user logs in and inside
/// artifact entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRequest {
    /// The request, RelayState included.
    pub request: AuthnRequest,
    /// Resolved assertion consumer service URL.
    pub acs_url: String,
    /// Binding URI of the response.
    pub binding: String,
}

/// State behind an issued artifact. The response is rebuilt and signed
/// when the artifact is resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactEntry {
    /// Authenticated user, attributes included.
    pub user: User,
    /// The request being answered.
    pub request: PendingRequest,
}

/// What a response answers.
#[derive(Debug, Clone)]
pub struct ResponseTarget {
    /// ID of the request being answered.
    pub in_response_to: String,
    /// Audience of the assertion (the requesting SP).
    pub audience: String,
    /// ACS URL. When set the assertion carries a bearer confirmation and
    /// an authentication statement; attribute query answers have neither.
    pub acs_url: Option<String>,
    /// Subject of the assertion.
    pub name_id: NameId,
}

impl ResponseTarget {
    /// Target for a browser or ECP sign-on.
    #[must_use]
    pub fn authn(idp_entity_id: &str, pending: &PendingRequest, user: &User) -> Self {
        Self {
            in_response_to: pending.request.id.clone(),
            audience: pending.request.issuer.clone(),
            acs_url: Some(pending.acs_url.clone()),
            name_id: NameId::new(&user.name, &user.format)
                .with_qualifiers(idp_entity_id, &pending.request.issuer),
        }
    }

    /// Target for an attribute query; the subject is echoed as queried.
    #[must_use]
    pub fn query(query: &AttributeQuery) -> Self {
        Self {
            in_response_to: query.id.clone(),
            audience: query.issuer.clone(),
            acs_url: None,
            name_id: query.name_id.clone(),
        }
    }
}

/// Builds a successful Response carrying one assertion about `user`.
///
/// Pure: identifiers are fresh, everything else derives from the
/// arguments. The assertion is valid from `now` for
/// [`assertion_lifetime`] and restricted to the target's audience.
#[must_use]
pub fn make_response(
    idp_entity_id: &str,
    target: &ResponseTarget,
    user: &User,
    now: DateTime<Utc>,
) -> Response {
    let lifetime = assertion_lifetime();
    let expires = now + lifetime;

    let confirmation = target.acs_url.as_ref().map(|acs_url| {
        SubjectConfirmation::bearer(
            Some(user.ip.clone()).filter(|ip| !ip.is_empty()),
            &target.in_response_to,
            acs_url,
            expires,
        )
    });
    let authn_statement = target.acs_url.as_ref().map(|_| AuthnStatement {
        authn_instant: now,
        session_index: Some(lidp_crypto::new_id()),
        authn_context_class_ref: user.context.clone(),
    });
    let attribute_statement = (!user.attributes.is_empty())
        .then(|| AttributeStatement::from_pairs(&user.attributes));

    Response {
        id: lidp_crypto::new_id(),
        in_response_to: Some(target.in_response_to.clone()),
        issue_instant: now,
        issuer: Issuer::entity(idp_entity_id),
        destination: target.acs_url.clone(),
        status: Status::success(),
        assertion: Some(Assertion {
            id: lidp_crypto::new_id(),
            issue_instant: now,
            issuer: Issuer::entity(idp_entity_id),
            subject: Some(Subject {
                name_id: target.name_id.clone(),
                confirmation,
            }),
            conditions: Some(Conditions::for_audience(now, lifetime, &target.audience)),
            authn_statement,
            attribute_statement,
        }),
    }
}

/// Signs the assertion of `response` inside `xml`, a rendering of the
/// response or of a message embedding it.
///
/// # Errors
///
/// Returns the signer's error; a response without an assertion is
/// returned unsigned.
pub fn sign_assertion(signer: &XmlSigner, xml: &str, response: &Response) -> SamlResult<String> {
    match &response.assertion {
        Some(assertion) => signer.sign_element(xml, &assertion.id),
        None => Ok(xml.to_string()),
    }
}
