//! SAML Assertion types.

use chrono::{DateTime, Duration, Utc};

use super::{CM_BEARER, Issuer, NameId, SAML_NS};
use crate::error::{SamlError, SamlResult};
use crate::xml::{Element, escape, escape_attr, format_instant, optional_attr, parse_instant, required_attr};

/// `saml:Assertion`.
///
/// Rendering always declares the `saml` prefix on the Assertion element so
/// the element can be signed on its own or embedded in any envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assertion {
    /// Assertion ID.
    pub id: String,
    /// When the assertion was issued.
    pub issue_instant: DateTime<Utc>,
    /// Issuing IdP.
    pub issuer: Issuer,
    /// Subject of the assertion.
    pub subject: Option<Subject>,
    /// Validity window and audience.
    pub conditions: Option<Conditions>,
    /// Authentication event.
    pub authn_statement: Option<AuthnStatement>,
    /// Released attributes.
    pub attribute_statement: Option<AttributeStatement>,
}

impl Assertion {
    /// Renders the assertion.
    #[must_use]
    pub fn to_xml(&self) -> String {
        let mut out = format!(
            r#"<saml:Assertion xmlns:saml="{SAML_NS}" ID="{}" IssueInstant="{}" Version="2.0">"#,
            escape_attr(&self.id),
            format_instant(self.issue_instant)
        );
        out.push_str(&self.issuer.to_xml());
        if let Some(subject) = &self.subject {
            out.push_str(&subject.to_xml());
        }
        if let Some(conditions) = &self.conditions {
            out.push_str(&conditions.to_xml());
        }
        if let Some(statement) = &self.authn_statement {
            out.push_str(&statement.to_xml());
        }
        if let Some(statement) = &self.attribute_statement {
            out.push_str(&statement.to_xml());
        }
        out.push_str("</saml:Assertion>");
        out
    }

    /// Parses a `saml:Assertion` element.
    ///
    /// # Errors
    ///
    /// Returns `SamlError::MalformedRequest` on missing or invalid parts.
    pub fn from_element(element: &Element) -> SamlResult<Self> {
        if !element.is(SAML_NS, "Assertion") {
            return Err(SamlError::MalformedRequest(format!(
                "expected Assertion, found {}",
                element.local_name
            )));
        }
        Ok(Self {
            id: required_attr(element, "ID")?.to_string(),
            issue_instant: parse_instant(required_attr(element, "IssueInstant")?)?,
            issuer: Issuer::from_parent(element)
                .ok_or_else(|| SamlError::MalformedRequest("Assertion has no Issuer".into()))?,
            subject: element
                .child(SAML_NS, "Subject")
                .map(Subject::from_element)
                .transpose()?,
            conditions: element
                .child(SAML_NS, "Conditions")
                .map(Conditions::from_element)
                .transpose()?,
            authn_statement: element
                .child(SAML_NS, "AuthnStatement")
                .map(AuthnStatement::from_element)
                .transpose()?,
            attribute_statement: element
                .child(SAML_NS, "AttributeStatement")
                .map(AttributeStatement::from_element),
        })
    }

    /// Checks the Conditions window against `now`, allowing `margin` of
    /// clock skew on both ends.
    ///
    /// # Errors
    ///
    /// Returns `SamlError::MalformedRequest` when the assertion has no
    /// Conditions or is outside its window.
    pub fn check_validity(&self, now: DateTime<Utc>, margin: Duration) -> SamlResult<()> {
        let conditions = self
            .conditions
            .as_ref()
            .ok_or_else(|| SamlError::MalformedRequest("assertion has no Conditions".into()))?;
        if now + margin < conditions.not_before {
            return Err(SamlError::MalformedRequest("assertion is not yet valid".into()));
        }
        if now - margin >= conditions.not_on_or_after {
            return Err(SamlError::MalformedRequest("assertion has expired".into()));
        }
        Ok(())
    }
}

/// `saml:Subject`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    /// Subject identifier.
    pub name_id: NameId,
    /// Bearer confirmation, absent on attribute query responses.
    pub confirmation: Option<SubjectConfirmation>,
}

impl Subject {
    fn to_xml(&self) -> String {
        let confirmation = self
            .confirmation
            .as_ref()
            .map(SubjectConfirmation::to_xml)
            .unwrap_or_default();
        format!(
            "<saml:Subject>{}{confirmation}</saml:Subject>",
            self.name_id.to_xml()
        )
    }

    /// Parses a `saml:Subject` element.
    ///
    /// # Errors
    ///
    /// Returns `SamlError::MalformedRequest` if there is no NameID.
    pub fn from_element(element: &Element) -> SamlResult<Self> {
        let name_id = element
            .child(SAML_NS, "NameID")
            .ok_or_else(|| SamlError::MalformedRequest("Subject has no NameID".into()))?;
        Ok(Self {
            name_id: NameId::from_element(name_id)?,
            confirmation: element
                .child(SAML_NS, "SubjectConfirmation")
                .map(SubjectConfirmation::from_element)
                .transpose()?,
        })
    }
}

/// `saml:SubjectConfirmation` with its data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectConfirmation {
    /// Confirmation method URI.
    pub method: String,
    /// Client address.
    pub address: Option<String>,
    /// ID of the request being answered.
    pub in_response_to: Option<String>,
    /// ACS URL the assertion is meant for.
    pub recipient: Option<String>,
    /// End of the confirmation window.
    pub not_on_or_after: Option<DateTime<Utc>>,
}

impl SubjectConfirmation {
    /// Bearer confirmation with every data field set.
    #[must_use]
    pub fn bearer(
        address: Option<String>,
        in_response_to: impl Into<String>,
        recipient: impl Into<String>,
        not_on_or_after: DateTime<Utc>,
    ) -> Self {
        Self {
            method: CM_BEARER.to_string(),
            address,
            in_response_to: Some(in_response_to.into()),
            recipient: Some(recipient.into()),
            not_on_or_after: Some(not_on_or_after),
        }
    }

    fn to_xml(&self) -> String {
        let not_on_or_after = self.not_on_or_after.map(format_instant);
        format!(
            r#"<saml:SubjectConfirmation Method="{}"><saml:SubjectConfirmationData{}{}{}{}/></saml:SubjectConfirmation>"#,
            escape_attr(&self.method),
            optional_attr("Address", self.address.as_deref()),
            optional_attr("InResponseTo", self.in_response_to.as_deref()),
            optional_attr("NotOnOrAfter", not_on_or_after.as_deref()),
            optional_attr("Recipient", self.recipient.as_deref()),
        )
    }

    fn from_element(element: &Element) -> SamlResult<Self> {
        let data = element.child(SAML_NS, "SubjectConfirmationData");
        let data_attr = |name: &str| data.and_then(|d| d.attr(name)).map(str::to_string);
        Ok(Self {
            method: required_attr(element, "Method")?.to_string(),
            address: data_attr("Address"),
            in_response_to: data_attr("InResponseTo"),
            recipient: data_attr("Recipient"),
            not_on_or_after: data_attr("NotOnOrAfter")
                .map(|v| parse_instant(&v))
                .transpose()?,
        })
    }
}

/// `saml:Conditions` with a single AudienceRestriction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conditions {
    /// Start of the validity window.
    pub not_before: DateTime<Utc>,
    /// End of the validity window (exclusive).
    pub not_on_or_after: DateTime<Utc>,
    /// Audiences; empty means no restriction.
    pub audiences: Vec<String>,
}

impl Conditions {
    /// Window of `lifetime` starting at `now`, restricted to `audience`.
    #[must_use]
    pub fn for_audience(now: DateTime<Utc>, lifetime: Duration, audience: impl Into<String>) -> Self {
        Self {
            not_before: now,
            not_on_or_after: now + lifetime,
            audiences: vec![audience.into()],
        }
    }

    fn to_xml(&self) -> String {
        let restriction = if self.audiences.is_empty() {
            String::new()
        } else {
            let audiences: String = self
                .audiences
                .iter()
                .map(|a| format!("<saml:Audience>{}</saml:Audience>", escape(a)))
                .collect();
            format!("<saml:AudienceRestriction>{audiences}</saml:AudienceRestriction>")
        };
        format!(
            r#"<saml:Conditions NotBefore="{}" NotOnOrAfter="{}">{restriction}</saml:Conditions>"#,
            format_instant(self.not_before),
            format_instant(self.not_on_or_after)
        )
    }

    fn from_element(element: &Element) -> SamlResult<Self> {
        let audiences = element
            .children_named(SAML_NS, "AudienceRestriction")
            .flat_map(|r| r.children_named(SAML_NS, "Audience"))
            .map(|a| a.text().trim().to_string())
            .collect();
        Ok(Self {
            not_before: parse_instant(required_attr(element, "NotBefore")?)?,
            not_on_or_after: parse_instant(required_attr(element, "NotOnOrAfter")?)?,
            audiences,
        })
    }
}

/// `saml:AuthnStatement`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthnStatement {
    /// When the user authenticated.
    pub authn_instant: DateTime<Utc>,
    /// Session identifier.
    pub session_index: Option<String>,
    /// `AuthnContextClassRef` URI.
    pub authn_context_class_ref: String,
}

impl AuthnStatement {
    fn to_xml(&self) -> String {
        format!(
            r#"<saml:AuthnStatement AuthnInstant="{}"{}><saml:AuthnContext><saml:AuthnContextClassRef>{}</saml:AuthnContextClassRef></saml:AuthnContext></saml:AuthnStatement>"#,
            format_instant(self.authn_instant),
            optional_attr("SessionIndex", self.session_index.as_deref()),
            escape(&self.authn_context_class_ref)
        )
    }

    fn from_element(element: &Element) -> SamlResult<Self> {
        Ok(Self {
            authn_instant: parse_instant(required_attr(element, "AuthnInstant")?)?,
            session_index: element.attr("SessionIndex").map(str::to_string),
            authn_context_class_ref: element
                .child(SAML_NS, "AuthnContext")
                .and_then(|c| c.child_text(SAML_NS, "AuthnContextClassRef"))
                .unwrap_or_default(),
        })
    }
}

/// `saml:AttributeStatement`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AttributeStatement {
    /// Attributes in document order.
    pub attributes: Vec<Attribute>,
}

impl AttributeStatement {
    /// Builds a statement from name/value pairs, each rendered with the
    /// basic name format and the name repeated as FriendlyName.
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a Vec<String>)>,
    {
        Self {
            attributes: pairs
                .into_iter()
                .map(|(name, values)| Attribute::basic(name, values.clone()))
                .collect(),
        }
    }

    /// Values of the named attribute.
    #[must_use]
    pub fn values(&self, name: &str) -> Option<&[String]> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.values.as_slice())
    }

    fn to_xml(&self) -> String {
        let attributes: String = self.attributes.iter().map(Attribute::to_xml).collect();
        format!("<saml:AttributeStatement>{attributes}</saml:AttributeStatement>")
    }

    fn from_element(element: &Element) -> Self {
        Self {
            attributes: element
                .children_named(SAML_NS, "Attribute")
                .filter_map(|a| {
                    Some(Attribute {
                        name: a.attr("Name")?.to_string(),
                        friendly_name: a.attr("FriendlyName").map(str::to_string),
                        name_format: a.attr("NameFormat").map(str::to_string),
                        values: a
                            .children_named(SAML_NS, "AttributeValue")
                            .map(Element::text)
                            .collect(),
                    })
                })
                .collect(),
        }
    }
}

/// `saml:Attribute`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Attribute name.
    pub name: String,
    /// Display name.
    pub friendly_name: Option<String>,
    /// Name format URI.
    pub name_format: Option<String>,
    /// Values in order.
    pub values: Vec<String>,
}

impl Attribute {
    /// Attribute with the basic name format and FriendlyName = Name.
    #[must_use]
    pub fn basic(name: impl Into<String>, values: Vec<String>) -> Self {
        let name = name.into();
        Self {
            friendly_name: Some(name.clone()),
            name,
            name_format: Some(super::ATTRNAME_FORMAT_BASIC.to_string()),
            values,
        }
    }

    fn to_xml(&self) -> String {
        let values: String = self
            .values
            .iter()
            .map(|v| format!("<saml:AttributeValue>{}</saml:AttributeValue>", escape(v)))
            .collect();
        format!(
            r#"<saml:Attribute{} Name="{}"{}>{values}</saml:Attribute>"#,
            optional_attr("FriendlyName", self.friendly_name.as_deref()),
            escape_attr(&self.name),
            optional_attr("NameFormat", self.name_format.as_deref()),
        )
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::types::NameIdFormat;

    fn sample(now: DateTime<Utc>) -> Assertion {
        let mut attrs = std::collections::BTreeMap::new();
        attrs.insert("roles".to_string(), vec!["user".to_string(), "admin".to_string()]);
        Assertion {
            id: "_a1".to_string(),
            issue_instant: now,
            issuer: Issuer::new("https://idp.example.com/"),
            subject: Some(Subject {
                name_id: NameId::new("jane", NameIdFormat::Unspecified.uri()),
                confirmation: Some(SubjectConfirmation::bearer(
                    Some("10.0.0.1".to_string()),
                    "_req",
                    "https://sp.example.com/acs",
                    now + Duration::minutes(5),
                )),
            }),
            conditions: Some(Conditions::for_audience(
                now,
                Duration::minutes(5),
                "https://sp.example.com/saml",
            )),
            authn_statement: Some(AuthnStatement {
                authn_instant: now,
                session_index: Some("_s1".to_string()),
                authn_context_class_ref: "urn:oasis:names:tc:SAML:2.0:ac:classes:X509".to_string(),
            }),
            attribute_statement: Some(AttributeStatement::from_pairs(&attrs)),
        }
    }

    #[test]
    fn renders_and_parses() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let assertion = sample(now);
        let xml = assertion.to_xml();
        assert!(xml.starts_with(r#"<saml:Assertion xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="_a1""#));
        assert!(xml.contains(r#"NameFormat="urn:oasis:names:tc:SAML:2.0:attrname-format:basic""#));

        let parsed = Assertion::from_element(&Element::parse(&xml).unwrap()).unwrap();
        assert_eq!(parsed, assertion);
        assert_eq!(
            parsed.attribute_statement.unwrap().values("roles").unwrap(),
            ["user", "admin"]
        );
    }

    #[test]
    fn validity_window() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let assertion = sample(now);
        let margin = Duration::seconds(30);

        assert!(assertion.check_validity(now, margin).is_ok());
        assert!(assertion.check_validity(now - Duration::seconds(10), margin).is_ok());
        assert!(assertion.check_validity(now - Duration::minutes(1), margin).is_err());
        assert!(assertion.check_validity(now + Duration::minutes(5), margin).is_ok());
        assert!(assertion.check_validity(now + Duration::minutes(6), margin).is_err());
    }

    #[test]
    fn missing_issuer_is_rejected() {
        let xml = format!(
            r#"<saml:Assertion xmlns:saml="{SAML_NS}" ID="_x" IssueInstant="2024-01-01T00:00:00Z" Version="2.0"/>"#
        );
        assert!(Assertion::from_element(&Element::parse(&xml).unwrap()).is_err());
    }
}
