//! The authenticated principal.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use lidp_protocol_saml::{AuthnContextClass, NameIdFormat};

/// A user as seen by the protocol engine once authenticated.
///
/// Stored in the session cache and in artifact entries, so it must stay
/// serializable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Subject identifier placed in the NameID.
    pub name: String,
    /// NameID format URI.
    pub format: String,
    /// AuthnContextClassRef URI.
    pub context: String,
    /// Source address of the login.
    pub ip: String,
    /// Released attributes, ordered by name.
    #[serde(default)]
    pub attributes: BTreeMap<String, Vec<String>>,
}

impl User {
    /// Creates a user without attributes.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        format: NameIdFormat,
        context: AuthnContextClass,
        ip: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            format: format.uri().to_string(),
            context: context.uri().to_string(),
            ip: ip.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Adds values to an attribute, replacing any previous ones.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, values: Vec<String>) -> Self {
        self.attributes.insert(name.into(), values);
        self
    }

    /// Values of one attribute.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&[String]> {
        self.attributes.get(name).map(Vec::as_slice)
    }
}
