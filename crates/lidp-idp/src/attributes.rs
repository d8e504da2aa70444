//! Attribute retrievers.
//!
//! Each retriever returns `attribute -> values` for a user. The engine
//! runs every configured retriever in order; a later retriever replaces
//! values an earlier one returned for the same attribute.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use lidp_auth::User;
use lidp_cache::{CacheError, CacheProvider, CacheProviderExt};

use crate::error::{IdpError, IdpResult};

/// Attribute values keyed by attribute name.
pub type Attributes = BTreeMap<String, Vec<String>>;

/// Source of user attributes.
#[async_trait]
pub trait AttributeRetriever: Send + Sync {
    /// Attributes of `user`; an unknown user has none.
    async fn retrieve(&self, user: &User) -> IdpResult<Attributes>;
}

/// Fixed attributes per user name.
#[derive(Debug, Clone, Default)]
pub struct StaticRetriever {
    users: HashMap<String, Attributes>,
}

impl StaticRetriever {
    /// Creates a retriever over `user name -> attributes`.
    #[must_use]
    pub fn new(users: HashMap<String, Attributes>) -> Self {
        Self { users }
    }

    /// Adds one user's attributes.
    #[must_use]
    pub fn with_user(mut self, name: impl Into<String>, attributes: Attributes) -> Self {
        self.users.insert(name.into(), attributes);
        self
    }
}

#[async_trait]
impl AttributeRetriever for StaticRetriever {
    async fn retrieve(&self, user: &User) -> IdpResult<Attributes> {
        Ok(self.users.get(&user.name).cloned().unwrap_or_default())
    }
}

/// Attributes read from a JSON document of the form
/// `{"<user>": {"<attribute>": ["<value>", ...]}}`.
///
/// The file is read once, at construction.
#[derive(Debug, Clone)]
pub struct JsonFileRetriever {
    inner: StaticRetriever,
}

impl JsonFileRetriever {
    /// Parses the JSON text.
    ///
    /// # Errors
    ///
    /// Returns `IdpError::Json` if the document has the wrong shape.
    pub fn from_json(json: &str) -> IdpResult<Self> {
        let users: HashMap<String, Attributes> = serde_json::from_str(json)?;
        Ok(Self {
            inner: StaticRetriever::new(users),
        })
    }

    /// Reads and parses `path`.
    ///
    /// # Errors
    ///
    /// Returns `IdpError::Io` or `IdpError::Json`.
    pub fn from_file(path: impl AsRef<Path>) -> IdpResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let retriever = Self::from_json(&json)?;
        tracing::info!(path = %path.display(), users = retriever.inner.users.len(), "loaded attribute store");
        Ok(retriever)
    }
}

#[async_trait]
impl AttributeRetriever for JsonFileRetriever {
    async fn retrieve(&self, user: &User) -> IdpResult<Attributes> {
        self.inner.retrieve(user).await
    }
}

/// Attributes stored as a JSON map in a cache, keyed by user name.
///
/// Lets another process publish attributes (for example from a directory
/// sync job) into a shared cache.
#[derive(Clone)]
pub struct CacheRetriever {
    cache: Arc<dyn CacheProvider>,
    prefix: String,
}

impl CacheRetriever {
    /// Reads entries `<prefix><user name>` from `cache`.
    #[must_use]
    pub fn new(cache: Arc<dyn CacheProvider>, prefix: impl Into<String>) -> Self {
        Self {
            cache,
            prefix: prefix.into(),
        }
    }
}

impl std::fmt::Debug for CacheRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheRetriever")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl AttributeRetriever for CacheRetriever {
    async fn retrieve(&self, user: &User) -> IdpResult<Attributes> {
        let key = format!("{}{}", self.prefix, user.name);
        match self.cache.get_json::<Attributes>(&key).await {
            Ok(attributes) => Ok(attributes),
            Err(CacheError::CacheMiss) => Ok(Attributes::new()),
            Err(err) => Err(IdpError::Attributes(err.to_string())),
        }
    }
}

/// Runs `retrievers` in order and merges their results by attribute name.
///
/// # Errors
///
/// Fails on the first retriever error.
pub async fn collect_attributes(
    retrievers: &[Arc<dyn AttributeRetriever>],
    user: &User,
) -> IdpResult<Attributes> {
    let mut merged = Attributes::new();
    for retriever in retrievers {
        merged.extend(retriever.retrieve(user).await?);
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use lidp_cache::InMemoryCache;
    use lidp_protocol_saml::{AuthnContextClass, NameIdFormat};

    fn user(name: &str) -> User {
        User::new(name, NameIdFormat::Unspecified, AuthnContextClass::Unspecified, "")
    }

    fn attrs(pairs: &[(&str, &[&str])]) -> Attributes {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.iter().map(|s| (*s).to_string()).collect()))
            .collect()
    }

    #[tokio::test]
    async fn json_store() {
        let retriever = JsonFileRetriever::from_json(
            r#"{"jdoe": {"mail": ["jdoe@example.com"], "roles": ["user", "admin"]}}"#,
        )
        .unwrap();

        let found = retriever.retrieve(&user("jdoe")).await.unwrap();
        assert_eq!(found["roles"], vec!["user", "admin"]);
        assert!(retriever.retrieve(&user("nobody")).await.unwrap().is_empty());
    }

    #[test]
    fn json_store_rejects_wrong_shape() {
        assert!(matches!(
            JsonFileRetriever::from_json(r#"{"jdoe": ["mail"]}"#),
            Err(IdpError::Json(_))
        ));
    }

    #[tokio::test]
    async fn cache_backed() {
        let cache = Arc::new(InMemoryCache::new(Duration::from_secs(60)));
        cache
            .set_json("attrs:jdoe", &attrs(&[("mail", &["j@example.com"])]))
            .await
            .unwrap();
        let retriever = CacheRetriever::new(cache, "attrs:");

        let found = retriever.retrieve(&user("jdoe")).await.unwrap();
        assert_eq!(found["mail"], vec!["j@example.com"]);
        assert!(retriever.retrieve(&user("other")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn later_retrievers_replace_earlier_values() {
        let first: Arc<dyn AttributeRetriever> = Arc::new(StaticRetriever::default().with_user(
            "jdoe",
            attrs(&[("mail", &["old@example.com"]), ("cn", &["Jane"])]),
        ));
        let second: Arc<dyn AttributeRetriever> = Arc::new(
            StaticRetriever::default().with_user("jdoe", attrs(&[("mail", &["new@example.com"])])),
        );

        let merged = collect_attributes(&[first, second], &user("jdoe")).await.unwrap();
        assert_eq!(merged["mail"], vec!["new@example.com"]);
        assert_eq!(merged["cn"], vec!["Jane"]);
        assert_eq!(merged.keys().collect::<Vec<_>>(), vec!["cn", "mail"]);
    }
}
