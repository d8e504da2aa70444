//! # lidp-cache
//!
//! Expiring key/value storage for the identity provider.
//!
//! Two stores are used at runtime: a short-lived one (minutes) for pending
//! AuthnRequests and issued artifacts, and a long-lived one (hours) for
//! authenticated user sessions. Both are accessed through
//! [`CacheProvider`], which stores opaque bytes; [`CacheProviderExt`] adds
//! JSON convenience methods.
//!
//! ## Example
//!
//! ```ignore
//! use lidp_cache::{CacheProvider, CacheProviderExt, InMemoryCache};
//! use std::time::Duration;
//!
//! let cache = InMemoryCache::new(Duration::from_secs(300));
//! cache.set_json("request-id", &pending).await?;
//! let pending: Pending = cache.take_json("request-id").await?;
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod error;
pub mod memory;
pub mod provider;

pub use error::{CacheError, CacheResult};
pub use memory::InMemoryCache;
pub use provider::{CacheProvider, CacheProviderExt};
