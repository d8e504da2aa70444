//! Cache error types.

use std::fmt;

/// Cache operation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Key is absent or its entry has expired.
    CacheMiss,
    /// Serialization/deserialization error.
    Serialization(String),
    /// Backend failure (connection, protocol, ...).
    Backend(String),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CacheMiss => write!(f, "cache miss"),
            Self::Serialization(msg) => write!(f, "cache serialization error: {msg}"),
            Self::Backend(msg) => write!(f, "cache backend error: {msg}"),
        }
    }
}

impl std::error::Error for CacheError {}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
