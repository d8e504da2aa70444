//! Cache provider traits.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};

use crate::error::CacheResult;

/// Key to bytes store with a per-store expiration.
///
/// Values are opaque; implementations never expose a partially written
/// entry. Every entry lives for the store's [`ttl`](CacheProvider::ttl)
/// from the moment it was set.
#[async_trait]
pub trait CacheProvider: Send + Sync {
    /// Gets a value from the cache.
    ///
    /// Returns `CacheError::CacheMiss` if the key doesn't exist or has expired.
    async fn get(&self, key: &str) -> CacheResult<Vec<u8>>;

    /// Stores a value, replacing any previous entry and restarting its TTL.
    async fn set(&self, key: &str, value: Vec<u8>) -> CacheResult<()>;

    /// Deletes a value from the cache.
    ///
    /// Returns `Ok(())` even if the key doesn't exist.
    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Gets and deletes a value atomically.
    ///
    /// Of several concurrent callers at most one receives the value; the
    /// others see `CacheError::CacheMiss`.
    async fn take(&self, key: &str) -> CacheResult<Vec<u8>>;

    /// Lifetime of entries written to this store.
    fn ttl(&self) -> Duration;
}

/// JSON helpers over any [`CacheProvider`].
#[async_trait]
pub trait CacheProviderExt: CacheProvider {
    /// Gets and deserializes a value.
    async fn get_json<T>(&self, key: &str) -> CacheResult<T>
    where
        T: DeserializeOwned + Send,
    {
        let bytes = self.get(key).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Serializes and stores a value.
    async fn set_json<T>(&self, key: &str, value: &T) -> CacheResult<()>
    where
        T: Serialize + Sync,
    {
        let bytes = serde_json::to_vec(value)?;
        self.set(key, bytes).await
    }

    /// Atomically removes and deserializes a value.
    async fn take_json<T>(&self, key: &str) -> CacheResult<T>
    where
        T: DeserializeOwned + Send,
    {
        let bytes = self.take(key).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl<C: CacheProvider + ?Sized> CacheProviderExt for C {}
