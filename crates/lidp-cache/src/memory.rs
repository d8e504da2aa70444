//! In-process cache backed by a concurrent hash map.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use crate::error::{CacheError, CacheResult};
use crate::provider::CacheProvider;

/// Number of writes between sweeps of expired entries.
const SWEEP_INTERVAL: u64 = 256;

/// Longest lifetime an entry is given, whatever the configured TTL.
const MAX_TTL: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

#[derive(Debug)]
struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

fn expiry(now: Instant, ttl: Duration) -> Instant {
    now.checked_add(ttl.min(MAX_TTL)).unwrap_or(now)
}

/// In-memory [`CacheProvider`] with a fixed TTL.
///
/// Expired entries are never returned. They are dropped lazily on access
/// and swept in bulk every few hundred writes, so no background task is
/// needed.
#[derive(Debug)]
pub struct InMemoryCache {
    entries: DashMap<String, Entry>,
    ttl: Duration,
    writes: AtomicU64,
}

impl InMemoryCache {
    /// Creates an empty cache whose entries live for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            writes: AtomicU64::new(0),
        }
    }

    /// Number of stored entries, including expired ones not yet swept.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every expired entry.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(removed, "purged expired cache entries");
        }
    }
}

#[async_trait]
impl CacheProvider for InMemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Vec<u8>> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired(now) {
                return Ok(entry.value.clone());
            }
        }
        self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        Err(CacheError::CacheMiss)
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> CacheResult<()> {
        let entry = Entry {
            value,
            expires_at: expiry(Instant::now(), self.ttl),
        };
        self.entries.insert(key.to_string(), entry);

        if self.writes.fetch_add(1, Ordering::Relaxed) % SWEEP_INTERVAL == SWEEP_INTERVAL - 1 {
            self.purge_expired();
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn take(&self, key: &str) -> CacheResult<Vec<u8>> {
        match self.entries.remove(key) {
            Some((_, entry)) if !entry.is_expired(Instant::now()) => Ok(entry.value),
            _ => Err(CacheError::CacheMiss),
        }
    }

    fn ttl(&self) -> Duration {
        self.ttl
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::provider::CacheProviderExt;

    #[tokio::test]
    async fn set_then_get() {
        let cache = InMemoryCache::new(Duration::from_secs(60));
        cache.set("k", b"value".to_vec()).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), b"value");
        // get does not consume
        assert_eq!(cache.get("k").await.unwrap(), b"value");
    }

    #[tokio::test]
    async fn huge_ttl_is_capped() {
        let cache = InMemoryCache::new(Duration::MAX);
        cache.set("k", vec![1]).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), vec![1]);

        let now = Instant::now();
        assert_eq!(expiry(now, Duration::MAX), now + MAX_TTL);
        assert_eq!(expiry(now, Duration::from_secs(5)), now + Duration::from_secs(5));
    }

    #[tokio::test]
    async fn unknown_key_is_a_miss() {
        let cache = InMemoryCache::new(Duration::from_secs(60));
        assert_eq!(cache.get("missing").await, Err(CacheError::CacheMiss));
        assert_eq!(cache.take("missing").await, Err(CacheError::CacheMiss));
    }

    #[tokio::test]
    async fn expired_entries_are_never_returned() {
        let cache = InMemoryCache::new(Duration::from_millis(20));
        cache.set("k", vec![1, 2, 3]).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(cache.get("k").await, Err(CacheError::CacheMiss));
        assert!(cache.is_empty());

        cache.set("k", vec![1]).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(cache.take("k").await, Err(CacheError::CacheMiss));
    }

    #[tokio::test]
    async fn take_consumes_once() {
        let cache = InMemoryCache::new(Duration::from_secs(60));
        cache.set("artifact", vec![9]).await.unwrap();

        assert_eq!(cache.take("artifact").await.unwrap(), vec![9]);
        assert_eq!(cache.take("artifact").await, Err(CacheError::CacheMiss));
        assert_eq!(cache.get("artifact").await, Err(CacheError::CacheMiss));
    }

    #[tokio::test]
    async fn concurrent_take_has_single_winner() {
        let cache = Arc::new(InMemoryCache::new(Duration::from_secs(60)));
        cache.set("once", vec![7]).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move { cache.take("once").await.is_ok() }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let cache = InMemoryCache::new(Duration::from_secs(60));
        cache.set("k", vec![1]).await.unwrap();
        cache.delete("k").await.unwrap();
        cache.delete("k").await.unwrap();
        assert_eq!(cache.get("k").await, Err(CacheError::CacheMiss));
    }

    #[tokio::test]
    async fn purge_drops_only_expired() {
        let cache = InMemoryCache::new(Duration::from_millis(20));
        cache.set("old", vec![1]).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        cache.entries.insert(
            "fresh".to_string(),
            Entry {
                value: vec![2],
                expires_at: Instant::now() + Duration::from_secs(60),
            },
        );

        cache.purge_expired();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("fresh").await.unwrap(), vec![2]);
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Pending {
        id: String,
        relay_state: Option<String>,
    }

    #[tokio::test]
    async fn json_helpers() {
        let cache: Arc<dyn CacheProvider> = Arc::new(InMemoryCache::new(Duration::from_secs(60)));
        let pending = Pending {
            id: "_abc".to_string(),
            relay_state: Some("xyz".to_string()),
        };
        cache.set_json("p", &pending).await.unwrap();

        let loaded: Pending = cache.get_json("p").await.unwrap();
        assert_eq!(loaded, pending);

        let taken: Pending = cache.take_json("p").await.unwrap();
        assert_eq!(taken, pending);
        assert_eq!(
            cache.get_json::<Pending>("p").await,
            Err(CacheError::CacheMiss)
        );
    }
}
