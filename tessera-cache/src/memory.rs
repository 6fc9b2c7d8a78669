//! In-memory cache backend.

use crate::error::CacheResult;
use crate::traits::CacheStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// In-memory cache with per-entry expiry.
///
/// Expired entries are evicted lazily on read. Suitable for tests and
/// single-process deployments; use [`crate::RedisCache`] when entries must be
/// shared across processes.
pub struct MemoryCache {
    data: Arc<RwLock<HashMap<String, CacheEntry>>>,
    default_ttl: Option<Duration>,
}

#[derive(Clone)]
struct CacheEntry {
    value: String,
    expires_at: Option<tokio::time::Instant>,
}

impl CacheEntry {
    fn is_expired(&self, now: tokio::time::Instant) -> bool {
        self.expires_at.is_some_and(|exp| now > exp)
    }
}

impl MemoryCache {
    /// Create a new in-memory cache with no default TTL.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
            default_ttl: None,
        }
    }

    /// Create a new in-memory cache with a default TTL applied when
    /// `set_json` is called without one.
    pub fn with_default_ttl(ttl: Duration) -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
            default_ttl: Some(ttl),
        }
    }

    /// Remove all expired entries.
    pub async fn evict_expired(&self) {
        let mut data = self.data.write().await;
        let now = tokio::time::Instant::now();
        data.retain(|_, entry| !entry.is_expired(now));
    }

    /// Number of live (unexpired) entries.
    pub async fn len(&self) -> usize {
        let data = self.data.read().await;
        let now = tokio::time::Instant::now();
        data.values().filter(|e| !e.is_expired(now)).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MemoryCache {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            default_ttl: self.default_ttl,
        }
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get_json(&self, key: &str) -> CacheResult<Option<String>> {
        let data = self.data.read().await;
        match data.get(key) {
            Some(entry) if !entry.is_expired(tokio::time::Instant::now()) => {
                Ok(Some(entry.value.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn set_json(&self, key: &str, value: String, ttl: Option<Duration>) -> CacheResult<()> {
        let ttl = ttl.or(self.default_ttl);
        let expires_at = ttl.map(|d| tokio::time::Instant::now() + d);
        let entry = CacheEntry { value, expires_at };
        self.data.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.data.write().await.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        self.get_json(key).await.map(|v| v.is_some())
    }

    async fn clear(&self) -> CacheResult<()> {
        self.data.write().await.clear();
        Ok(())
    }

    async fn ttl(&self, key: &str) -> CacheResult<Option<Duration>> {
        let data = self.data.read().await;
        match data.get(key) {
            Some(entry) => {
                let now = tokio::time::Instant::now();
                match entry.expires_at {
                    Some(expires_at) if expires_at > now => Ok(Some(expires_at - now)),
                    _ => Ok(None),
                }
            }
            None => Ok(None),
        }
    }
}
