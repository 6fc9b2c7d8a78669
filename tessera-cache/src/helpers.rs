//! Helper functions for typed cache access.

use crate::error::CacheResult;
use crate::traits::CacheStore;
use serde::{Serialize, de::DeserializeOwned};
use std::time::Duration;

/// Get a typed value from the cache.
pub async fn get<S, T>(store: &S, key: &str) -> CacheResult<Option<T>>
where
    S: CacheStore + ?Sized,
    T: DeserializeOwned,
{
    if let Some(json) = store.get_json(key).await? {
        let value: T = serde_json::from_str(&json)
            .map_err(|e| crate::error::CacheError::Deserialization(e.to_string()))?;
        Ok(Some(value))
    } else {
        Ok(None)
    }
}

/// Set a typed value in the cache.
pub async fn set<S, T>(store: &S, key: &str, value: &T, ttl: Option<Duration>) -> CacheResult<()>
where
    S: CacheStore + ?Sized,
    T: Serialize,
{
    let json = serde_json::to_string(value)
        .map_err(|e| crate::error::CacheError::Serialization(e.to_string()))?;
    store.set_json(key, json, ttl).await
}

/// Cache-aside read: return the cached value if present, otherwise call the
/// factory, cache its result for `ttl`, and return it.
pub async fn remember<S, T, F, Fut>(store: &S, key: &str, ttl: Duration, factory: F) -> CacheResult<T>
where
    S: CacheStore + ?Sized,
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = CacheResult<T>>,
{
    if let Some(value) = get(store, key).await? {
        return Ok(value);
    }

    let value = factory().await?;
    set(store, key, &value, Some(ttl)).await?;
    Ok(value)
}
