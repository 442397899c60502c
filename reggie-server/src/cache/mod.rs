//! Key/value cache for menus, sessions and verification codes.
//!
//! Menu reads treat the cache as best effort: failures are logged and the
//! caller falls through to the database.

mod memory;
mod redis_cache;

pub use self::memory::InMemoryCache;
pub use self::redis_cache::RedisCache;

use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Reset the expiry of a live key without rewriting its value. Missing
    /// keys stay missing.
    async fn touch(&self, key: &str, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Delete every key starting with `prefix`.
    async fn delete_prefix(&self, prefix: &str) -> Result<(), CacheError>;
}

/// Read and decode a cached JSON value. Misses, backend failures and stale
/// encodings all come back as `None`.
pub async fn get_json<T: DeserializeOwned>(cache: &dyn Cache, key: &str) -> Option<T> {
    match cache.get(key).await {
        Ok(Some(raw)) => match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Discarding undecodable cache entry {}: {}", key, e);
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            warn!("Cache read failed for {}: {}", key, e);
            None
        }
    }
}

pub async fn put_json<T: Serialize>(cache: &dyn Cache, key: &str, value: &T, ttl: Duration) {
    let raw = match serde_json::to_string(value) {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Failed to encode cache entry {}: {}", key, e);
            return;
        }
    };
    if let Err(e) = cache.set(key, &raw, ttl).await {
        warn!("Cache write failed for {}: {}", key, e);
    }
}

pub async fn evict<I, K>(cache: &dyn Cache, keys: I)
where
    I: IntoIterator<Item = K>,
    K: AsRef<str>,
{
    for key in keys {
        if let Err(e) = cache.delete(key.as_ref()).await {
            warn!("Cache eviction failed for {}: {}", key.as_ref(), e);
        }
    }
}

pub async fn evict_prefix(cache: &dyn Cache, prefix: &str) {
    if let Err(e) = cache.delete_prefix(prefix).await {
        warn!("Cache eviction failed for {}*: {}", prefix, e);
    }
}
