//! In-process cache used when no Redis URL is configured, and in tests.

use std::cmp;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{Cache, CacheError};

/// Below this many entries writes never sweep.
const MIN_SWEEP_LEN: usize = 64;

#[derive(Debug, Default)]
struct Entries {
    map: HashMap<String, (String, Instant)>,
    /// Size at which the next write drops expired entries; twice the live
    /// count after the previous sweep.
    sweep_at: usize,
}

impl Entries {
    fn sweep_if_due(&mut self, now: Instant) {
        if self.map.len() < cmp::max(self.sweep_at, MIN_SWEEP_LEN) {
            return;
        }
        self.map.retain(|_, (_, expires)| *expires > now);
        self.sweep_at = self.map.len() * 2;
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: Mutex<Entries>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut entries = self.entries.lock().await;
        match entries.map.get(key) {
            Some((_, expires)) if *expires <= Instant::now() => {
                entries.map.remove(key);
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        entries.sweep_if_due(now);
        entries
            .map
            .insert(key.to_string(), (value.to_string(), now + ttl));
        Ok(())
    }

    async fn touch(&self, key: &str, ttl: Duration) -> Result<(), CacheError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        if let Some((_, expires)) = entries.map.get_mut(key) {
            if *expires > now {
                *expires = now + ttl;
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.lock().await.map.remove(key);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<(), CacheError> {
        self.entries
            .lock()
            .await
            .map
            .retain(|key, _| !key.starts_with(prefix));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let cache = InMemoryCache::new();
        cache.set("a", "1", Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("a").await.unwrap().as_deref(), Some("1"));

        cache.set("a", "2", Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("a").await.unwrap().as_deref(), Some("2"));

        cache.delete("a").await.unwrap();
        assert_eq!(cache.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expired_entries_are_misses() {
        let cache = InMemoryCache::new();
        cache.set("code", "abcde", Duration::ZERO).await.unwrap();
        assert_eq!(cache.get("code").await.unwrap(), None);
        assert!(cache.entries.lock().await.map.is_empty());
    }

    #[tokio::test]
    async fn test_unread_expired_entries_are_swept() {
        let cache = InMemoryCache::new();
        for i in 0..1000 {
            cache
                .set(&format!("session:{}", i), "{}", Duration::ZERO)
                .await
                .unwrap();
        }
        cache
            .set("login_code:a@example.com", "abcde", Duration::from_secs(60))
            .await
            .unwrap();

        let held = cache.entries.lock().await.map.len();
        assert!(held <= MIN_SWEEP_LEN + 1, "held {} entries", held);
        assert_eq!(
            cache.get("login_code:a@example.com").await.unwrap().as_deref(),
            Some("abcde")
        );
    }

    #[tokio::test]
    async fn test_sweep_keeps_live_entries() {
        let cache = InMemoryCache::new();
        let ttl = Duration::from_secs(60);
        for i in 0..(MIN_SWEEP_LEN * 3) {
            cache.set(&format!("dish_{}_1", i), "[]", ttl).await.unwrap();
        }

        for i in 0..(MIN_SWEEP_LEN * 3) {
            assert!(cache.get(&format!("dish_{}_1", i)).await.unwrap().is_some());
        }
    }

    #[tokio::test]
    async fn test_touch_resets_expiry() {
        let cache = InMemoryCache::new();
        cache.set("session:1", "{}", Duration::from_secs(60)).await.unwrap();

        cache.touch("session:1", Duration::ZERO).await.unwrap();
        assert_eq!(cache.get("session:1").await.unwrap(), None);

        cache.set("session:2", "{}", Duration::ZERO).await.unwrap();
        cache.touch("session:2", Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("session:2").await.unwrap(), None);

        cache.touch("missing", Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_prefix_keeps_other_keys() {
        let cache = InMemoryCache::new();
        let ttl = Duration::from_secs(60);
        cache.set("setmealCache::1_1", "[]", ttl).await.unwrap();
        cache.set("dish_1_1", "[]", ttl).await.unwrap();

        cache.delete_prefix("setmealCache::").await.unwrap();

        assert_eq!(cache.get("setmealCache::1_1").await.unwrap(), None);
        assert!(cache.get("dish_1_1").await.unwrap().is_some());
    }
}
