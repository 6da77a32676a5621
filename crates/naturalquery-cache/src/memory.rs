//! In-memory content cache with lazy expiry

use crate::{CacheError, KeyValueCache, DEFAULT_VALIDITY};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

/// Cache entry for enriched DDL
#[derive(Debug, Clone)]
struct CacheEntry {
    /// The cached text
    value: Arc<str>,

    /// When this entry was last written
    written_at: Instant,
}

impl CacheEntry {
    fn is_fresh(&self, validity: Duration) -> bool {
        self.written_at.elapsed() < validity
    }
}

/// Process-local content cache
///
/// Stale entries read as absent but stay in the map until overwritten,
/// invalidated, or removed by [`ContentCache::evict_expired`].
///
/// ## Usage
///
/// ```rust,ignore
/// use std::time::Duration;
///
/// let cache = ContentCache::new(Duration::from_secs(3600));
/// cache.put(&key, "CREATE TABLE users (...) -- commented").await?;
///
/// if let Some(ddl) = cache.get(&key).await? {
///     // fresh
/// }
/// ```
#[derive(Clone)]
pub struct ContentCache {
    /// Cache storage
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,

    /// How long an entry stays fresh
    validity: Duration,
}

impl ContentCache {
    /// Create a cache with the given validity window
    pub fn new(validity: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            validity,
        }
    }

    /// Configured validity window
    pub fn validity(&self) -> Duration {
        self.validity
    }

    /// Clear all entries from the cache
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }

    /// Number of entries, stale ones included
    pub fn len(&self) -> usize {
        if let Ok(entries) = self.entries.read() {
            entries.len()
        } else {
            0
        }
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every stale entry
    pub fn evict_expired(&self) {
        let validity = self.validity;
        if let Ok(mut entries) = self.entries.write() {
            entries.retain(|_, entry| entry.is_fresh(validity));
        }
    }

    /// Get cache statistics
    ///
    /// Returns (total_entries, fresh_entries, expired_entries)
    pub fn stats(&self) -> (usize, usize, usize) {
        if let Ok(entries) = self.entries.read() {
            let total = entries.len();
            let fresh = entries.values().filter(|e| e.is_fresh(self.validity)).count();
            (total, fresh, total - fresh)
        } else {
            (0, 0, 0)
        }
    }
}

impl Default for ContentCache {
    /// Cache with the default 24 hour validity
    fn default() -> Self {
        Self::new(DEFAULT_VALIDITY)
    }
}

#[async_trait::async_trait]
impl KeyValueCache for ContentCache {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let entries = self.entries.read().map_err(|_| CacheError::Poisoned)?;

        Ok(entries
            .get(key)
            .filter(|entry| entry.is_fresh(self.validity))
            .map(|entry| entry.value.to_string()))
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let entry = CacheEntry {
            value: Arc::from(value),
            written_at: Instant::now(),
        };

        self.entries
            .write()
            .map_err(|_| CacheError::Poisoned)?
            .insert(key.to_string(), entry);
        Ok(())
    }

    async fn invalidate(&self, key: &str) -> Result<(), CacheError> {
        self.entries
            .write()
            .map_err(|_| CacheError::Poisoned)?
            .remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[tokio::test]
    async fn put_and_get() {
        let cache = ContentCache::new(Duration::from_secs(60));

        cache.put("abc", "CREATE TABLE t").await.unwrap();

        assert_eq!(cache.get("abc").await.unwrap().as_deref(), Some("CREATE TABLE t"));
        assert_eq!(cache.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn put_overwrites() {
        let cache = ContentCache::default();

        cache.put("k", "first").await.unwrap();
        cache.put("k", "second").await.unwrap();

        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("second"));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn stale_entries_read_as_absent_but_are_kept() {
        let cache = ContentCache::new(Duration::from_millis(100));

        cache.put("k", "v").await.unwrap();
        assert!(cache.get("k").await.unwrap().is_some());

        sleep(Duration::from_millis(150));

        assert!(cache.get("k").await.unwrap().is_none());
        // reading does not delete
        assert_eq!(cache.len(), 1);

        cache.evict_expired();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn invalidate_is_idempotent() {
        let cache = ContentCache::default();

        cache.put("k", "v").await.unwrap();
        cache.invalidate("k").await.unwrap();
        assert!(cache.get("k").await.unwrap().is_none());

        cache.invalidate("k").await.unwrap();
        cache.invalidate("never-written").await.unwrap();
    }

    #[tokio::test]
    async fn stats_split_fresh_and_expired() {
        let cache = ContentCache::new(Duration::from_millis(100));

        cache.put("a", "1").await.unwrap();
        cache.put("b", "2").await.unwrap();
        assert_eq!(cache.stats(), (2, 2, 0));

        sleep(Duration::from_millis(150));
        assert_eq!(cache.stats(), (2, 0, 2));

        cache.clear();
        assert_eq!(cache.stats(), (0, 0, 0));
    }

    #[tokio::test]
    async fn poisoned_store_reports_errors() {
        let cache = ContentCache::default();
        cache.put("k", "v").await.unwrap();

        let crashed = cache.clone();
        let _ = std::thread::spawn(move || {
            let _guard = crashed.entries.write().unwrap();
            panic!("writer crashed while holding the lock");
        })
        .join();

        assert!(matches!(cache.put("k", "w").await, Err(CacheError::Poisoned)));
        assert!(matches!(cache.get("k").await, Err(CacheError::Poisoned)));
        assert!(matches!(cache.invalidate("k").await, Err(CacheError::Poisoned)));
    }

    #[tokio::test]
    async fn concurrent_writers_on_distinct_keys() {
        let cache = ContentCache::default();

        let mut handles = Vec::new();
        for i in 0..16 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                cache.put(&format!("key-{i}"), &format!("value-{i}")).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(cache.len(), 16);
        assert_eq!(cache.get("key-7").await.unwrap().as_deref(), Some("value-7"));
    }
}
