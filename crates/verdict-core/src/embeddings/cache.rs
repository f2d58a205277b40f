//! Embedding cache (§4.1).
//!
//! Keyed by `sha256(model_id || "\0" || text)`; entries expire after `cache_ttl_days` by
//! wall-clock TTL. Two levels: a bounded in-process LRU for hot queries (grounded on the teacher
//! crate's `query_cache: Mutex<LruCache<String, Vec<f32>>>`), backed by a persistent
//! `embedding_cache` collection (§6) that survives process restarts. Cache read failures degrade
//! silently to a miss; cache write failures are logged and ignored (§4.1).

use std::num::NonZeroUsize;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use lru::LruCache;
use sha2::{Digest, Sha256};

/// A cache entry as persisted in the `embedding_cache` collection.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub vector: Vec<f32>,
    pub stored_at: DateTime<Utc>,
}

/// What the embedding client needs from a persistent cache backend.
///
/// Implementations must treat write failures as non-fatal to the caller (§4.1); this trait's
/// methods return `Result` only so an implementation *can* signal a problem to its own logs —
/// [`EmbeddingCache::get`]/[`EmbeddingCache::put`] below swallow the error either way.
pub trait EmbeddingCacheStore: Send + Sync {
    fn get_entry(&self, key: &str) -> Result<Option<CacheEntry>, String>;
    fn put_entry(&self, key: &str, entry: CacheEntry) -> Result<(), String>;
}

/// Compute the cache key for a (model, text) pair: `sha256(model_id || "\0" || text)`.
pub fn cache_key(model_id: &str, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(model_id.as_bytes());
    hasher.update(b"\0");
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Two-level embedding cache: an in-process LRU in front of a persistent backend.
pub struct EmbeddingCache {
    hot: Mutex<LruCache<String, Vec<f32>>>,
    backend: Box<dyn EmbeddingCacheStore>,
    ttl: Duration,
}

impl EmbeddingCache {
    pub fn new(backend: Box<dyn EmbeddingCacheStore>, ttl_days: i64, hot_capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(hot_capacity.max(1)).expect("capacity is non-zero");
        Self {
            hot: Mutex::new(LruCache::new(capacity)),
            backend,
            ttl: Duration::days(ttl_days),
        }
    }

    /// Look up a cached vector. Returns `None` on a miss, an expired entry, or a backend read
    /// failure (logged, not propagated — §4.1: "Cache read failures degrade silently to a
    /// miss").
    pub fn get(&self, model_id: &str, text: &str) -> Option<Vec<f32>> {
        let key = cache_key(model_id, text);

        if let Some(vector) = self.hot.lock().expect("hot cache mutex poisoned").get(&key) {
            return Some(vector.clone());
        }

        match self.backend.get_entry(&key) {
            Ok(Some(entry)) => {
                if Utc::now() - entry.stored_at <= self.ttl {
                    self.hot
                        .lock()
                        .expect("hot cache mutex poisoned")
                        .put(key, entry.vector.clone());
                    Some(entry.vector)
                } else {
                    None
                }
            }
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(error = %err, "embedding cache read failed; treating as a miss");
                None
            }
        }
    }

    /// Store a vector. Write failures are logged and otherwise ignored (§4.1).
    pub fn put(&self, model_id: &str, text: &str, vector: Vec<f32>) {
        let key = cache_key(model_id, text);
        self.hot
            .lock()
            .expect("hot cache mutex poisoned")
            .put(key.clone(), vector.clone());

        let entry = CacheEntry {
            vector,
            stored_at: Utc::now(),
        };
        if let Err(err) = self.backend.put_entry(&key, entry) {
            tracing::warn!(error = %err, "embedding cache write failed; continuing without persisting");
        }
    }
}

/// An in-memory-only backend, useful for tests and for deployments that accept losing the cache
/// across restarts.
#[derive(Default)]
pub struct InMemoryCacheStore {
    entries: Mutex<std::collections::HashMap<String, CacheEntry>>,
}

impl EmbeddingCacheStore for InMemoryCacheStore {
    fn get_entry(&self, key: &str) -> Result<Option<CacheEntry>, String> {
        Ok(self
            .entries
            .lock()
            .map_err(|e| e.to_string())?
            .get(key)
            .cloned())
    }

    fn put_entry(&self, key: &str, entry: CacheEntry) -> Result<(), String> {
        self.entries
            .lock()
            .map_err(|e| e.to_string())?
            .insert(key.to_string(), entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_is_stable_and_model_sensitive() {
        let a = cache_key("model-a", "hello world");
        let b = cache_key("model-a", "hello world");
        let c = cache_key("model-b", "hello world");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn hit_after_miss_round_trips_through_backend() {
        let cache = EmbeddingCache::new(Box::new(InMemoryCacheStore::default()), 30, 10);
        assert!(cache.get("m", "text").is_none());
        cache.put("m", "text", vec![1.0, 2.0, 3.0]);
        assert_eq!(cache.get("m", "text"), Some(vec![1.0, 2.0, 3.0]));
    }

    #[test]
    fn expired_entry_is_treated_as_a_miss() {
        let backend = InMemoryCacheStore::default();
        let key = cache_key("m", "text");
        backend
            .put_entry(
                &key,
                CacheEntry {
                    vector: vec![1.0],
                    stored_at: Utc::now() - Duration::days(31),
                },
            )
            .unwrap();
        let cache = EmbeddingCache::new(Box::new(backend), 30, 10);
        assert!(cache.get("m", "text").is_none());
    }
}
