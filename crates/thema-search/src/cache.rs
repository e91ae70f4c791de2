//! LRU + TTL result cache for vector search (§4.H), keyed on a rounded
//! query-vector prefix so near-identical repeated queries hit cache.

use std::time::{Duration, Instant};

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use uuid::Uuid;

use thema_core::defaults::{SEARCH_RESULT_CACHE_CAPACITY, SEARCH_RESULT_CACHE_TTL_SECONDS};
use thema_core::traits::SearchResult;
use thema_core::DocType;

struct CacheEntry {
    results: Vec<SearchResult>,
    inserted_at: Instant,
}

pub struct SearchResultCache {
    inner: Mutex<LruCache<String, CacheEntry>>,
    ttl: Duration,
}

impl SearchResultCache {
    pub fn new() -> Self {
        Self::with_capacity_and_ttl(
            SEARCH_RESULT_CACHE_CAPACITY,
            Duration::from_secs(SEARCH_RESULT_CACHE_TTL_SECONDS),
        )
    }

    pub fn with_capacity_and_ttl(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    pub fn get(&self, key: &str) -> Option<Vec<SearchResult>> {
        let mut cache = self.inner.lock().unwrap();
        let entry = cache.get(key)?;
        if entry.inserted_at.elapsed() > self.ttl {
            cache.pop(key);
            return None;
        }
        Some(entry.results.clone())
    }

    pub fn set(&self, key: String, results: Vec<SearchResult>) {
        self.inner.lock().unwrap().put(
            key,
            CacheEntry {
                results,
                inserted_at: Instant::now(),
            },
        );
    }
}

impl Default for SearchResultCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the cache key for a [`thema_core::traits::SearchQuery`]: user id,
/// metric, threshold, limit, doc-type filter, and a rounded 16-dim vector
/// prefix (full-precision vectors would make the key effectively unique).
pub fn cache_key(
    user_id: Uuid,
    metric: &str,
    threshold: f32,
    limit: i64,
    doc_types: &Option<Vec<DocType>>,
    vector: &[f32],
) -> String {
    let prefix: Vec<String> = vector
        .iter()
        .take(16)
        .map(|v| format!("{:.3}", v))
        .collect();
    let filter = doc_types
        .as_ref()
        .map(|types| {
            types
                .iter()
                .map(|t| t.as_str())
                .collect::<Vec<_>>()
                .join(",")
        })
        .unwrap_or_default();

    format!(
        "u:{user_id}|m:{metric}|t:{threshold}|l:{limit}|f:{filter}|v:{}",
        prefix.join(",")
    )
}
