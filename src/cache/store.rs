//! TTL-bounded storage for serialized response payloads.

use std::sync::RwLock;
use std::time::Instant;

use bytes::Bytes;
use lru::LruCache;
use metrics::counter;
use uuid::Uuid;

use super::config::CacheConfig;
use super::lock::rw_write;

const SOURCE: &str = "cache::store";

/// Cache key for a public read path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    PostList,
    PostDetail(String),
}

impl CacheKey {
    pub fn post_detail(slug: &str) -> Self {
        Self::PostDetail(slug.to_string())
    }
}

/// A serialized payload snapshot plus the post ids it renders, kept so a
/// cache hit can run the counting side effect without deserializing the
/// body.
#[derive(Debug, Clone)]
pub struct CachedPayload {
    pub body: Bytes,
    pub post_ids: Vec<Uuid>,
}

struct Entry {
    payload: CachedPayload,
    expires_at: Instant,
}

/// LRU map of cache key to payload with per-entry expiry.
///
/// Expired entries are dropped on read, never returned. Writes stamp the
/// expiry from the configured TTL, so a hit inside the window returns
/// bytes identical to what the populating miss stored.
pub struct ResponseStore {
    config: CacheConfig,
    entries: RwLock<LruCache<CacheKey, Entry>>,
}

impl ResponseStore {
    pub fn new(config: CacheConfig) -> Self {
        let entries = RwLock::new(LruCache::new(config.entry_limit_non_zero()));
        Self { config, entries }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn get(&self, key: &CacheKey) -> Option<CachedPayload> {
        if !self.config.enabled {
            return None;
        }

        let mut entries = rw_write(&self.entries, SOURCE, "get");
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                counter!("latido_response_cache_hit_total").increment(1);
                Some(entry.payload.clone())
            }
            Some(_) => {
                entries.pop(key);
                counter!("latido_response_cache_expired_total").increment(1);
                None
            }
            None => {
                counter!("latido_response_cache_miss_total").increment(1);
                None
            }
        }
    }

    pub fn put(&self, key: CacheKey, payload: CachedPayload) {
        if !self.config.enabled {
            return;
        }

        let entry = Entry {
            payload,
            expires_at: Instant::now() + self.config.ttl,
        };
        rw_write(&self.entries, SOURCE, "put").put(key, entry);
    }

    pub fn len(&self) -> usize {
        rw_write(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
