//! Response cache for the public read paths.
//!
//! Caches serialized list/detail payloads for a bounded time-to-live so
//! read latency is decoupled from the database. The cache is advisory:
//! when disabled or cold every read degrades to the miss path. Cache
//! hits are never free of side effects: the feed service still routes
//! every hit through impression/view counting.

mod config;
pub(crate) mod lock;
mod store;

pub use config::CacheConfig;
pub use store::{CacheKey, CachedPayload, ResponseStore};
