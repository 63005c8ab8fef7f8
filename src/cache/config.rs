//! Response cache configuration.

use std::num::NonZeroUsize;
use std::time::Duration;

const DEFAULT_TTL_SECONDS: u64 = 300;
const DEFAULT_ENTRY_LIMIT: usize = 256;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Disable to degrade every read to the always-miss path.
    pub enabled: bool,
    /// Time-to-live for a cached payload.
    pub ttl: Duration,
    /// Maximum cached payloads before LRU eviction.
    pub entry_limit: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Duration::from_secs(DEFAULT_TTL_SECONDS),
            entry_limit: DEFAULT_ENTRY_LIMIT,
        }
    }
}

impl CacheConfig {
    /// Entry limit as NonZeroUsize, clamping to 1 if zero.
    pub fn entry_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.entry_limit).unwrap_or(NonZeroUsize::MIN)
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            ttl: Duration::from_secs(settings.ttl_seconds),
            entry_limit: settings.entry_limit,
        }
    }
}
