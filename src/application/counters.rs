//! Fast counter store abstraction.
//!
//! High-frequency engagement events are absorbed by a key-value counter
//! store and only reach the durable database when the reconciler drains
//! them. The store is injected at construction; implementations live in
//! `infra::counters`.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CounterError {
    #[error("counter store unavailable: {message}")]
    Unavailable { message: String },
    #[error("malformed counter key `{key}`")]
    BadKey { key: String },
}

impl CounterError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}

/// Counter namespaces. Keys are namespaced per entity kind so that a
/// scan never picks up another subsystem's keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CounterNamespace {
    PostImpressions,
}

impl CounterNamespace {
    pub fn as_str(self) -> &'static str {
        match self {
            CounterNamespace::PostImpressions => "post_impressions",
        }
    }
}

/// A fully-qualified counter key: `<namespace>:<entity uuid>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CounterKey {
    pub namespace: CounterNamespace,
    pub entity_id: Uuid,
}

impl CounterKey {
    pub fn new(namespace: CounterNamespace, entity_id: Uuid) -> Self {
        Self {
            namespace,
            entity_id,
        }
    }

    pub fn encode(&self) -> String {
        format!("{}:{}", self.namespace.as_str(), self.entity_id)
    }

    pub fn decode(raw: &str) -> Result<Self, CounterError> {
        let bad_key = || CounterError::BadKey {
            key: raw.to_string(),
        };

        let (namespace, id) = raw.split_once(':').ok_or_else(bad_key)?;
        let namespace = match namespace {
            "post_impressions" => CounterNamespace::PostImpressions,
            _ => return Err(bad_key()),
        };
        let entity_id = Uuid::parse_str(id).map_err(|_| bad_key())?;

        Ok(Self {
            namespace,
            entity_id,
        })
    }
}

/// Transient counter storage keyed by (namespace, entity id).
///
/// Implementations must make `increment_by` and `take` atomic: no
/// read-modify-write cycles that could lose concurrent increments, and
/// no window between reading a value and deleting its key. `take` is the
/// primitive that lets the reconciler drain a key without double
/// counting or dropping increments that race the drain.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Add `delta` to a counter, creating it at zero first. Returns the
    /// post-increment value.
    async fn increment_by(
        &self,
        namespace: CounterNamespace,
        entity_id: Uuid,
        delta: u64,
    ) -> Result<u64, CounterError>;

    async fn increment(
        &self,
        namespace: CounterNamespace,
        entity_id: Uuid,
    ) -> Result<u64, CounterError> {
        self.increment_by(namespace, entity_id, 1).await
    }

    /// Enumerate every key currently present in a namespace. No ordering
    /// is guaranteed; keys created after the scan starts may or may not
    /// be reported.
    async fn scan(&self, namespace: CounterNamespace) -> Result<Vec<CounterKey>, CounterError>;

    /// Atomically read a counter and delete its key. An absent key reads
    /// as zero.
    async fn take(&self, key: &CounterKey) -> Result<u64, CounterError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_encode_decode_roundtrip() {
        let key = CounterKey::new(CounterNamespace::PostImpressions, Uuid::new_v4());
        let decoded = CounterKey::decode(&key.encode()).expect("decodable key");
        assert_eq!(decoded, key);
    }

    #[test]
    fn decode_rejects_foreign_namespaces_and_garbage() {
        assert!(CounterKey::decode("page_hits:6d9f2c5e-0000-0000-0000-000000000000").is_err());
        assert!(CounterKey::decode("post_impressions:not-a-uuid").is_err());
        assert!(CounterKey::decode("no-separator").is_err());
    }
}
