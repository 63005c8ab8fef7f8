//! In-process counter store.

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use crate::application::counters::{CounterError, CounterKey, CounterNamespace, CounterStore};

/// Dashmap-backed counter store.
///
/// The entry API holds the shard lock for the whole read-modify-write,
/// and `remove` takes key and value in one step, so the increment/take
/// atomicity contract holds without further locking. State is lost on
/// restart; acceptable for transient counters that reconcile every few
/// minutes.
#[derive(Default)]
pub struct MemoryCounterStore {
    counters: DashMap<CounterKey, u64>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn increment_by(
        &self,
        namespace: CounterNamespace,
        entity_id: Uuid,
        delta: u64,
    ) -> Result<u64, CounterError> {
        let mut entry = self
            .counters
            .entry(CounterKey::new(namespace, entity_id))
            .or_insert(0);
        *entry = entry.saturating_add(delta);
        Ok(*entry)
    }

    async fn scan(&self, namespace: CounterNamespace) -> Result<Vec<CounterKey>, CounterError> {
        Ok(self
            .counters
            .iter()
            .filter(|entry| entry.key().namespace == namespace)
            .map(|entry| entry.key().clone())
            .collect())
    }

    async fn take(&self, key: &CounterKey) -> Result<u64, CounterError> {
        Ok(self.counters.remove(key).map(|(_, value)| value).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn increment_creates_then_accumulates() {
        let store = MemoryCounterStore::new();
        let id = Uuid::new_v4();

        assert_eq!(
            store
                .increment(CounterNamespace::PostImpressions, id)
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            store
                .increment_by(CounterNamespace::PostImpressions, id, 4)
                .await
                .unwrap(),
            5
        );
    }

    #[tokio::test]
    async fn take_empties_the_key() {
        let store = MemoryCounterStore::new();
        let id = Uuid::new_v4();
        store
            .increment_by(CounterNamespace::PostImpressions, id, 7)
            .await
            .unwrap();

        let key = CounterKey::new(CounterNamespace::PostImpressions, id);
        assert_eq!(store.take(&key).await.unwrap(), 7);
        assert_eq!(store.take(&key).await.unwrap(), 0);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn concurrent_increments_do_not_lose_updates() {
        let store = Arc::new(MemoryCounterStore::new());
        let id = Uuid::new_v4();

        let tasks: Vec<_> = (0..64)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .increment(CounterNamespace::PostImpressions, id)
                        .await
                        .unwrap();
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let key = CounterKey::new(CounterNamespace::PostImpressions, id);
        assert_eq!(store.take(&key).await.unwrap(), 64);
    }
}
