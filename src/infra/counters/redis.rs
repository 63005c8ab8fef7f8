//! Redis-backed counter store.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use uuid::Uuid;

use crate::application::counters::{CounterError, CounterKey, CounterNamespace, CounterStore};

const SCAN_BATCH: usize = 100;

/// Counter store over a shared Redis connection manager.
///
/// INCRBY gives the atomic increment, GETDEL the atomic take; there is
/// no window in which a drained value could also be re-read or a racing
/// increment dropped. Keys are enumerated with cursor-based SCAN rather
/// than KEYS so a large namespace never blocks the server.
pub struct RedisCounterStore {
    connection: ConnectionManager,
}

impl RedisCounterStore {
    /// Connect on startup. The connection manager reconnects internally,
    /// so a transient outage surfaces as per-call `Unavailable` errors
    /// rather than a dead client.
    pub async fn connect(url: &str) -> Result<Self, CounterError> {
        let client = redis::Client::open(url)
            .map_err(|err| CounterError::unavailable(format!("invalid redis url: {err}")))?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(|err| CounterError::unavailable(err.to_string()))?;
        Ok(Self { connection })
    }

    fn connection(&self) -> ConnectionManager {
        self.connection.clone()
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn increment_by(
        &self,
        namespace: CounterNamespace,
        entity_id: Uuid,
        delta: u64,
    ) -> Result<u64, CounterError> {
        let key = CounterKey::new(namespace, entity_id).encode();
        let mut connection = self.connection();
        let value: u64 = redis::cmd("INCRBY")
            .arg(&key)
            .arg(delta)
            .query_async(&mut connection)
            .await
            .map_err(|err| CounterError::unavailable(err.to_string()))?;
        Ok(value)
    }

    async fn scan(&self, namespace: CounterNamespace) -> Result<Vec<CounterKey>, CounterError> {
        let pattern = format!("{}:*", namespace.as_str());
        let mut connection = self.connection();
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut connection)
                .await
                .map_err(|err| CounterError::unavailable(err.to_string()))?;

            for raw in batch {
                keys.push(CounterKey::decode(&raw)?);
            }

            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        Ok(keys)
    }

    async fn take(&self, key: &CounterKey) -> Result<u64, CounterError> {
        let mut connection = self.connection();
        let value: Option<u64> = redis::cmd("GETDEL")
            .arg(key.encode())
            .query_async(&mut connection)
            .await
            .map_err(|err| CounterError::unavailable(err.to_string()))?;
        Ok(value.unwrap_or(0))
    }
}
