//! In-process queue for fire-and-forget view counting.
//!
//! Detail reads publish a view event and return immediately; a
//! background drainer applies the events through the analytics engine.
//! Counting failures are logged, never surfaced to the read path, and a
//! published event cannot be retracted by an abandoned request.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use metrics::{counter, gauge};
use time::OffsetDateTime;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::application::analytics::AnalyticsService;
use crate::cache::lock::mutex_lock;

const SOURCE: &str = "application::view_queue";

#[derive(Debug, Clone)]
pub struct PendingView {
    pub post_id: Uuid,
    pub client_identity: String,
    pub observed_at: OffsetDateTime,
}

/// Bounded FIFO of pending view events.
///
/// A mutex-held deque is enough here: publishes are one push each and
/// the drainer takes a whole batch at a time, so contention stays low.
pub struct ViewQueue {
    queue: Mutex<VecDeque<PendingView>>,
    capacity: usize,
}

impl ViewQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    /// Publish a view event. When the queue is full the event is dropped
    /// and counted; views are best-effort accounting, not billing.
    pub fn publish(&self, post_id: Uuid, client_identity: &str) {
        let mut queue = mutex_lock(&self.queue, SOURCE, "publish");
        if queue.len() >= self.capacity {
            drop(queue);
            counter!("latido_view_event_dropped_total").increment(1);
            warn!(%post_id, "view queue full, dropping view event");
            return;
        }

        queue.push_back(PendingView {
            post_id,
            client_identity: client_identity.to_string(),
            observed_at: OffsetDateTime::now_utc(),
        });
        let depth = queue.len();
        drop(queue);

        gauge!("latido_view_queue_len").set(depth as f64);
        debug!(%post_id, depth, "view event enqueued");
    }

    /// Drain up to `limit` events in arrival order.
    pub fn drain(&self, limit: usize) -> Vec<PendingView> {
        let mut queue = mutex_lock(&self.queue, SOURCE, "drain");
        let take = limit.min(queue.len());
        let drained: Vec<PendingView> = queue.drain(..take).collect();
        let depth = queue.len();
        drop(queue);

        gauge!("latido_view_queue_len").set(depth as f64);
        drained
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.queue, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Applies queued view events through the analytics engine.
pub struct ViewConsumer {
    queue: Arc<ViewQueue>,
    analytics: Arc<AnalyticsService>,
    batch_limit: usize,
}

impl ViewConsumer {
    pub fn new(queue: Arc<ViewQueue>, analytics: Arc<AnalyticsService>, batch_limit: usize) -> Self {
        Self {
            queue,
            analytics,
            batch_limit: batch_limit.max(1),
        }
    }

    /// Drain one batch. Per-event failures are logged and skipped so one
    /// bad event never stalls the queue.
    pub async fn consume(&self) -> usize {
        let batch = self.queue.drain(self.batch_limit);
        if batch.is_empty() {
            return 0;
        }

        let mut counted = 0usize;
        for event in &batch {
            match self
                .analytics
                .increment_view(event.post_id, &event.client_identity)
                .await
            {
                Ok(true) => counted += 1,
                Ok(false) => {}
                Err(err) => {
                    counter!("latido_view_count_failed_total").increment(1);
                    warn!(post_id = %event.post_id, error = %err, "failed to count view");
                }
            }
        }

        debug!(batch = batch.len(), counted, "drained view queue batch");
        counted
    }
}
