//! Periodic drain of the fast counter store into durable storage.
//!
//! Each run enumerates the impression namespace, atomically takes every
//! key, and applies the aggregated delta through the analytics engine.
//! The atomic take means increments racing the drain land in a fresh
//! counter for the next run instead of being lost, and a drained delta
//! is never read twice.

use std::sync::Arc;

use metrics::{counter, histogram};
use tracing::{debug, info, warn};

use crate::application::analytics::AnalyticsService;
use crate::application::counters::{CounterNamespace, CounterStore};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Keys whose delta reached durable storage this run.
    pub flushed_keys: usize,
    /// Total impressions applied across flushed keys.
    pub flushed_impressions: u64,
    /// Keys left for the next run after a per-key failure.
    pub skipped_keys: usize,
}

pub struct Reconciler {
    counters: Arc<dyn CounterStore>,
    analytics: Arc<AnalyticsService>,
}

impl Reconciler {
    pub fn new(counters: Arc<dyn CounterStore>, analytics: Arc<AnalyticsService>) -> Self {
        Self {
            counters,
            analytics,
        }
    }

    /// Drain every pending impression counter once. Per-key failures are
    /// logged and skipped; a taken delta whose durable write fails is
    /// credited back into the counter store so the next run retries it.
    pub async fn run_once(&self) -> ReconcileSummary {
        let started = std::time::Instant::now();
        let mut summary = ReconcileSummary::default();

        let keys = match self.counters.scan(CounterNamespace::PostImpressions).await {
            Ok(keys) => keys,
            Err(err) => {
                counter!("latido_reconcile_scan_failed_total").increment(1);
                warn!(error = %err, "counter scan failed, skipping reconcile run");
                return summary;
            }
        };

        if keys.is_empty() {
            debug!("no pending counters to reconcile");
            return summary;
        }

        for key in keys {
            let delta = match self.counters.take(&key).await {
                Ok(0) => continue,
                Ok(delta) => delta,
                Err(err) => {
                    summary.skipped_keys += 1;
                    warn!(key = %key.encode(), error = %err, "failed to take counter, retrying next run");
                    continue;
                }
            };

            match self
                .analytics
                .bulk_add_impressions(key.entity_id, delta)
                .await
            {
                Ok(_) => {
                    summary.flushed_keys += 1;
                    summary.flushed_impressions += delta;
                }
                Err(err) => {
                    summary.skipped_keys += 1;
                    warn!(key = %key.encode(), delta, error = %err, "durable write failed, re-crediting counter");
                    if let Err(err) = self
                        .counters
                        .increment_by(key.namespace, key.entity_id, delta)
                        .await
                    {
                        // Both stores refused; the delta is lost.
                        counter!("latido_reconcile_lost_impressions_total").increment(delta);
                        warn!(key = %key.encode(), delta, error = %err, "re-credit failed, dropping delta");
                    }
                }
            }
        }

        counter!("latido_reconcile_flushed_impressions_total")
            .increment(summary.flushed_impressions);
        histogram!("latido_reconcile_run_ms").record(started.elapsed().as_millis() as f64);

        info!(
            flushed_keys = summary.flushed_keys,
            flushed_impressions = summary.flushed_impressions,
            skipped_keys = summary.skipped_keys,
            "reconcile run finished"
        );
        summary
    }
}
