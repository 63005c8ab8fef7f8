use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "latido_response_cache_hit_total",
            Unit::Count,
            "Total number of response-cache hits."
        );
        describe_counter!(
            "latido_response_cache_miss_total",
            Unit::Count,
            "Total number of response-cache misses."
        );
        describe_counter!(
            "latido_response_cache_expired_total",
            Unit::Count,
            "Total number of cached payloads dropped at read time for exceeding their TTL."
        );
        describe_counter!(
            "latido_impression_buffer_failed_total",
            Unit::Count,
            "Total impression increments lost to counter-store failures."
        );
        describe_counter!(
            "latido_view_event_dropped_total",
            Unit::Count,
            "Total view events dropped because the view queue was full."
        );
        describe_counter!(
            "latido_view_count_failed_total",
            Unit::Count,
            "Total view events whose durable count failed."
        );
        describe_gauge!(
            "latido_view_queue_len",
            Unit::Count,
            "Current number of pending view events in the queue."
        );
        describe_counter!(
            "latido_reconcile_flushed_impressions_total",
            Unit::Count,
            "Total impressions moved from the counter store into durable storage."
        );
        describe_counter!(
            "latido_reconcile_scan_failed_total",
            Unit::Count,
            "Total reconcile runs abandoned because the counter scan failed."
        );
        describe_counter!(
            "latido_reconcile_lost_impressions_total",
            Unit::Count,
            "Total impressions lost when both the durable write and the re-credit failed."
        );
        describe_histogram!(
            "latido_reconcile_run_ms",
            Unit::Milliseconds,
            "Reconcile run latency in milliseconds."
        );
    });
}
