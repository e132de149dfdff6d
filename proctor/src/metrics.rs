//! Prometheus metrics instrumentation for proctor.
//!
//! All metrics are conditionally compiled behind the `metrics` feature
//! flag.
//!
//! # Metrics
//!
//! ## Counters
//! - `proctor_executions_submitted_total` - Accepted submissions
//! - `proctor_executions_finished_total` - Executions reaching a terminal state
//! - `proctor_log_chunks_published_total` - Log chunks published
//!
//! ## Gauges
//! - `proctor_log_subscriptions_active` - Currently attached log subscriptions
//!
//! ## Histograms
//! - `proctor_execution_duration_seconds` - Execution wall time
#![cfg(feature = "metrics")]

use prometheus::{
    exponential_buckets, Counter, CounterVec, Gauge, HistogramVec, Opts, Registry,
};
use std::sync::LazyLock;

/// Global Prometheus registry for proctor metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

/// Counter for accepted submissions.
pub static EXECUTIONS_SUBMITTED_TOTAL: LazyLock<Counter> = LazyLock::new(|| {
    let opts = Opts::new(
        "proctor_executions_submitted_total",
        "Total number of accepted execution submissions",
    );
    Counter::with_opts(opts).expect("proctor_executions_submitted_total metric creation failed")
});

/// Counter for executions reaching a terminal state.
///
/// Labels:
/// - `status`: The terminal status (COMPLETED, CANCELLED, FAILED)
pub static EXECUTIONS_FINISHED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        "proctor_executions_finished_total",
        "Total number of executions reaching a terminal state",
    );
    CounterVec::new(opts, &["status"])
        .expect("proctor_executions_finished_total metric creation failed")
});

/// Counter for published log chunks.
pub static LOG_CHUNKS_PUBLISHED_TOTAL: LazyLock<Counter> = LazyLock::new(|| {
    let opts = Opts::new(
        "proctor_log_chunks_published_total",
        "Total number of log chunks published",
    );
    Counter::with_opts(opts).expect("proctor_log_chunks_published_total metric creation failed")
});

/// Gauge for currently attached log subscriptions.
pub static LOG_SUBSCRIPTIONS_ACTIVE: LazyLock<Gauge> = LazyLock::new(|| {
    let opts = Opts::new(
        "proctor_log_subscriptions_active",
        "Number of currently attached log subscriptions",
    );
    Gauge::with_opts(opts).expect("proctor_log_subscriptions_active metric creation failed")
});

/// Histogram for execution wall time in seconds.
///
/// Labels:
/// - `status`: The terminal status (COMPLETED, CANCELLED, FAILED)
pub static EXECUTION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let buckets = exponential_buckets(0.01, 2.0, 15).expect("bucket creation failed");
    let opts = prometheus::HistogramOpts::new(
        "proctor_execution_duration_seconds",
        "Execution wall time in seconds",
    )
    .buckets(buckets);
    HistogramVec::new(opts, &["status"])
        .expect("proctor_execution_duration_seconds metric creation failed")
});

/// Initialize all metrics by registering them with the global registry.
///
/// This function is idempotent - calling it multiple times is safe.
pub fn init_metrics() -> anyhow::Result<()> {
    let registry = &*REGISTRY;

    for metric in [
        Box::new(EXECUTIONS_SUBMITTED_TOTAL.clone()) as Box<dyn prometheus::core::Collector>,
        Box::new(EXECUTIONS_FINISHED_TOTAL.clone()),
        Box::new(LOG_CHUNKS_PUBLISHED_TOTAL.clone()),
        Box::new(LOG_SUBSCRIPTIONS_ACTIVE.clone()),
        Box::new(EXECUTION_DURATION_SECONDS.clone()),
    ] {
        if let Err(e) = registry.register(metric) {
            let msg = e.to_string();
            if !msg.contains("Duplicate metrics collector registration attempted") {
                return Err(e.into());
            }
        }
    }

    Ok(())
}

/// Helper to record an accepted submission.
pub fn record_execution_submitted() {
    EXECUTIONS_SUBMITTED_TOTAL.inc();
}

/// Helper to record a finished execution with its duration.
pub fn record_execution_finished(status: &str, duration_secs: f64) {
    EXECUTIONS_FINISHED_TOTAL.with_label_values(&[status]).inc();
    EXECUTION_DURATION_SECONDS
        .with_label_values(&[status])
        .observe(duration_secs);
}

/// Helper to record a published log chunk.
pub fn record_chunk_published() {
    LOG_CHUNKS_PUBLISHED_TOTAL.inc();
}

/// Helper to record a log subscription attaching.
pub fn inc_active_subscriptions() {
    LOG_SUBSCRIPTIONS_ACTIVE.inc();
}

/// Helper to record a log subscription detaching.
pub fn dec_active_subscriptions() {
    LOG_SUBSCRIPTIONS_ACTIVE.dec();
}

/// Gather all registered metrics in Prometheus text format.
pub fn gather_metrics() -> anyhow::Result<String> {
    let encoder = prometheus::TextEncoder::new();
    let metric_families = REGISTRY.gather();
    encoder
        .encode_to_string(&metric_families)
        .map_err(Into::into)
}
