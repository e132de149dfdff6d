//! Tracing and telemetry instrumentation for proctor.
//!
//! Helper functions for creating tracing spans and recording metrics
//! across the execution lifecycle. All functions work both with and
//! without the `metrics` feature flag.

use std::future::Future;
use tracing::{info_span, Instrument, Span};

/// Create a tracing span for a submission.
///
/// The span includes the execution id and the number of selected tests.
#[must_use]
pub fn submit_span(execution_id: impl AsRef<str>, selected: usize) -> Span {
    info_span!(
        "proctor.submit",
        execution_id = %execution_id.as_ref(),
        selected = selected,
    )
}

/// Create a tracing span covering one execution's whole run on a worker.
#[must_use]
pub fn execution_run_span(execution_id: impl AsRef<str>) -> Span {
    info_span!(
        "proctor.execute",
        execution_id = %execution_id.as_ref(),
    )
}

/// Create a tracing span for a single test case.
#[must_use]
pub fn case_span(execution_id: impl AsRef<str>, test_id: impl AsRef<str>) -> Span {
    info_span!(
        "proctor.case",
        execution_id = %execution_id.as_ref(),
        test_id = %test_id.as_ref(),
    )
}

/// Create a tracing span for report generation.
#[must_use]
pub fn report_span(execution_id: impl AsRef<str>) -> Span {
    info_span!(
        "proctor.report",
        execution_id = %execution_id.as_ref(),
    )
}

/// Instrument a future with an execution run span.
pub fn instrument_run<F>(
    execution_id: impl AsRef<str>,
    future: F,
) -> impl Future<Output = F::Output>
where
    F: Future,
{
    let span = execution_run_span(execution_id);
    future.instrument(span)
}

/// Record an accepted submission.
pub fn record_execution_submitted(execution_id: impl AsRef<str>, selected: usize) {
    tracing::info!(
        execution_id = %execution_id.as_ref(),
        selected = selected,
        "execution submitted"
    );

    #[cfg(feature = "metrics")]
    crate::metrics::record_execution_submitted();
}

/// Record a published log chunk.
pub fn record_chunk_published(execution_id: impl AsRef<str>) {
    tracing::trace!(
        execution_id = %execution_id.as_ref(),
        "log chunk published"
    );

    #[cfg(feature = "metrics")]
    crate::metrics::record_chunk_published();
}

/// Record a log subscription attaching.
pub fn record_subscriber_attached(execution_id: impl AsRef<str>) {
    tracing::debug!(
        execution_id = %execution_id.as_ref(),
        "log subscription attached"
    );

    #[cfg(feature = "metrics")]
    crate::metrics::inc_active_subscriptions();
}

/// Record a log subscription detaching.
pub fn record_subscriber_detached(execution_id: impl AsRef<str>) {
    tracing::debug!(
        execution_id = %execution_id.as_ref(),
        "log subscription detached"
    );

    #[cfg(feature = "metrics")]
    crate::metrics::dec_active_subscriptions();
}

/// Observe the duration of a finished execution.
pub fn observe_execution_duration(
    execution_id: impl AsRef<str>,
    status: impl AsRef<str>,
    duration_secs: f64,
) {
    tracing::info!(
        execution_id = %execution_id.as_ref(),
        status = %status.as_ref(),
        duration_secs = duration_secs,
        "execution finished"
    );

    #[cfg(feature = "metrics")]
    crate::metrics::record_execution_finished(status.as_ref(), duration_secs);
}

/// Record the start of an execution for duration tracking.
///
/// Returns an opaque handle that should be passed to
/// [`record_execution_end`].
pub fn record_execution_start(execution_id: impl AsRef<str>) -> ExecutionTimingHandle {
    ExecutionTimingHandle {
        execution_id: execution_id.as_ref().to_string(),
        start: std::time::Instant::now(),
    }
}

/// Record the end of an execution and update duration metrics.
pub fn record_execution_end(handle: ExecutionTimingHandle, status: impl AsRef<str>) {
    let duration_secs = handle.start.elapsed().as_secs_f64();
    observe_execution_duration(&handle.execution_id, status, duration_secs);
}

/// Handle for tracking execution duration.
#[derive(Debug)]
pub struct ExecutionTimingHandle {
    execution_id: String,
    start: std::time::Instant,
}

impl ExecutionTimingHandle {
    #[must_use]
    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    #[must_use]
    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}
