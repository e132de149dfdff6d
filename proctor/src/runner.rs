use async_trait::async_trait;

use crate::execution::{CaseResult, TestId, TestSelection};
use crate::registry::CancelToken;

/// Callback interface handed to the runner for per-case lifecycle
/// events.
///
/// The runner invokes these synchronously, on its own task, strictly
/// within the bounds of a single [`TestRunner::execute`] call.
/// Implementations must be cheap and non-blocking: they translate
/// events into log chunks and telemetry records, nothing more.
pub trait RunObserver: Send + Sync {
    fn on_test_started(&self, test: &TestId, display_name: &str);

    fn on_test_finished(&self, test: &TestId, display_name: &str, result: &CaseResult);

    fn on_test_skipped(&self, test: &TestId, display_name: &str, reason: &str);
}

/// External collaborator that drives the actual test case execution.
///
/// `execute` blocks until the whole batch, or the subset reachable
/// before cooperative cancellation, is done. Implementations must check
/// `cancel` at test-case boundaries and stop scheduling further cases
/// once it is set; there is no preemption mid-case.
#[async_trait]
pub trait TestRunner: Send + Sync {
    /// Run the selected tests, reporting per-case events to `observer`.
    ///
    /// Returning `Ok(())` after the cancel flag was observed is the
    /// normal cooperative-cancellation path; an `Err` marks the whole
    /// execution failed.
    async fn execute(
        &self,
        selection: &TestSelection,
        observer: &dyn RunObserver,
        cancel: &CancelToken,
    ) -> anyhow::Result<()>;
}
