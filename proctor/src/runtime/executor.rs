use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use tracing::Instrument;

use crate::error::{RegistryError, SubmitError};
use crate::execution::{
    CaseResult, ExecutionId, ExecutionRecord, ExecutionStatus, TestId, TestSelection,
};
use crate::logbus::{LogBus, LogSubscription};
use crate::registry::{CancelToken, ExecutionRegistry};
use crate::report::{ReportGenerator, ReportId};
use crate::runner::{RunObserver, TestRunner};
use crate::sink::{CaseStatus, ResultSink, ResultSinkFactory};
use crate::telemetry;

/// Configuration for the executor's worker pool and submission queue.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Number of workers; each execution occupies exactly one worker
    /// for its whole lifetime.
    pub worker_count: usize,
    /// Bounded depth of the submission queue. Submissions beyond this
    /// fail fast with a capacity error instead of waiting.
    pub queue_depth: usize,
    /// Grace period in seconds for workers to finish during shutdown.
    pub shutdown_grace_secs: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            queue_depth: 32,
            shutdown_grace_secs: 30,
        }
    }
}

struct WorkItem {
    execution_id: ExecutionId,
    selection: TestSelection,
}

/// Orchestrates asynchronous test batch executions.
///
/// `submit` validates the selection, allocates an execution id,
/// registers it `Running`, and enqueues the batch; a fixed-size worker
/// pool drives the [`TestRunner`], translating its per-case callbacks
/// into [`LogBus`] chunks and registry updates. On success the
/// [`ReportGenerator`] is invoked and the report id stored. The log
/// stream for an execution is completed exactly once, whichever
/// terminal state is reached.
pub struct Executor {
    config: ExecutorConfig,
    registry: Arc<ExecutionRegistry>,
    log_bus: Arc<LogBus>,
    runner: Arc<dyn TestRunner>,
    reports: Arc<dyn ReportGenerator>,
    sinks: Option<Arc<dyn ResultSinkFactory>>,
    submit_tx: mpsc::Sender<WorkItem>,
    submit_rx: Mutex<Option<mpsc::Receiver<WorkItem>>>,
    shutdown: CancelToken,
    worker_handles: Mutex<Vec<tokio::task::JoinHandle<()>>>,
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let worker_count = self
            .worker_handles
            .try_lock()
            .map(|handles| handles.len())
            .unwrap_or_default();

        f.debug_struct("Executor")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("log_bus", &self.log_bus)
            .field("has_sink_factory", &self.sinks.is_some())
            .field("worker_count", &worker_count)
            .field("shutdown_cancelled", &self.shutdown.is_cancelled())
            .finish()
    }
}

impl Executor {
    /// Create a new executor with the given collaborators.
    ///
    /// Workers are not spawned until [`start`](Self::start) is called;
    /// submissions made before that queue up to the configured depth.
    pub fn new(
        config: ExecutorConfig,
        registry: Arc<ExecutionRegistry>,
        log_bus: Arc<LogBus>,
        runner: Arc<dyn TestRunner>,
        reports: Arc<dyn ReportGenerator>,
        sinks: Option<Arc<dyn ResultSinkFactory>>,
    ) -> Self {
        let (submit_tx, submit_rx) = mpsc::channel(config.queue_depth.max(1));
        Self {
            config,
            registry,
            log_bus,
            runner,
            reports,
            sinks,
            submit_tx,
            submit_rx: Mutex::new(Some(submit_rx)),
            shutdown: CancelToken::new(),
            worker_handles: Mutex::new(Vec::new()),
        }
    }

    /// Get the executor configuration.
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Get a clone of the execution registry.
    pub fn registry(&self) -> Arc<ExecutionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Get a clone of the log bus.
    pub fn log_bus(&self) -> Arc<LogBus> {
        Arc::clone(&self.log_bus)
    }

    /// Spawn the worker pool.
    ///
    /// # Errors
    ///
    /// Fails if the executor was already started.
    pub async fn start(&self) -> anyhow::Result<()> {
        let receiver = { self.submit_rx.lock().await.take() };
        let Some(receiver) = receiver else {
            anyhow::bail!("executor already started");
        };
        let queue = Arc::new(Mutex::new(receiver));

        let mut handles = self.worker_handles.lock().await;
        for i in 0..self.config.worker_count.max(1) {
            let worker_id = format!("proctor-w{i}");
            let registry = Arc::clone(&self.registry);
            let log_bus = Arc::clone(&self.log_bus);
            let runner = Arc::clone(&self.runner);
            let reports = Arc::clone(&self.reports);
            let sinks = self.sinks.clone();
            let shutdown = self.shutdown.clone();
            let queue = Arc::clone(&queue);

            handles.push(tokio::spawn(async move {
                Self::worker_loop(
                    worker_id, registry, log_bus, runner, reports, sinks, shutdown, queue,
                )
                .await;
            }));
        }
        Ok(())
    }

    /// Submit a batch of selected tests for asynchronous execution.
    ///
    /// Returns immediately with a fresh execution id; the run proceeds
    /// on a pooled worker. Validation and the queue-capacity check both
    /// happen before any id is allocated, so a rejected submission
    /// leaves no trace.
    pub fn submit(&self, tests: Vec<TestId>) -> Result<ExecutionId, SubmitError> {
        if self.shutdown.is_cancelled() {
            return Err(SubmitError::ShuttingDown);
        }
        let selection = TestSelection::new(tests)?;
        let permit = self.submit_tx.try_reserve().map_err(|err| match err {
            mpsc::error::TrySendError::Full(()) => SubmitError::QueueFull,
            mpsc::error::TrySendError::Closed(()) => SubmitError::ShuttingDown,
        })?;

        let execution_id = ExecutionId::new();
        let _span = telemetry::submit_span(execution_id.to_string(), selection.len()).entered();
        self.registry.create(execution_id)?;
        telemetry::record_execution_submitted(execution_id.to_string(), selection.len());

        self.log_bus
            .publish(execution_id, "=== Test Execution Started ===\n");
        self.log_bus
            .publish(execution_id, format!("Execution ID: {execution_id}\n"));
        self.log_bus
            .publish(execution_id, format!("Selected tests: {}\n", selection.len()));
        self.log_bus
            .publish(execution_id, "==============================\n");

        permit.send(WorkItem {
            execution_id,
            selection,
        });
        Ok(execution_id)
    }

    /// Request cooperative cancellation of an execution.
    ///
    /// Best-effort and idempotent: returns immediately, has no effect
    /// on executions that already finished, and only logs for unknown
    /// ids.
    pub fn cancel(&self, execution_id: ExecutionId) {
        self.registry.request_cancel(execution_id);
    }

    /// Current status of an execution.
    pub fn status(&self, execution_id: ExecutionId) -> Result<ExecutionStatus, RegistryError> {
        self.registry.status(execution_id)
    }

    /// Status plus optional report id in one read.
    pub fn record(&self, execution_id: ExecutionId) -> Result<ExecutionRecord, RegistryError> {
        self.registry.record(execution_id)
    }

    /// Report id for an execution, present only once it completed and
    /// report generation succeeded.
    pub fn report_id_for(
        &self,
        execution_id: ExecutionId,
    ) -> Result<Option<ReportId>, RegistryError> {
        Ok(self.registry.record(execution_id)?.report_id)
    }

    /// Attach a live log subscription for an execution.
    pub fn subscribe_logs(&self, execution_id: ExecutionId) -> LogSubscription {
        self.log_bus.subscribe(execution_id)
    }

    /// Everything published to an execution's log stream so far.
    pub fn captured_output(&self, execution_id: ExecutionId) -> String {
        self.log_bus.captured(execution_id)
    }

    /// Gracefully shut down the executor and all workers.
    pub async fn shutdown(&self) -> anyhow::Result<()> {
        tracing::info!("Initiating graceful shutdown of executor");

        self.shutdown.cancel();

        let handles = {
            let mut guard = self.worker_handles.lock().await;
            std::mem::take(&mut *guard)
        };

        let grace = tokio::time::Duration::from_secs(self.config.shutdown_grace_secs);
        for handle in handles {
            match tokio::time::timeout(grace, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!("Worker task failed: {:?}", e),
                Err(_) => tracing::warn!("Worker task timed out during shutdown"),
            }
        }

        tracing::info!("Executor shutdown complete");
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn worker_loop(
        worker_id: String,
        registry: Arc<ExecutionRegistry>,
        log_bus: Arc<LogBus>,
        runner: Arc<dyn TestRunner>,
        reports: Arc<dyn ReportGenerator>,
        sinks: Option<Arc<dyn ResultSinkFactory>>,
        shutdown: CancelToken,
        queue: Arc<Mutex<mpsc::Receiver<WorkItem>>>,
    ) {
        loop {
            let item = tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Worker {} shutting down", worker_id);
                    break;
                }
                item = Self::next_item(&queue) => item,
            };

            let Some(item) = item else {
                tracing::info!("Worker {} stopping: submission queue closed", worker_id);
                break;
            };

            Self::run_batch(
                &registry,
                &log_bus,
                runner.as_ref(),
                reports.as_ref(),
                sinks.as_deref(),
                item,
            )
            .await;
        }
    }

    async fn next_item(queue: &Mutex<mpsc::Receiver<WorkItem>>) -> Option<WorkItem> {
        queue.lock().await.recv().await
    }

    async fn run_batch(
        registry: &ExecutionRegistry,
        log_bus: &Arc<LogBus>,
        runner: &dyn TestRunner,
        reports: &dyn ReportGenerator,
        sinks: Option<&dyn ResultSinkFactory>,
        item: WorkItem,
    ) {
        let execution_id = item.execution_id;
        telemetry::instrument_run(
            execution_id.to_string(),
            Self::drive_execution(registry, log_bus, runner, reports, sinks, item),
        )
        .await;
    }

    async fn drive_execution(
        registry: &ExecutionRegistry,
        log_bus: &Arc<LogBus>,
        runner: &dyn TestRunner,
        reports: &dyn ReportGenerator,
        sinks: Option<&dyn ResultSinkFactory>,
        item: WorkItem,
    ) {
        let WorkItem {
            execution_id,
            selection,
        } = item;

        let Some(cancel) = registry.cancel_token(execution_id) else {
            tracing::error!(execution = %execution_id, "dequeued execution has no registry entry");
            log_bus.complete(execution_id);
            return;
        };

        let timing = telemetry::record_execution_start(execution_id.to_string());

        let sink = sinks.and_then(|factory| match factory.sink_for(execution_id) {
            Ok(sink) => Some(sink),
            Err(err) => {
                tracing::warn!(
                    execution = %execution_id,
                    error = %err,
                    "result sink unavailable; running without case records"
                );
                None
            }
        });

        let relay = CaseRelay {
            execution_id,
            log_bus: Arc::clone(log_bus),
            sink,
        };

        tracing::info!(execution = %execution_id, selected = selection.len(), "running test batch");
        let outcome = runner.execute(&selection, &relay, &cancel).await;

        let status = if cancel.is_cancelled() {
            if let Err(err) = outcome {
                tracing::debug!(execution = %execution_id, error = %err, "runner error after cancellation");
            }
            registry.set_status(execution_id, ExecutionStatus::Cancelled);
            log_bus.publish(execution_id, "\n=== Execution Cancelled ===\n");
            tracing::info!(execution = %execution_id, "execution cancelled");
            ExecutionStatus::Cancelled
        } else {
            match outcome {
                Ok(()) => {
                    registry.set_status(execution_id, ExecutionStatus::Completed);
                    log_bus.publish(execution_id, "\n=== Execution Completed ===\n");
                    tracing::info!(execution = %execution_id, "execution completed");
                    Self::generate_report(registry, log_bus, reports, execution_id).await;
                    ExecutionStatus::Completed
                }
                Err(err) => {
                    registry.set_status(execution_id, ExecutionStatus::Failed);
                    log_bus.publish(execution_id, format!("\n=== Execution Failed: {err} ===\n"));
                    tracing::error!(execution = %execution_id, error = %err, "execution failed");
                    ExecutionStatus::Failed
                }
            }
        };

        telemetry::record_execution_end(timing, status.to_string());
        // End-of-stream exactly once, whichever branch was taken above.
        log_bus.complete(execution_id);
    }

    async fn generate_report(
        registry: &ExecutionRegistry,
        log_bus: &Arc<LogBus>,
        reports: &dyn ReportGenerator,
        execution_id: ExecutionId,
    ) {
        let span = telemetry::report_span(execution_id.to_string());
        async {
            log_bus.publish(execution_id, "\n=== Generating Report ===\n");
            match reports.generate_report(execution_id).await {
                Ok(report_id) => {
                    registry.set_report_id(execution_id, report_id.clone());
                    log_bus.publish(execution_id, format!("Report generated: {report_id}\n"));
                    tracing::info!(execution = %execution_id, report = %report_id, "report generated");
                }
                Err(err) => {
                    // Non-fatal: the execution stays completed, without
                    // a report id.
                    tracing::warn!(execution = %execution_id, error = %err, "report generation failed");
                    log_bus.publish(
                        execution_id,
                        format!("Warning: Failed to generate report: {err}\n"),
                    );
                }
            }
        }
        .instrument(span)
        .await;
    }
}

/// Translates runner callbacks into log chunks and case records.
///
/// All writes are fire-and-forget: sink errors are logged, never
/// propagated into the run.
struct CaseRelay {
    execution_id: ExecutionId,
    log_bus: Arc<LogBus>,
    sink: Option<Arc<dyn ResultSink>>,
}

impl RunObserver for CaseRelay {
    fn on_test_started(&self, test: &TestId, display_name: &str) {
        let _span = telemetry::case_span(self.execution_id.to_string(), test.as_str()).entered();
        self.log_bus
            .publish(self.execution_id, format!("[TEST STARTED] {display_name}\n"));
        tracing::debug!(execution = %self.execution_id, test = %test, "test started");
        if let Some(sink) = &self.sink {
            if let Err(err) = sink.case_started(test, display_name) {
                tracing::warn!(
                    execution = %self.execution_id,
                    test = %test,
                    error = %err,
                    "result sink rejected case start"
                );
            }
        }
    }

    fn on_test_finished(&self, test: &TestId, display_name: &str, result: &CaseResult) {
        let _span = telemetry::case_span(self.execution_id.to_string(), test.as_str()).entered();
        self.log_bus.publish(
            self.execution_id,
            format!("[TEST FINISHED] {display_name} - Status: {}\n", result.kind),
        );
        tracing::debug!(
            execution = %self.execution_id,
            test = %test,
            status = %result.kind,
            "test finished"
        );
        if let Some(sink) = &self.sink {
            if let Err(err) = sink.case_finished(
                test,
                display_name,
                CaseStatus::from(result.kind),
                result.message.as_deref(),
            ) {
                tracing::warn!(
                    execution = %self.execution_id,
                    test = %test,
                    error = %err,
                    "result sink rejected case finish"
                );
            }
        }
    }

    fn on_test_skipped(&self, test: &TestId, display_name: &str, reason: &str) {
        let _span = telemetry::case_span(self.execution_id.to_string(), test.as_str()).entered();
        self.log_bus.publish(
            self.execution_id,
            format!("[TEST SKIPPED] {display_name} - Reason: {reason}\n"),
        );
        tracing::debug!(
            execution = %self.execution_id,
            test = %test,
            reason = reason,
            "test skipped"
        );
        if let Some(sink) = &self.sink {
            if let Err(err) = sink.case_skipped(test, display_name, reason) {
                tracing::warn!(
                    execution = %self.execution_id,
                    test = %test,
                    error = %err,
                    "result sink rejected case skip"
                );
            }
        }
    }
}
