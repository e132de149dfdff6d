//! Executor integration tests for the proctor orchestration core.
//!
//! Exercises the full submit / stream / cancel / report flow against
//! the in-memory testkit doubles: completion with report hand-off,
//! cooperative cancellation, runner and report failures, queue
//! capacity, and log fan-out behavior.

use std::sync::Arc;
use std::time::Duration;

use proctor::runtime::{Executor, ExecutorBuilder, ExecutorConfig};
use proctor::{
    CaseStatus, ExecutionId, ExecutionStatus, LogSubscription, RegistryError, ReportGenerator,
    ReportId, ResultSinkFactory, SubmitError, TestId, TestRunner,
};
use proctor_testkit::{
    CasePhase, FailingSinkFactory, FixedReportGenerator, RecordingSinkFactory, ScriptedCase,
    ScriptedRunner,
};
use tokio::sync::Notify;
use tokio::time::timeout;

fn small_config() -> ExecutorConfig {
    ExecutorConfig {
        worker_count: 2,
        queue_depth: 8,
        shutdown_grace_secs: 5,
    }
}

fn scripted_ids(cases: &[ScriptedCase]) -> Vec<TestId> {
    cases.iter().map(|case| case.test_id.clone()).collect()
}

fn build_executor(
    config: ExecutorConfig,
    runner: Arc<dyn TestRunner>,
    reports: Arc<dyn ReportGenerator>,
    sinks: Option<Arc<dyn ResultSinkFactory>>,
) -> Executor {
    let mut builder = ExecutorBuilder::new(config)
        .with_runner(runner)
        .with_report_generator(reports);
    if let Some(sinks) = sinks {
        builder = builder.with_result_sinks(sinks);
    }
    builder.build().expect("build executor")
}

async fn wait_for_status(executor: &Executor, id: ExecutionId, expected: ExecutionStatus) {
    let wait = timeout(Duration::from_secs(5), async {
        loop {
            match executor.status(id) {
                Ok(status) if status == expected => break,
                Ok(_) => tokio::time::sleep(Duration::from_millis(10)).await,
                Err(err) => panic!("status lookup failed: {err}"),
            }
        }
    })
    .await;
    assert!(wait.is_ok(), "timed out waiting for status {expected}");
}

async fn wait_for_report(executor: &Executor, id: ExecutionId) -> ReportId {
    let report = timeout(Duration::from_secs(5), async {
        loop {
            if let Some(report_id) = executor.report_id_for(id).expect("record lookup") {
                return report_id;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    report.expect("timed out waiting for report id")
}

async fn drain(mut subscription: LogSubscription) -> String {
    let mut all = String::new();
    loop {
        let chunk = timeout(Duration::from_secs(5), subscription.next())
            .await
            .expect("log stream stalled");
        match chunk {
            Some(chunk) => all.push_str(&chunk),
            None => return all,
        }
    }
}

#[tokio::test]
async fn submit_runs_all_cases_and_stores_report() {
    let cases = vec![
        ScriptedCase::passing("alpha"),
        ScriptedCase::passing("beta"),
        ScriptedCase::passing("gamma"),
    ];
    let selection = scripted_ids(&cases);
    let runner = Arc::new(ScriptedRunner::new(cases));
    let reports = Arc::new(FixedReportGenerator::new());
    let executor = build_executor(small_config(), runner.clone(), reports.clone(), None);
    executor.start().await.expect("start executor");

    let id = executor.submit(selection).expect("submit");

    // Immediately visible, running or already terminal, never unknown.
    let status = executor.status(id).expect("status after submit");
    assert!(status == ExecutionStatus::Running || status.is_terminal());

    wait_for_status(&executor, id, ExecutionStatus::Completed).await;
    let report_id = wait_for_report(&executor, id).await;
    assert_eq!(report_id, ReportId::new(format!("report-{id}")));
    reports.assert_call_count_eq(1);
    runner.assert_executed_count_eq(3);

    let captured = executor.captured_output(id);
    assert!(captured.contains("=== Test Execution Started ==="));
    assert!(captured.contains(&format!("Execution ID: {id}")));
    assert!(captured.contains("Selected tests: 3"));
    for name in ["alpha", "beta", "gamma"] {
        let started = captured
            .find(&format!("[TEST STARTED] {name}"))
            .unwrap_or_else(|| panic!("missing start banner for {name}"));
        let finished = captured
            .find(&format!("[TEST FINISHED] {name} - Status: SUCCESSFUL"))
            .unwrap_or_else(|| panic!("missing finish banner for {name}"));
        assert!(started < finished, "start must precede finish for {name}");
    }
    // Selection order is preserved across cases.
    assert!(captured.find("[TEST FINISHED] alpha").unwrap() < captured.find("[TEST STARTED] beta").unwrap());
    assert!(captured.find("[TEST FINISHED] beta").unwrap() < captured.find("[TEST STARTED] gamma").unwrap());
    assert!(captured.contains("=== Execution Completed ==="));
    assert!(captured.contains(&format!("Report generated: report-{id}")));

    executor.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn submit_rejects_empty_selection_without_side_effects() {
    let runner = Arc::new(ScriptedRunner::new(Vec::new()));
    let executor = build_executor(
        small_config(),
        runner,
        Arc::new(FixedReportGenerator::new()),
        None,
    );

    let result = executor.submit(Vec::new());
    assert!(matches!(result, Err(SubmitError::EmptySelection)));
    assert!(executor.registry().is_empty(), "no execution id was created");
}

#[tokio::test]
async fn submitted_ids_are_unique() {
    let cases = vec![ScriptedCase::passing("only")];
    let selection = scripted_ids(&cases);
    let runner = Arc::new(ScriptedRunner::new(cases));
    let executor = build_executor(
        small_config(),
        runner,
        Arc::new(FixedReportGenerator::new()),
        None,
    );
    executor.start().await.expect("start executor");

    let mut seen = std::collections::HashSet::new();
    for _ in 0..5 {
        let id = executor.submit(selection.clone()).expect("submit");
        assert!(seen.insert(id), "execution id reused");
        assert!(executor.status(id).is_ok());
    }

    executor.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn immediate_cancel_ends_cancelled_without_report() {
    let cases = vec![ScriptedCase::passing("never-runs")];
    let selection = scripted_ids(&cases);
    let gate = Arc::new(Notify::new());
    let runner = Arc::new(ScriptedRunner::new(cases).with_start_gate(Arc::clone(&gate)));
    let reports = Arc::new(FixedReportGenerator::new());
    let executor = build_executor(small_config(), runner.clone(), reports.clone(), None);
    executor.start().await.expect("start executor");

    let id = executor.submit(selection).expect("submit");
    executor.cancel(id);

    wait_for_status(&executor, id, ExecutionStatus::Cancelled).await;
    assert!(executor.report_id_for(id).expect("record").is_none());
    reports.assert_call_count_eq(0);
    runner.assert_executed_count_eq(0);

    let captured = executor.captured_output(id);
    assert!(captured.contains("=== Execution Cancelled ==="));
    assert!(!captured.contains("[TEST STARTED]"));

    executor.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn cancel_is_idempotent() {
    let cases = vec![ScriptedCase::passing("once")];
    let selection = scripted_ids(&cases);
    let gate = Arc::new(Notify::new());
    let runner = Arc::new(ScriptedRunner::new(cases).with_start_gate(Arc::clone(&gate)));
    let executor = build_executor(
        small_config(),
        runner,
        Arc::new(FixedReportGenerator::new()),
        None,
    );
    executor.start().await.expect("start executor");

    let id = executor.submit(selection).expect("submit");
    executor.cancel(id);
    executor.cancel(id);

    wait_for_status(&executor, id, ExecutionStatus::Cancelled).await;

    // Cancelling after the terminal state is a no-op, not an error.
    executor.cancel(id);
    assert_eq!(
        executor.status(id).expect("status"),
        ExecutionStatus::Cancelled
    );

    executor.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn cancel_after_completion_is_a_noop() {
    let cases = vec![ScriptedCase::passing("fast")];
    let selection = scripted_ids(&cases);
    let runner = Arc::new(ScriptedRunner::new(cases));
    let executor = build_executor(
        small_config(),
        runner,
        Arc::new(FixedReportGenerator::new()),
        None,
    );
    executor.start().await.expect("start executor");

    let id = executor.submit(selection).expect("submit");
    wait_for_status(&executor, id, ExecutionStatus::Completed).await;

    executor.cancel(id);
    assert_eq!(
        executor.status(id).expect("status"),
        ExecutionStatus::Completed
    );

    executor.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn runner_failure_marks_execution_failed() {
    let cases = vec![ScriptedCase::passing("early")];
    let selection = scripted_ids(&cases);
    let runner = Arc::new(ScriptedRunner::new(cases).with_batch_error("framework exploded"));
    let reports = Arc::new(FixedReportGenerator::new());
    let executor = build_executor(small_config(), runner, reports.clone(), None);
    executor.start().await.expect("start executor");

    let id = executor.submit(selection).expect("submit");
    wait_for_status(&executor, id, ExecutionStatus::Failed).await;

    assert!(executor.report_id_for(id).expect("record").is_none());
    reports.assert_call_count_eq(0);

    let captured = executor.captured_output(id);
    assert!(captured.contains("=== Execution Failed: framework exploded ==="));

    executor.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn report_failure_keeps_execution_completed() {
    let cases = vec![ScriptedCase::passing("fine")];
    let selection = scripted_ids(&cases);
    let runner = Arc::new(ScriptedRunner::new(cases));
    let reports = Arc::new(FixedReportGenerator::failing("renderer unavailable"));
    let executor = build_executor(small_config(), runner, reports.clone(), None);
    executor.start().await.expect("start executor");

    let id = executor.submit(selection).expect("submit");
    wait_for_status(&executor, id, ExecutionStatus::Completed).await;

    // Drain the stream so the run has fully settled before asserting.
    drain(executor.subscribe_logs(id)).await;

    assert_eq!(
        executor.status(id).expect("status"),
        ExecutionStatus::Completed
    );
    assert!(executor.report_id_for(id).expect("record").is_none());
    reports.assert_call_count_eq(1);

    let captured = executor.captured_output(id);
    assert!(captured.contains("Warning: Failed to generate report: renderer unavailable"));
    assert!(captured.contains("=== Execution Completed ==="));

    executor.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn unknown_id_queries_behave_per_contract() {
    let executor = build_executor(
        small_config(),
        Arc::new(ScriptedRunner::new(Vec::new())),
        Arc::new(FixedReportGenerator::new()),
        None,
    );

    let unknown = ExecutionId::new();
    assert_eq!(
        executor.status(unknown).unwrap_err(),
        RegistryError::NotFound(unknown)
    );
    assert_eq!(
        executor.report_id_for(unknown).unwrap_err(),
        RegistryError::NotFound(unknown)
    );
    // Captured output is empty, not an error.
    assert_eq!(executor.captured_output(unknown), "");
}

#[tokio::test]
async fn live_stream_matches_captured_history() {
    let cases = vec![ScriptedCase::passing("one"), ScriptedCase::passing("two")];
    let selection = scripted_ids(&cases);
    let runner = Arc::new(ScriptedRunner::new(cases));
    let executor = build_executor(
        small_config(),
        runner,
        Arc::new(FixedReportGenerator::new()),
        None,
    );
    executor.start().await.expect("start executor");

    let id = executor.submit(selection).expect("submit");
    let streamed = drain(executor.subscribe_logs(id)).await;

    assert_eq!(streamed, executor.captured_output(id));
    assert!(streamed.contains("=== Execution Completed ==="));

    executor.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn late_subscriber_still_sees_full_history() {
    let cases = vec![ScriptedCase::passing("done-before-subscribe")];
    let selection = scripted_ids(&cases);
    let runner = Arc::new(ScriptedRunner::new(cases));
    let executor = build_executor(
        small_config(),
        runner,
        Arc::new(FixedReportGenerator::new()),
        None,
    );
    executor.start().await.expect("start executor");

    let id = executor.submit(selection).expect("submit");
    wait_for_status(&executor, id, ExecutionStatus::Completed).await;
    drain(executor.subscribe_logs(id)).await;

    // Attach only now, after everything already happened.
    let replayed = drain(executor.subscribe_logs(id)).await;
    assert!(replayed.contains("=== Test Execution Started ==="));
    assert!(replayed.contains("[TEST STARTED] done-before-subscribe"));
    assert!(replayed.contains("=== Execution Completed ==="));

    executor.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn dropping_one_subscriber_does_not_starve_the_other() {
    let cases = vec![ScriptedCase::passing("fanout")];
    let selection = scripted_ids(&cases);
    let gate = Arc::new(Notify::new());
    let runner = Arc::new(ScriptedRunner::new(cases).with_start_gate(Arc::clone(&gate)));
    let executor = build_executor(
        small_config(),
        runner,
        Arc::new(FixedReportGenerator::new()),
        None,
    );
    executor.start().await.expect("start executor");

    let id = executor.submit(selection).expect("submit");
    let doomed = executor.subscribe_logs(id);
    let surviving = executor.subscribe_logs(id);

    drop(doomed);
    gate.notify_one();

    let streamed = drain(surviving).await;
    assert!(streamed.contains("[TEST FINISHED] fanout - Status: SUCCESSFUL"));
    assert!(streamed.contains("=== Execution Completed ==="));

    executor.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn queue_capacity_rejects_submissions_fast() {
    let cases = vec![ScriptedCase::passing("queued")];
    let selection = scripted_ids(&cases);
    let runner = Arc::new(ScriptedRunner::new(cases));
    let config = ExecutorConfig {
        worker_count: 1,
        queue_depth: 2,
        shutdown_grace_secs: 5,
    };
    let executor = build_executor(
        config,
        runner,
        Arc::new(FixedReportGenerator::new()),
        None,
    );
    // Workers intentionally not started: the queue fills deterministically.

    let first = executor.submit(selection.clone()).expect("first submit");
    let second = executor.submit(selection.clone()).expect("second submit");
    let third = executor.submit(selection.clone());
    assert!(matches!(third, Err(SubmitError::QueueFull)));

    // The rejected submission left no trace; the accepted ones are live.
    assert_eq!(executor.registry().len(), 2);
    assert_eq!(
        executor.status(first).expect("status"),
        ExecutionStatus::Running
    );
    assert_eq!(
        executor.status(second).expect("status"),
        ExecutionStatus::Running
    );
}

#[tokio::test]
async fn skipped_cases_are_bannered_and_recorded() {
    let cases = vec![
        ScriptedCase::skipped("flaky", "quarantined"),
        ScriptedCase::passing("solid"),
    ];
    let selection = scripted_ids(&cases);
    let runner = Arc::new(ScriptedRunner::new(cases));
    let sinks = Arc::new(RecordingSinkFactory::new());
    let executor = build_executor(
        small_config(),
        runner,
        Arc::new(FixedReportGenerator::new()),
        Some(sinks.clone()),
    );
    executor.start().await.expect("start executor");

    let id = executor.submit(selection).expect("submit");
    wait_for_status(&executor, id, ExecutionStatus::Completed).await;

    let captured = executor.captured_output(id);
    assert!(captured.contains("[TEST SKIPPED] flaky - Reason: quarantined"));

    let records = sinks.sink().records();
    assert!(records
        .iter()
        .any(|record| record.phase == CasePhase::Skipped("quarantined".to_string())));

    executor.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn sink_receives_mapped_case_statuses() {
    let cases = vec![
        ScriptedCase::passing("ok"),
        ScriptedCase::failing("broken-assert", "expected 2, got 3"),
        ScriptedCase::aborted("blew-up", "fixture missing"),
    ];
    let selection = scripted_ids(&cases);
    let runner = Arc::new(ScriptedRunner::new(cases));
    let sinks = Arc::new(RecordingSinkFactory::new());
    let executor = build_executor(
        small_config(),
        runner,
        Arc::new(FixedReportGenerator::new()),
        Some(sinks.clone()),
    );
    executor.start().await.expect("start executor");

    let id = executor.submit(selection).expect("submit");
    wait_for_status(&executor, id, ExecutionStatus::Completed).await;

    assert_eq!(sinks.executions(), vec![id]);
    let records = sinks.sink().records();
    let finished: Vec<_> = records
        .iter()
        .filter_map(|record| match &record.phase {
            CasePhase::Finished(status) => Some((record.display_name.as_str(), *status)),
            _ => None,
        })
        .collect();
    assert_eq!(
        finished,
        vec![
            ("ok", CaseStatus::Passed),
            ("broken-assert", CaseStatus::Failed),
            ("blew-up", CaseStatus::Broken),
        ]
    );
    let failure_detail = records.iter().find_map(|record| match &record.phase {
        CasePhase::Finished(CaseStatus::Failed) => record.detail.clone(),
        _ => None,
    });
    assert_eq!(failure_detail, Some("expected 2, got 3".to_string()));

    executor.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn failing_sink_factory_does_not_abort_the_run() {
    let cases = vec![ScriptedCase::passing("resilient")];
    let selection = scripted_ids(&cases);
    let runner = Arc::new(ScriptedRunner::new(cases));
    let executor = build_executor(
        small_config(),
        runner,
        Arc::new(FixedReportGenerator::new()),
        Some(Arc::new(FailingSinkFactory::new("recorder offline"))),
    );
    executor.start().await.expect("start executor");

    let id = executor.submit(selection).expect("submit");
    wait_for_status(&executor, id, ExecutionStatus::Completed).await;

    let captured = executor.captured_output(id);
    assert!(captured.contains("[TEST FINISHED] resilient - Status: SUCCESSFUL"));

    executor.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn submissions_after_shutdown_are_rejected() {
    let cases = vec![ScriptedCase::passing("late")];
    let selection = scripted_ids(&cases);
    let runner = Arc::new(ScriptedRunner::new(cases));
    let executor = build_executor(
        small_config(),
        runner,
        Arc::new(FixedReportGenerator::new()),
        None,
    );
    executor.start().await.expect("start executor");
    executor.shutdown().await.expect("shutdown");

    let result = executor.submit(selection);
    assert!(matches!(result, Err(SubmitError::ShuttingDown)));
}
