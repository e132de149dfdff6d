//! Basic executor example with scripted testkit collaborators.
//!
//! Builds an executor around proctor-testkit's ScriptedRunner and
//! FixedReportGenerator, submits a small batch, and streams the live
//! log output to stdout until the execution reaches a terminal state.

use std::sync::Arc;
use std::time::Duration;

use proctor::runtime::{ExecutorBuilder, ExecutorConfig};
use proctor_testkit::{FixedReportGenerator, ScriptedCase, ScriptedRunner};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cases = vec![
        ScriptedCase::passing("addition works"),
        ScriptedCase::passing("subtraction works"),
        ScriptedCase::failing("division by zero", "expected error, got 42"),
        ScriptedCase::skipped("network round-trip", "no network in CI"),
    ];
    let selected = cases.iter().map(|case| case.test_id.clone()).collect();

    let runner = Arc::new(ScriptedRunner::new(cases).with_case_delay(Duration::from_millis(100)));
    let reports = Arc::new(FixedReportGenerator::new());

    let executor = ExecutorBuilder::new(ExecutorConfig::default())
        .with_runner(runner)
        .with_report_generator(reports)
        .build()?;
    executor.start().await?;

    let execution_id = executor.submit(selected)?;
    println!("[CLIENT] Submitted execution {execution_id}");

    let mut logs = executor.subscribe_logs(execution_id);
    while let Some(chunk) = logs.next().await {
        print!("{chunk}");
    }

    let record = executor.record(execution_id)?;
    println!("[CLIENT] Final status: {}", record.status);
    if let Some(report_id) = record.report_id {
        println!("[CLIENT] Report available: {report_id}");
    }

    executor.shutdown().await?;
    Ok(())
}
