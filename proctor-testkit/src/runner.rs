use async_trait::async_trait;
use parking_lot::Mutex;
use proctor::{CancelToken, CaseResult, RunObserver, TestId, TestRunner, TestSelection};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Scripted outcome for one test case.
#[derive(Clone, Debug)]
pub enum ScriptedOutcome {
    Pass,
    Fail { message: String },
    Abort { message: String },
    Skip { reason: String },
}

/// One scripted test case: id, display name, and the outcome the runner
/// will report for it.
#[derive(Clone, Debug)]
pub struct ScriptedCase {
    pub test_id: TestId,
    pub display_name: String,
    pub outcome: ScriptedOutcome,
}

impl ScriptedCase {
    fn new(name: &str, outcome: ScriptedOutcome) -> Self {
        Self {
            test_id: TestId::new(format!("[case:{name}]")),
            display_name: name.to_string(),
            outcome,
        }
    }

    pub fn passing(name: &str) -> Self {
        Self::new(name, ScriptedOutcome::Pass)
    }

    pub fn failing(name: &str, message: &str) -> Self {
        Self::new(
            name,
            ScriptedOutcome::Fail {
                message: message.to_string(),
            },
        )
    }

    pub fn aborted(name: &str, message: &str) -> Self {
        Self::new(
            name,
            ScriptedOutcome::Abort {
                message: message.to_string(),
            },
        )
    }

    pub fn skipped(name: &str, reason: &str) -> Self {
        Self::new(
            name,
            ScriptedOutcome::Skip {
                reason: reason.to_string(),
            },
        )
    }
}

/// Test runner double that replays scripted case outcomes.
///
/// Cases are driven in selection order; ids not covered by the script
/// are ignored. The runner checks the cancel token before every case
/// and stops cleanly once it is set, which is exactly the cooperative
/// contract real runners must honor.
pub struct ScriptedRunner {
    cases: Vec<ScriptedCase>,
    case_delay: Duration,
    start_gate: Option<Arc<Notify>>,
    batch_error: Option<String>,
    executed: Arc<Mutex<Vec<TestId>>>,
}

impl ScriptedRunner {
    pub fn new(cases: Vec<ScriptedCase>) -> Self {
        Self {
            cases,
            case_delay: Duration::ZERO,
            start_gate: None,
            batch_error: None,
            executed: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Sleep this long inside every non-skipped case.
    pub fn with_case_delay(mut self, delay: Duration) -> Self {
        self.case_delay = delay;
        self
    }

    /// Hold the batch until the gate is notified (or cancellation is
    /// requested). Lets tests order a cancel deterministically before
    /// the first case.
    pub fn with_start_gate(mut self, gate: Arc<Notify>) -> Self {
        self.start_gate = Some(gate);
        self
    }

    /// Fail the whole batch with this error after driving all cases.
    pub fn with_batch_error(mut self, message: impl Into<String>) -> Self {
        self.batch_error = Some(message.into());
        self
    }

    /// IDs of the cases driven so far, in order.
    pub fn executed(&self) -> Vec<TestId> {
        self.executed.lock().clone()
    }

    pub fn assert_executed_count_eq(&self, expected: usize) {
        let actual = self.executed.lock().len();
        assert_eq!(
            actual, expected,
            "Expected {} executed cases, got {}",
            expected, actual
        );
    }
}

#[async_trait]
impl TestRunner for ScriptedRunner {
    async fn execute(
        &self,
        selection: &TestSelection,
        observer: &dyn RunObserver,
        cancel: &CancelToken,
    ) -> anyhow::Result<()> {
        if let Some(gate) = &self.start_gate {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = gate.notified() => {}
            }
        }

        for test in selection.iter() {
            if cancel.is_cancelled() {
                return Ok(());
            }
            let Some(case) = self.cases.iter().find(|case| &case.test_id == test) else {
                continue;
            };

            match &case.outcome {
                ScriptedOutcome::Skip { reason } => {
                    observer.on_test_skipped(&case.test_id, &case.display_name, reason);
                }
                ScriptedOutcome::Pass => {
                    self.drive_case(observer, case, CaseResult::passed()).await;
                }
                ScriptedOutcome::Fail { message } => {
                    self.drive_case(observer, case, CaseResult::failed(message.clone()))
                        .await;
                }
                ScriptedOutcome::Abort { message } => {
                    self.drive_case(observer, case, CaseResult::aborted(message.clone()))
                        .await;
                }
            }
            self.executed.lock().push(case.test_id.clone());
        }

        if let Some(message) = &self.batch_error {
            anyhow::bail!("{message}");
        }
        Ok(())
    }
}

impl ScriptedRunner {
    async fn drive_case(&self, observer: &dyn RunObserver, case: &ScriptedCase, result: CaseResult) {
        observer.on_test_started(&case.test_id, &case.display_name);
        if !self.case_delay.is_zero() {
            tokio::time::sleep(self.case_delay).await;
        }
        observer.on_test_finished(&case.test_id, &case.display_name, &result);
    }
}
