use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::sync::Arc;

use crate::execution::{ExecutionId, TestId, TestResultKind};

/// Case outcome vocabulary of the result-recording collaborator.
///
/// A runner-level `Aborted` maps to `Broken`: the case neither passed
/// nor failed an assertion, it blew up in scaffolding.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum CaseStatus {
    Passed,
    Failed,
    Broken,
    Skipped,
}

impl From<TestResultKind> for CaseStatus {
    fn from(kind: TestResultKind) -> Self {
        match kind {
            TestResultKind::Passed => CaseStatus::Passed,
            TestResultKind::Failed => CaseStatus::Failed,
            TestResultKind::Aborted => CaseStatus::Broken,
        }
    }
}

impl CaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::Passed => "passed",
            CaseStatus::Failed => "failed",
            CaseStatus::Broken => "broken",
            CaseStatus::Skipped => "skipped",
        }
    }
}

impl Display for CaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Optional telemetry collaborator recording case-scoped results for
/// one execution.
///
/// Errors from a sink are caught and logged by the caller; they never
/// abort the run.
pub trait ResultSink: Send + Sync {
    fn case_started(&self, test: &TestId, display_name: &str) -> anyhow::Result<()>;

    fn case_finished(
        &self,
        test: &TestId,
        display_name: &str,
        status: CaseStatus,
        detail: Option<&str>,
    ) -> anyhow::Result<()>;

    fn case_skipped(&self, test: &TestId, display_name: &str, reason: &str) -> anyhow::Result<()>;
}

/// Constructs one [`ResultSink`] instance per execution.
///
/// The sink is created when the execution starts and passed explicitly
/// down the call chain; no shared mutable global is involved. A factory
/// failure downgrades the execution to running without case records.
pub trait ResultSinkFactory: Send + Sync {
    fn sink_for(&self, execution_id: ExecutionId) -> anyhow::Result<Arc<dyn ResultSink>>;
}
