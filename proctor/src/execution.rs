use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use uuid::Uuid;

use crate::error::SubmitError;
use crate::report::ReportId;

/// Unique identifier for one submitted test execution.
///
/// Generated at submission time and never reused.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ExecutionId(pub Uuid);

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionId {
    /// Create a new execution ID using UUID v7.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Display for ExecutionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of an execution.
///
/// `Running` is the only non-terminal state; once a terminal state is
/// reached no further transition occurs.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl ExecutionStatus {
    /// Whether this status admits no further transitions.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExecutionStatus::Running)
    }
}

impl Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ExecutionStatus::Running => "RUNNING",
            ExecutionStatus::Completed => "COMPLETED",
            ExecutionStatus::Cancelled => "CANCELLED",
            ExecutionStatus::Failed => "FAILED",
        };
        write!(f, "{name}")
    }
}

/// Snapshot of one execution's registry state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// ID of the execution.
    pub id: ExecutionId,
    /// Current lifecycle status.
    pub status: ExecutionStatus,
    /// Report ID, set once the execution completed and report generation
    /// succeeded.
    pub report_id: Option<ReportId>,
    /// Timestamp of submission.
    pub created_at: DateTime<Utc>,
}

impl ExecutionRecord {
    pub(crate) fn new(id: ExecutionId) -> Self {
        Self {
            id,
            status: ExecutionStatus::Running,
            report_id: None,
            created_at: Utc::now(),
        }
    }
}

/// Opaque unique identifier of a single test case, as assigned by the
/// test framework that discovered it.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct TestId(String);

impl TestId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TestId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for TestId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Immutable, ordered, non-empty set of test IDs selected for one
/// execution.
///
/// The fallible constructor is the single validation point: an empty
/// selection never reaches the executor.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "Vec<TestId>", into = "Vec<TestId>")]
pub struct TestSelection(Vec<TestId>);

impl TestSelection {
    /// Build a selection, rejecting empty input.
    pub fn new(tests: Vec<TestId>) -> Result<Self, SubmitError> {
        if tests.is_empty() {
            return Err(SubmitError::EmptySelection);
        }
        Ok(Self(tests))
    }

    /// Number of selected tests; always at least one.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TestId> {
        self.0.iter()
    }

    pub fn tests(&self) -> &[TestId] {
        &self.0
    }
}

impl TryFrom<Vec<TestId>> for TestSelection {
    type Error = SubmitError;

    fn try_from(tests: Vec<TestId>) -> Result<Self, Self::Error> {
        Self::new(tests)
    }
}

impl From<TestSelection> for Vec<TestId> {
    fn from(selection: TestSelection) -> Self {
        selection.0
    }
}

impl<'a> IntoIterator for &'a TestSelection {
    type Item = &'a TestId;
    type IntoIter = std::slice::Iter<'a, TestId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Outcome kind reported by the runner for one finished test case.
///
/// Rendered with the runner framework's vocabulary in log banners.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum TestResultKind {
    Passed,
    Failed,
    Aborted,
}

impl Display for TestResultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TestResultKind::Passed => "SUCCESSFUL",
            TestResultKind::Failed => "FAILED",
            TestResultKind::Aborted => "ABORTED",
        };
        write!(f, "{name}")
    }
}

/// Result of a single finished test case: the outcome kind plus the
/// failure message, if any.
#[derive(Clone, Debug)]
pub struct CaseResult {
    pub kind: TestResultKind,
    pub message: Option<String>,
}

impl CaseResult {
    pub fn passed() -> Self {
        Self {
            kind: TestResultKind::Passed,
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            kind: TestResultKind::Failed,
            message: Some(message.into()),
        }
    }

    pub fn aborted(message: impl Into<String>) -> Self {
        Self {
            kind: TestResultKind::Aborted,
            message: Some(message.into()),
        }
    }
}
