use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

use crate::execution::ExecutionId;

/// Identifier of a persisted report, assigned by the report generator.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ReportId(String);

impl ReportId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ReportId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ReportId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ReportId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// External collaborator that turns the captured results of a completed
/// execution into a persisted report.
///
/// A failure here is reported as a warning in the execution's log
/// stream; it never changes a completed execution's status.
#[async_trait]
pub trait ReportGenerator: Send + Sync {
    /// Generate a report for the given execution.
    async fn generate_report(&self, execution_id: ExecutionId) -> anyhow::Result<ReportId>;
}
