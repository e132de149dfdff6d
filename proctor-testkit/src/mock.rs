use async_trait::async_trait;
use parking_lot::Mutex;
use proctor::{
    CaseStatus, ExecutionId, ReportGenerator, ReportId, ResultSink, ResultSinkFactory, TestId,
};
use std::sync::Arc;

/// Lifecycle phase recorded by [`RecordingSink`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CasePhase {
    Started,
    Finished(CaseStatus),
    Skipped(String),
}

/// One recorded sink call.
#[derive(Clone, Debug)]
pub struct CaseRecord {
    pub test_id: TestId,
    pub display_name: String,
    pub phase: CasePhase,
    pub detail: Option<String>,
}

/// Result sink double that records every call for later assertions.
#[derive(Clone, Default)]
pub struct RecordingSink {
    records: Arc<Mutex<Vec<CaseRecord>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<CaseRecord> {
        self.records.lock().clone()
    }

    pub fn assert_record_count_eq(&self, expected: usize) {
        let actual = self.records.lock().len();
        assert_eq!(
            actual, expected,
            "Expected {} case records, got {}",
            expected, actual
        );
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl ResultSink for RecordingSink {
    fn case_started(&self, test: &TestId, display_name: &str) -> anyhow::Result<()> {
        self.records.lock().push(CaseRecord {
            test_id: test.clone(),
            display_name: display_name.to_string(),
            phase: CasePhase::Started,
            detail: None,
        });
        Ok(())
    }

    fn case_finished(
        &self,
        test: &TestId,
        display_name: &str,
        status: CaseStatus,
        detail: Option<&str>,
    ) -> anyhow::Result<()> {
        self.records.lock().push(CaseRecord {
            test_id: test.clone(),
            display_name: display_name.to_string(),
            phase: CasePhase::Finished(status),
            detail: detail.map(str::to_string),
        });
        Ok(())
    }

    fn case_skipped(&self, test: &TestId, display_name: &str, reason: &str) -> anyhow::Result<()> {
        self.records.lock().push(CaseRecord {
            test_id: test.clone(),
            display_name: display_name.to_string(),
            phase: CasePhase::Skipped(reason.to_string()),
            detail: None,
        });
        Ok(())
    }
}

/// Factory handing every execution a clone of one shared
/// [`RecordingSink`], so tests can inspect all recorded calls, and
/// remembering which executions asked for a sink.
#[derive(Clone, Default)]
pub struct RecordingSinkFactory {
    sink: RecordingSink,
    executions: Arc<Mutex<Vec<ExecutionId>>>,
}

impl RecordingSinkFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared sink all executions record into.
    pub fn sink(&self) -> RecordingSink {
        self.sink.clone()
    }

    /// Executions a sink was constructed for, in order.
    pub fn executions(&self) -> Vec<ExecutionId> {
        self.executions.lock().clone()
    }
}

impl ResultSinkFactory for RecordingSinkFactory {
    fn sink_for(&self, execution_id: ExecutionId) -> anyhow::Result<Arc<dyn ResultSink>> {
        self.executions.lock().push(execution_id);
        Ok(Arc::new(self.sink.clone()))
    }
}

/// Factory whose sink construction always fails, for exercising the
/// sink-unavailable path.
#[derive(Clone, Debug)]
pub struct FailingSinkFactory {
    message: String,
}

impl FailingSinkFactory {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl ResultSinkFactory for FailingSinkFactory {
    fn sink_for(&self, _execution_id: ExecutionId) -> anyhow::Result<Arc<dyn ResultSink>> {
        anyhow::bail!("{}", self.message)
    }
}

/// Report generator double returning a deterministic report id per
/// execution, or a fixed error.
#[derive(Clone)]
pub struct FixedReportGenerator {
    failure: Option<String>,
    calls: Arc<Mutex<Vec<ExecutionId>>>,
}

impl FixedReportGenerator {
    /// Succeed with `report-{execution_id}`.
    pub fn new() -> Self {
        Self {
            failure: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Fail every call with the given message.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Executions a report was requested for, in order.
    pub fn calls(&self) -> Vec<ExecutionId> {
        self.calls.lock().clone()
    }

    pub fn assert_call_count_eq(&self, expected: usize) {
        let actual = self.calls.lock().len();
        assert_eq!(
            actual, expected,
            "Expected {} report calls, got {}",
            expected, actual
        );
    }
}

impl Default for FixedReportGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReportGenerator for FixedReportGenerator {
    async fn generate_report(&self, execution_id: ExecutionId) -> anyhow::Result<ReportId> {
        self.calls.lock().push(execution_id);
        match &self.failure {
            Some(message) => anyhow::bail!("{message}"),
            None => Ok(ReportId::new(format!("report-{execution_id}"))),
        }
    }
}
