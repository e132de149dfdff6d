use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::Notify;

use crate::error::RegistryError;
use crate::execution::{ExecutionId, ExecutionRecord, ExecutionStatus};
use crate::report::ReportId;

/// Cooperative cancellation flag for one execution.
///
/// `cancel` only flips the flag and wakes waiters; the worker and the
/// runner poll it at test-case boundaries. Nothing is ever preempted.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    inner: Arc<CancelTokenInner>,
}

#[derive(Debug, Default)]
struct CancelTokenInner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelToken {
    /// Create a new, un-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// Check if cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Wait until cancelled.
    pub async fn cancelled(&self) {
        let notified = self.inner.notify.notified();
        tokio::pin!(notified);
        // Register interest before the flag re-check so a cancel landing
        // in between cannot be missed.
        notified.as_mut().enable();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

struct RegistryEntry {
    record: ExecutionRecord,
    cancel: CancelToken,
}

/// Concurrent map of execution ID to execution state: the single source
/// of truth for status, cancellation flag, and report ID.
///
/// All operations are O(1) and safe for unbounded concurrent callers;
/// the map is sharded, so writers of one execution never block readers
/// of another. Records live until process restart — there is no
/// eviction.
#[derive(Default)]
pub struct ExecutionRegistry {
    entries: DashMap<ExecutionId, RegistryEntry>,
}

impl fmt::Debug for ExecutionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionRegistry")
            .field("executions", &self.entries.len())
            .finish()
    }
}

impl ExecutionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new execution in the `Running` state.
    ///
    /// Fails with [`RegistryError::DuplicateExecution`] if the ID is
    /// already present. IDs are freshly generated UUIDs, so this is a
    /// defensive check rather than an expected path.
    pub fn create(&self, id: ExecutionId) -> Result<ExecutionRecord, RegistryError> {
        match self.entries.entry(id) {
            Entry::Occupied(_) => Err(RegistryError::DuplicateExecution(id)),
            Entry::Vacant(slot) => {
                let record = ExecutionRecord::new(id);
                slot.insert(RegistryEntry {
                    record: record.clone(),
                    cancel: CancelToken::new(),
                });
                Ok(record)
            }
        }
    }

    /// Current status of an execution.
    pub fn status(&self, id: ExecutionId) -> Result<ExecutionStatus, RegistryError> {
        self.entries
            .get(&id)
            .map(|entry| entry.record.status)
            .ok_or(RegistryError::NotFound(id))
    }

    /// Snapshot of the full record: status plus optional report ID.
    pub fn record(&self, id: ExecutionId) -> Result<ExecutionRecord, RegistryError> {
        self.entries
            .get(&id)
            .map(|entry| entry.record.clone())
            .ok_or(RegistryError::NotFound(id))
    }

    /// Transition an execution's status.
    ///
    /// The first terminal write wins: once a record is terminal, later
    /// writes are ignored no-ops, so concurrent worker/cancellation
    /// races are benign. Returns whether the transition was applied.
    pub fn set_status(&self, id: ExecutionId, status: ExecutionStatus) -> bool {
        let Some(mut entry) = self.entries.get_mut(&id) else {
            tracing::warn!(execution = %id, "status update for unknown execution");
            return false;
        };
        if entry.record.status.is_terminal() {
            tracing::debug!(
                execution = %id,
                current = %entry.record.status,
                requested = %status,
                "ignoring status write after terminal state"
            );
            return false;
        }
        entry.record.status = status;
        true
    }

    /// Attach a report ID to a completed execution.
    ///
    /// Ignored unless the execution is `Completed` and no report ID has
    /// been set yet.
    pub fn set_report_id(&self, id: ExecutionId, report_id: ReportId) {
        let Some(mut entry) = self.entries.get_mut(&id) else {
            tracing::warn!(execution = %id, "report id for unknown execution");
            return;
        };
        if entry.record.status != ExecutionStatus::Completed || entry.record.report_id.is_some() {
            tracing::debug!(
                execution = %id,
                status = %entry.record.status,
                "ignoring report id outside completed state"
            );
            return;
        }
        entry.record.report_id = Some(report_id);
    }

    /// Request cooperative cancellation of an execution.
    ///
    /// Fire-and-forget: flips the record's cancel flag and returns. An
    /// unknown ID is an operational signal, not a client error, and is
    /// only logged.
    pub fn request_cancel(&self, id: ExecutionId) {
        match self.entries.get(&id) {
            Some(entry) => {
                tracing::info!(execution = %id, "cancellation requested");
                entry.cancel.cancel();
            }
            None => {
                tracing::warn!(execution = %id, "cancellation requested for unknown execution");
            }
        }
    }

    /// Clone of the cancel token owned by an execution's record.
    pub fn cancel_token(&self, id: ExecutionId) -> Option<CancelToken> {
        self.entries.get(&id).map(|entry| entry.cancel.clone())
    }

    /// Whether cancellation has been requested for an execution.
    pub fn is_cancel_requested(&self, id: ExecutionId) -> bool {
        self.entries
            .get(&id)
            .map(|entry| entry.cancel.is_cancelled())
            .unwrap_or(false)
    }

    /// Number of registered executions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
