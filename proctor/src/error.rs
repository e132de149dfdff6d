use thiserror::Error;

use crate::execution::ExecutionId;

/// Errors raised by [`ExecutionRegistry`](crate::registry::ExecutionRegistry)
/// lookups and inserts.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum RegistryError {
    /// The queried execution ID was never registered.
    #[error("unknown execution id {0}")]
    NotFound(ExecutionId),
    /// An execution with this ID is already registered. Defensive: IDs
    /// are freshly generated UUIDs, so this should be unreachable.
    #[error("execution {0} is already registered")]
    DuplicateExecution(ExecutionId),
}

/// Errors returned synchronously from
/// [`Executor::submit`](crate::runtime::Executor::submit), before any
/// execution ID is allocated.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum SubmitError {
    /// The selected test set was empty.
    #[error("selected test set must not be empty")]
    EmptySelection,
    /// The bounded submission queue is at capacity; the caller should
    /// retry later rather than wait.
    #[error("execution queue is at capacity")]
    QueueFull,
    /// The executor has begun shutting down and accepts no new work.
    #[error("executor is shutting down")]
    ShuttingDown,
    #[error(transparent)]
    Registry(#[from] RegistryError),
}
