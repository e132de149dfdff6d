//! Proctor - asynchronous test batch execution with live log streaming.
//!
//! A foundational crate for test launcher services: a client selects a
//! subset of discovered test cases, submits them for out-of-band
//! execution, watches the console output live, cancels cooperatively,
//! and picks up a generated report id afterward.
//!
//! # Core Concepts
//!
//! - **Execution**: One user-initiated run of a selected test subset,
//!   identified by an [`ExecutionId`] and tracked through the
//!   `Running -> {Completed, Cancelled, Failed}` state machine.
//!
//! - **Registry**: The [`ExecutionRegistry`] is the single source of
//!   truth for execution status, cancellation flags, and report ids.
//!
//! - **LogBus**: The [`LogBus`] fans streamed output out to any number
//!   of live subscribers per execution and retains the full captured
//!   history for late joiners.
//!
//! - **Executor**: The [`runtime::Executor`] ties the pieces together:
//!   it validates submissions, schedules batches onto a bounded worker
//!   pool, drives the runner, and hands completed executions off to
//!   report generation.
//!
//! - **Collaborators**: The actual test execution ([`TestRunner`]),
//!   report rendering ([`ReportGenerator`]), and optional case-result
//!   recording ([`ResultSink`]) live behind narrow trait boundaries and
//!   are injected through the [`runtime::ExecutorBuilder`].
//!
//! # Feature Flags
//!
//! - `metrics` - Prometheus metrics support
//!
//! # Example
//!
//! ```ignore
//! use proctor::runtime::{ExecutorBuilder, ExecutorConfig};
//!
//! let executor = ExecutorBuilder::new(ExecutorConfig::default())
//!     .with_runner(runner)
//!     .with_report_generator(reports)
//!     .build()?;
//! executor.start().await?;
//!
//! let id = executor.submit(selected_test_ids)?;
//! let mut logs = executor.subscribe_logs(id);
//! while let Some(chunk) = logs.next().await {
//!     print!("{chunk}");
//! }
//! ```

/// Configuration for log streaming channels.
///
/// The `config` module defines [`LogStreamConfig`] for tuning fan-out
/// buffering and subscriber idle timeouts.
pub mod config;

/// Error taxonomy for submissions and registry lookups.
///
/// The `error` module defines [`SubmitError`] (synchronous, client-side
/// failures) and [`RegistryError`] (unknown or duplicate execution
/// ids). Errors during an asynchronous run are never raised to callers;
/// they are captured into status and log stream instead.
pub mod error;

/// Core execution types.
///
/// The `execution` module defines the data model:
/// - [`ExecutionId`] - unique execution identifier
/// - [`ExecutionStatus`] - lifecycle states with terminal detection
/// - [`ExecutionRecord`] - registry snapshot of one execution
/// - [`TestId`] and [`TestSelection`] - validated client input
/// - [`TestResultKind`] and [`CaseResult`] - per-case outcomes
pub mod execution;

/// Per-execution log publish/subscribe with captured history.
///
/// The `logbus` module provides [`LogBus`], [`LogSubscription`], and
/// the [`LogEvent`] stream vocabulary.
pub mod logbus;

#[cfg(feature = "metrics")]
/// Prometheus metrics, enabled by the `metrics` feature.
pub mod metrics;

/// Concurrent execution state tracking.
///
/// The `registry` module provides [`ExecutionRegistry`] and the
/// cooperative [`CancelToken`].
pub mod registry;

/// Report generation collaborator boundary.
pub mod report;

/// Test runner collaborator boundary.
///
/// The `runner` module defines [`TestRunner`] and the [`RunObserver`]
/// callback interface the executor hands to it.
pub mod runner;

/// Execution orchestration runtime.
///
/// The `runtime` module provides the [`runtime::Executor`] worker pool
/// and the [`runtime::ExecutorBuilder`] for constructing it.
pub mod runtime;

/// Optional per-execution result recording collaborator.
pub mod sink;

/// Tracing spans and telemetry helpers.
pub mod telemetry;

pub use config::*;
pub use error::*;
pub use execution::*;
pub use logbus::*;
pub use registry::*;
pub use report::*;
pub use runner::*;
pub use sink::*;
