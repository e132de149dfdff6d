use std::fmt;
use std::sync::Arc;

use crate::logbus::LogBus;
use crate::registry::ExecutionRegistry;
use crate::report::ReportGenerator;
use crate::runner::TestRunner;
use crate::sink::ResultSinkFactory;

use super::executor::{Executor, ExecutorConfig};

/// Builder for constructing an [`Executor`] with explicit dependencies.
///
/// The builder validates that all required collaborators are provided
/// before constructing the executor. The registry and log bus default
/// to fresh instances when not supplied; the result sink factory is
/// optional.
///
/// # Example
///
/// ```ignore
/// use proctor::runtime::{ExecutorBuilder, ExecutorConfig};
///
/// let executor = ExecutorBuilder::new(ExecutorConfig::default())
///     .with_runner(runner)
///     .with_report_generator(reports)
///     .build()?;
/// executor.start().await?;
/// ```
pub struct ExecutorBuilder {
    config: ExecutorConfig,
    registry: Option<Arc<ExecutionRegistry>>,
    log_bus: Option<Arc<LogBus>>,
    runner: Option<Arc<dyn TestRunner>>,
    reports: Option<Arc<dyn ReportGenerator>>,
    sinks: Option<Arc<dyn ResultSinkFactory>>,
}

impl fmt::Debug for ExecutorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutorBuilder")
            .field("config", &self.config)
            .field("registry_set", &self.registry.is_some())
            .field("log_bus_set", &self.log_bus.is_some())
            .field("runner_set", &self.runner.is_some())
            .field("reports_set", &self.reports.is_some())
            .field("sinks_set", &self.sinks.is_some())
            .finish()
    }
}

impl ExecutorBuilder {
    /// Create a new builder with the given executor configuration.
    pub fn new(config: ExecutorConfig) -> Self {
        Self {
            config,
            registry: None,
            log_bus: None,
            runner: None,
            reports: None,
            sinks: None,
        }
    }

    /// Set the execution registry.
    pub fn with_registry(mut self, registry: Arc<ExecutionRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Set the log bus.
    pub fn with_log_bus(mut self, log_bus: Arc<LogBus>) -> Self {
        self.log_bus = Some(log_bus);
        self
    }

    /// Set the test runner collaborator.
    pub fn with_runner(mut self, runner: Arc<dyn TestRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    /// Set the report generator collaborator.
    pub fn with_report_generator(mut self, reports: Arc<dyn ReportGenerator>) -> Self {
        self.reports = Some(reports);
        self
    }

    /// Set the optional per-execution result sink factory.
    pub fn with_result_sinks(mut self, sinks: Arc<dyn ResultSinkFactory>) -> Self {
        self.sinks = Some(sinks);
        self
    }

    /// Build the [`Executor`] with all configured dependencies.
    ///
    /// # Errors
    ///
    /// Returns an error if the runner or report generator is missing.
    pub fn build(self) -> anyhow::Result<Executor> {
        let runner = self
            .runner
            .ok_or_else(|| anyhow::anyhow!("runner dependency missing"))?;
        let reports = self
            .reports
            .ok_or_else(|| anyhow::anyhow!("report generator dependency missing"))?;
        let registry = self.registry.unwrap_or_default();
        let log_bus = self.log_bus.unwrap_or_default();

        Ok(Executor::new(
            self.config,
            registry,
            log_bus,
            runner,
            reports,
            self.sinks,
        ))
    }
}
