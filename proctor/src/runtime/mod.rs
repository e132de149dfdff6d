/// Builder for constructing executors with explicit dependencies.
pub mod builder;
/// Execution orchestration: submission, worker pool, and lifecycle
/// driving.
pub mod executor;

pub use builder::ExecutorBuilder;
pub use executor::{Executor, ExecutorConfig};
