//! In-memory collaborator doubles for testing proctor executors.
//!
//! Provides a scriptable [`TestRunner`](proctor::TestRunner), recording
//! result sinks, and a fixed-outcome report generator, so executor
//! behavior can be exercised without a real test framework or report
//! tooling.

pub mod mock;
pub mod runner;

pub use mock::*;
pub use runner::*;
