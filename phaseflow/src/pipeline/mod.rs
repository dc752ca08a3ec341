//! Pipeline assembly and execution.
//!
//! This module provides:
//! - Phase and step data model with execution counters
//! - Assembly surface validated as phases and steps are appended
//! - The phase-by-phase engine with concurrent steps
//! - Per-step retry policy
//! - Execution statistics

mod builder;
mod engine;
#[cfg(test)]
mod integration_tests;
mod phase;
mod retry;
mod stats;
mod step;

pub use engine::Pipeline;
pub use phase::{Phase, PhaseCounters, PhaseOptions};
pub use retry::{RetryDecision, RetryPolicy};
pub use stats::{PhaseStats, PipelineStats};
pub use step::{Step, StepCounters, StepOptions};
