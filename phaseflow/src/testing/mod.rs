//! Testing utilities for phaseflow pipelines.
//!
//! This module provides:
//! - Mock work units with shared call counters
//! - Test assertions for outcomes

mod assertions;
mod mocks;

pub use assertions::{assert_has_fail, assert_outcome_failed, assert_outcome_succeeded};
pub use mocks::{CallCounter, FailingOutcomeUnit, FaultUnit, FlakyUnit, SlowUnit, SuccessUnit};
