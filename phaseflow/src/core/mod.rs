//! Core domain model types for phaseflow.
//!
//! This module contains the value types shared by every layer:
//! - Severity-tagged fails
//! - The success/failure outcome algebra
//! - Flow type and run state enums

mod fail;
mod flow;
mod outcome;

pub use fail::{codes, Fail, FailLevel, FailList};
pub use flow::{FlowType, RunState};
pub use outcome::Outcome;
