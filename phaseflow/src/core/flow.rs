//! Flow type and run state enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Selects which steps are eligible to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowType {
    /// Normal forward execution.
    #[default]
    Primary,
    /// Entered after the first unrecoverable failure.
    Rollback,
}

impl fmt::Display for FlowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Rollback => write!(f, "rollback"),
        }
    }
}

/// Lifecycle of a pipeline's most recent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// No run has started yet.
    #[default]
    NotStarted,
    /// A run is in progress.
    Running,
    /// The last run finished every phase.
    Completed,
    /// The last run stopped early.
    Aborted,
}

impl RunState {
    /// Returns true if the state is terminal.
    #[must_use]
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not_started"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}
