//! Severity-tagged failure records.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The severity of a fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailLevel {
    /// Informational; does not turn an outcome into a failure.
    Warning,
    /// A failure of the operation.
    #[default]
    Error,
    /// A failure that should draw immediate attention.
    Critical,
}

impl fmt::Display for FailLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// An immutable record describing one failure cause.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fail {
    /// Numeric code.
    pub code: i32,
    /// Mnemonic identifier, when available.
    pub mnemonic: String,
    /// Human-readable detail.
    pub info: String,
    /// Severity.
    #[serde(default)]
    pub level: FailLevel,
}

/// Fails in discovery order. Duplicates are allowed.
pub type FailList = Vec<Fail>;

impl Fail {
    /// Creates a new fail.
    #[must_use]
    pub fn raise(
        code: i32,
        mnemonic: impl Into<String>,
        info: impl Into<String>,
        level: FailLevel,
    ) -> Self {
        Self {
            code,
            mnemonic: mnemonic.into(),
            info: info.into(),
            level,
        }
    }

    /// Creates an error-level fail.
    #[must_use]
    pub fn error(code: i32, mnemonic: impl Into<String>, info: impl Into<String>) -> Self {
        Self::raise(code, mnemonic, info, FailLevel::Error)
    }

    /// Creates a warning-level fail.
    #[must_use]
    pub fn warning(code: i32, mnemonic: impl Into<String>, info: impl Into<String>) -> Self {
        Self::raise(code, mnemonic, info, FailLevel::Warning)
    }

    /// Creates a critical-level fail.
    #[must_use]
    pub fn critical(code: i32, mnemonic: impl Into<String>, info: impl Into<String>) -> Self {
        Self::raise(code, mnemonic, info, FailLevel::Critical)
    }

    /// Returns true unless the fail is a warning.
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        self.level != FailLevel::Warning
    }
}

impl fmt::Display for Fail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} ({}): {}", self.level, self.mnemonic, self.code, self.info)
    }
}

/// Fails raised by the engine itself.
pub mod codes {
    use super::Fail;

    /// Code shared by every engine-raised fail.
    pub const ENGINE_CODE: i32 = -1;

    /// No phase has a step eligible for the active flow type.
    pub const NO_PHASES_DEFINED: &str = "PIPELINE_NO_PHASES_DEFINED";
    /// A work unit kept faulting until its attempts ran out.
    pub const WORK_UNIT_FAILED: &str = "PIPELINE_WORK_UNIT_FAILED";
    /// A work unit could not be resolved.
    pub const WORK_UNIT_UNRESOLVED: &str = "PIPELINE_WORK_UNIT_UNRESOLVED";
    /// The run observed its cancellation signal.
    pub const CANCELLED: &str = "PIPELINE_CANCELLED";
    /// A step task ended without producing an outcome.
    pub const STEP_ABORTED: &str = "PIPELINE_STEP_ABORTED";

    pub(crate) fn no_phases_defined() -> Fail {
        Fail::warning(
            ENGINE_CODE,
            NO_PHASES_DEFINED,
            "There are no phases defined in the pipeline.",
        )
    }

    pub(crate) fn work_unit_failed(unit: &str) -> Fail {
        Fail::error(
            ENGINE_CODE,
            WORK_UNIT_FAILED,
            format!("Error executing work unit {unit}."),
        )
    }

    pub(crate) fn work_unit_unresolved(unit: &str, reason: &str) -> Fail {
        Fail::error(
            ENGINE_CODE,
            WORK_UNIT_UNRESOLVED,
            format!("Work unit {unit} could not be resolved: {reason}"),
        )
    }

    pub(crate) fn cancelled(reason: Option<&str>) -> Fail {
        Fail::error(
            ENGINE_CODE,
            CANCELLED,
            format!("Pipeline cancelled: {}", reason.unwrap_or("no reason given")),
        )
    }

    pub(crate) fn step_aborted(unit: &str, reason: &str) -> Fail {
        Fail::error(
            ENGINE_CODE,
            STEP_ABORTED,
            format!("Step task for work unit {unit} aborted: {reason}"),
        )
    }
}
