//! Error types for the phaseflow engine.
//!
//! Assembly and side-channel errors are synchronous and local to the call that
//! raised them. Failures that happen while a pipeline runs are never returned
//! as typed errors; they are reported as [`Fail`](crate::core::Fail) records
//! inside the run's [`Outcome`](crate::core::Outcome).

use thiserror::Error;

/// Error raised while appending phases or steps to a pipeline.
///
/// The pipeline is left in its last valid state when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblyError {
    /// The phase name was empty or whitespace.
    #[error("The phase name is required")]
    InvalidName,

    /// A phase with the same name already exists.
    #[error("The phase name ({name}) is already defined in the pipeline")]
    DuplicateName {
        /// The offending phase name.
        name: String,
    },

    /// A step was appended before any phase existed.
    #[error("The pipeline has no phases defined")]
    NoPhaseDefined,

    /// The retry count was negative or does not fit in a byte.
    #[error("The number of retries must be between 0 and 255 (got {value})")]
    InvalidRetries {
        /// The rejected value.
        value: i64,
    },

    /// The retry interval was negative.
    #[error("The retry interval must be greater than or equal to 0 (got {value})")]
    InvalidInterval {
        /// The rejected value.
        value: i64,
    },

    /// A step with the same name (ignoring case) already exists in the phase.
    #[error("The step name ({name}) is already used in phase '{phase}'")]
    DuplicateStepName {
        /// The target phase.
        phase: String,
        /// The offending step name.
        name: String,
    },

    /// The same work unit is already registered in the phase.
    #[error("The step pair ({phase}/{unit}) is already defined in the pipeline")]
    DuplicateWorkUnit {
        /// The target phase.
        phase: String,
        /// The duplicated work unit.
        unit: String,
    },

    /// The pipeline already holds the maximum number of phases.
    #[error("The pipeline cannot hold more than 256 phases")]
    TooManyPhases,
}

impl AssemblyError {
    /// Returns a stable code identifying the error kind.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidName => "ASSEMBLY-INVALID-NAME",
            Self::DuplicateName { .. } => "ASSEMBLY-DUPLICATE-NAME",
            Self::NoPhaseDefined => "ASSEMBLY-NO-PHASE",
            Self::InvalidRetries { .. } => "ASSEMBLY-INVALID-RETRIES",
            Self::InvalidInterval { .. } => "ASSEMBLY-INVALID-INTERVAL",
            Self::DuplicateStepName { .. } => "ASSEMBLY-DUPLICATE-STEP-NAME",
            Self::DuplicateWorkUnit { .. } => "ASSEMBLY-DUPLICATE-WORK-UNIT",
            Self::TooManyPhases => "ASSEMBLY-TOO-MANY-PHASES",
        }
    }
}

/// Error raised by side-channel operations on the shared context.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SideChannelError {
    /// The key was empty or whitespace.
    #[error("Key cannot be empty")]
    InvalidKey,

    /// No value was supplied.
    #[error("Value for key '{key}' cannot be absent")]
    NullValue {
        /// The key being written.
        key: String,
    },

    /// The key has already been written.
    #[error("Key '{key}' already exists")]
    DuplicateKey {
        /// The conflicting key.
        key: String,
    },

    /// The stored value is not of the requested type.
    #[error("Key '{key}' holds a value of type {actual}, not {expected}")]
    TypeMismatch {
        /// The key being read.
        key: String,
        /// The requested type.
        expected: &'static str,
        /// The stored type.
        actual: &'static str,
    },
}

/// Error raised when a work unit cannot be produced for a step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// Nothing is registered under the requested key.
    #[error("Work unit not registered: {unit}")]
    NotRegistered {
        /// The requested work unit.
        unit: String,
    },

    /// The factory refused to build an instance.
    #[error("Work unit factory failed: {unit} - {reason}")]
    Factory {
        /// The requested work unit.
        unit: String,
        /// Why the factory failed.
        reason: String,
    },
}

impl ResolveError {
    /// Creates a not-registered error.
    #[must_use]
    pub fn not_registered(unit: impl Into<String>) -> Self {
        Self::NotRegistered { unit: unit.into() }
    }

    /// Creates a factory error.
    #[must_use]
    pub fn factory(unit: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Factory {
            unit: unit.into(),
            reason: reason.into(),
        }
    }
}
