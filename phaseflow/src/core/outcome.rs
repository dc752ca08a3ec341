//! Success/failure values produced by work units, phases and runs.

use super::fail::{Fail, FailList};
use serde::{Deserialize, Serialize};

/// The outcome of executing a work unit or a whole pipeline.
///
/// An outcome is successful unless it carries at least one fail whose level is
/// not [`FailLevel::Warning`](super::FailLevel::Warning). Untyped outcomes use
/// the default `T = ()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome<T = ()> {
    /// Typed response, present on typed successes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<T>,
    /// Fails in discovery order.
    #[serde(default)]
    pub fails: FailList,
}

impl Outcome {
    /// Creates a successful untyped outcome.
    #[must_use]
    pub fn success() -> Self {
        Self {
            response: None,
            fails: Vec::new(),
        }
    }

    /// Merges step outcomes into a phase outcome.
    ///
    /// Fails are concatenated in iteration order. The merged outcome is
    /// successful iff every input was.
    #[must_use]
    pub fn combine<U>(outcomes: impl IntoIterator<Item = Outcome<U>>) -> Self {
        let fails = outcomes.into_iter().flat_map(|o| o.fails).collect();
        Self {
            response: None,
            fails,
        }
    }
}

impl<T> Outcome<T> {
    /// Creates a successful outcome wrapping a response.
    #[must_use]
    pub fn with_response(response: T) -> Self {
        Self {
            response: Some(response),
            fails: Vec::new(),
        }
    }

    /// Creates a failed outcome. The response is absent.
    #[must_use]
    pub fn failure(fails: impl IntoIterator<Item = Fail>) -> Self {
        Self {
            response: None,
            fails: fails.into_iter().collect(),
        }
    }

    /// Creates a failed outcome from a single fail.
    #[must_use]
    pub fn fail(fail: Fail) -> Self {
        Self::failure([fail])
    }

    /// Returns true if no fail is above warning level.
    #[must_use]
    pub fn is_success(&self) -> bool {
        !self.fails.iter().any(Fail::is_blocking)
    }

    /// Returns true if any fail is above warning level.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        !self.is_success()
    }

    /// Returns true if a fail with the given mnemonic is present.
    #[must_use]
    pub fn has_fail(&self, mnemonic: &str) -> bool {
        self.fails.iter().any(|f| f.mnemonic == mnemonic)
    }

    /// Returns the response, if any.
    #[must_use]
    pub fn response(&self) -> Option<&T> {
        self.response.as_ref()
    }

    /// Drops the response, keeping the fails.
    #[must_use]
    pub fn into_untyped(self) -> Outcome {
        Outcome {
            response: None,
            fails: self.fails,
        }
    }
}

impl<T> Default for Outcome<T> {
    fn default() -> Self {
        Self {
            response: None,
            fails: Vec::new(),
        }
    }
}
