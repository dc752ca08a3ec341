//! Work units and their resolution.
//!
//! A work unit is the executable behind a step. Steps only store a
//! [`UnitKey`]; a [`UnitResolver`] turns that key into a fresh instance each
//! time the step is launched.

mod registry;

pub use registry::{UnitFactory, UnitKey, UnitRegistry, UnitResolver};

#[cfg(test)]
pub use registry::MockUnitResolver;

use crate::cancellation::CancellationToken;
use crate::core::Outcome;
use async_trait::async_trait;
use std::fmt;
use std::future::Future;

/// Trait for the task logic bound to a step.
///
/// Returning `Err` (or panicking) counts as a fault and is retried according
/// to the step's retry policy. Returning an `Outcome` - successful or not -
/// ends the step immediately.
#[async_trait]
pub trait WorkUnit: Send + Sync {
    /// Executes the unit.
    async fn execute(&self, cancel: &CancellationToken) -> anyhow::Result<Outcome>;
}

/// A work unit backed by an async closure.
pub struct FnUnit<F, Fut>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Outcome>> + Send,
{
    func: F,
}

impl<F, Fut> FnUnit<F, Fut>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Outcome>> + Send,
{
    /// Wraps a closure as a work unit.
    pub const fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F, Fut> fmt::Debug for FnUnit<F, Fut>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Outcome>> + Send,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnUnit").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F, Fut> WorkUnit for FnUnit<F, Fut>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Outcome>> + Send,
{
    async fn execute(&self, _cancel: &CancellationToken) -> anyhow::Result<Outcome> {
        (self.func)().await
    }
}
