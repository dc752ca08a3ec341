//! Mock work units for testing.
//!
//! Units are rebuilt by their factory on every step launch, so each mock
//! reports its invocations through a [`CallCounter`] the factory hands to
//! every instance.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::cancellation::CancellationToken;
use crate::core::{Fail, Outcome};
use crate::units::WorkUnit;

/// A shared invocation counter.
#[derive(Debug, Clone, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    /// Creates a counter at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one call and returns the new total.
    pub fn increment(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Returns the number of recorded calls.
    #[must_use]
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    /// Resets the counter to zero.
    pub fn reset(&self) {
        self.0.store(0, Ordering::SeqCst);
    }
}

/// A unit that always succeeds.
#[derive(Debug, Clone, Default)]
pub struct SuccessUnit {
    calls: CallCounter,
}

impl SuccessUnit {
    /// Creates a unit that reports to `calls`.
    #[must_use]
    pub const fn counted(calls: CallCounter) -> Self {
        Self { calls }
    }
}

#[async_trait]
impl WorkUnit for SuccessUnit {
    async fn execute(&self, _cancel: &CancellationToken) -> anyhow::Result<Outcome> {
        self.calls.increment();
        Ok(Outcome::success())
    }
}

/// A unit that faults on every call.
#[derive(Debug, Clone)]
pub struct FaultUnit {
    message: String,
    calls: CallCounter,
}

impl Default for FaultUnit {
    fn default() -> Self {
        Self::new("work unit fault")
    }
}

impl FaultUnit {
    /// Creates a unit faulting with `message`.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            calls: CallCounter::new(),
        }
    }

    /// Reports calls to `calls`.
    #[must_use]
    pub fn counted(mut self, calls: CallCounter) -> Self {
        self.calls = calls;
        self
    }
}

#[async_trait]
impl WorkUnit for FaultUnit {
    async fn execute(&self, _cancel: &CancellationToken) -> anyhow::Result<Outcome> {
        self.calls.increment();
        anyhow::bail!("{}", self.message)
    }
}

/// A unit that faults for its first `failures` calls, then succeeds.
///
/// The count is taken from the shared counter, so it spans instances.
#[derive(Debug, Clone)]
pub struct FlakyUnit {
    failures: usize,
    calls: CallCounter,
}

impl FlakyUnit {
    /// Creates a unit that fails `failures` times across all instances sharing `calls`.
    #[must_use]
    pub const fn new(failures: usize, calls: CallCounter) -> Self {
        Self { failures, calls }
    }
}

#[async_trait]
impl WorkUnit for FlakyUnit {
    async fn execute(&self, _cancel: &CancellationToken) -> anyhow::Result<Outcome> {
        let call = self.calls.increment();
        if call <= self.failures {
            anyhow::bail!("transient failure {call}/{}", self.failures);
        }
        Ok(Outcome::success())
    }
}

/// A unit that takes time to execute.
#[derive(Debug, Clone)]
pub struct SlowUnit {
    delay: Duration,
    calls: CallCounter,
}

impl SlowUnit {
    /// Creates a unit sleeping for `delay`.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            calls: CallCounter::new(),
        }
    }

    /// Creates a slow unit with delay in milliseconds.
    #[must_use]
    pub fn with_delay_ms(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    /// Reports calls to `calls`.
    #[must_use]
    pub fn counted(mut self, calls: CallCounter) -> Self {
        self.calls = calls;
        self
    }
}

#[async_trait]
impl WorkUnit for SlowUnit {
    async fn execute(&self, _cancel: &CancellationToken) -> anyhow::Result<Outcome> {
        self.calls.increment();
        tokio::time::sleep(self.delay).await;
        Ok(Outcome::success())
    }
}

/// A unit that returns an outcome carrying a fixed fail.
#[derive(Debug, Clone)]
pub struct FailingOutcomeUnit {
    fail: Fail,
    calls: CallCounter,
}

impl FailingOutcomeUnit {
    /// Creates a unit returning `fail`.
    #[must_use]
    pub fn new(fail: Fail) -> Self {
        Self {
            fail,
            calls: CallCounter::new(),
        }
    }

    /// Reports calls to `calls`.
    #[must_use]
    pub fn counted(mut self, calls: CallCounter) -> Self {
        self.calls = calls;
        self
    }
}

#[async_trait]
impl WorkUnit for FailingOutcomeUnit {
    async fn execute(&self, _cancel: &CancellationToken) -> anyhow::Result<Outcome> {
        self.calls.increment();
        Ok(Outcome::fail(self.fail.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_success_unit() {
        let calls = CallCounter::new();
        let unit = SuccessUnit::counted(calls.clone());

        let outcome = unit.execute(&CancellationToken::new()).await.unwrap();
        assert!(outcome.is_success());
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn test_fault_unit() {
        let unit = FaultUnit::new("disk full");
        let err = unit.execute(&CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "disk full");
    }

    #[tokio::test]
    async fn test_flaky_unit_spans_instances() {
        let calls = CallCounter::new();
        let cancel = CancellationToken::new();

        assert!(FlakyUnit::new(2, calls.clone()).execute(&cancel).await.is_err());
        assert!(FlakyUnit::new(2, calls.clone()).execute(&cancel).await.is_err());
        assert!(FlakyUnit::new(2, calls.clone()).execute(&cancel).await.is_ok());
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_slow_unit() {
        let unit = SlowUnit::with_delay_ms(10);

        let start = std::time::Instant::now();
        let outcome = unit.execute(&CancellationToken::new()).await.unwrap();

        assert!(outcome.is_success());
        assert!(start.elapsed() >= Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_failing_outcome_unit() {
        let calls = CallCounter::new();
        let unit = FailingOutcomeUnit::new(Fail::error(7, "REJECTED", "bad input")).counted(calls.clone());

        let outcome = unit.execute(&CancellationToken::new()).await.unwrap();
        assert!(outcome.has_fail("REJECTED"));
        assert_eq!(calls.get(), 1);

        calls.reset();
        assert_eq!(calls.get(), 0);
    }
}
