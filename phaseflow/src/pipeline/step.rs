//! Steps: the smallest schedulable unit of a pipeline.

use crate::core::FlowType;
use crate::units::UnitKey;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

/// Options accepted when appending a step.
///
/// Retry values are validated when the step is appended; zero means "use the
/// phase default".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepOptions {
    /// Optional step name, unique (ignoring case) within its phase.
    pub name: Option<String>,
    /// Retries after the first attempt.
    pub retries: i32,
    /// Delay between attempts, in milliseconds.
    pub retry_interval_ms: i64,
}

impl StepOptions {
    /// Creates default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the step name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the retry count.
    #[must_use]
    pub const fn with_retries(mut self, retries: i32) -> Self {
        self.retries = retries;
        self
    }

    /// Sets the retry interval.
    #[must_use]
    pub const fn with_retry_interval_ms(mut self, interval: i64) -> Self {
        self.retry_interval_ms = interval;
        self
    }
}

/// Execution counters of a step, accumulated across runs.
#[derive(Debug, Default)]
pub struct StepCounters {
    exec_time_us: AtomicU64,
    retries: AtomicU32,
}

impl StepCounters {
    /// Time spent inside the work unit, summed over attempts.
    #[must_use]
    pub fn exec_time(&self) -> Duration {
        Duration::from_micros(self.exec_time_us.load(Ordering::Relaxed))
    }

    /// Number of retries performed.
    #[must_use]
    pub fn retries(&self) -> u32 {
        self.retries.load(Ordering::Relaxed)
    }

    pub(crate) fn add_exec_time(&self, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.exec_time_us.fetch_add(micros, Ordering::Relaxed);
    }

    pub(crate) fn add_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }
}

/// A step bound to one work unit.
///
/// Everything but the counters is fixed once the step is appended.
#[derive(Debug)]
pub struct Step {
    pub(crate) flow_type: FlowType,
    pub(crate) unit: UnitKey,
    pub(crate) name: Option<String>,
    pub(crate) retries: u8,
    pub(crate) retry_interval: Duration,
    pub(crate) counters: StepCounters,
}

impl Step {
    pub(crate) fn new(
        flow_type: FlowType,
        unit: UnitKey,
        name: Option<String>,
        retries: u8,
        retry_interval: Duration,
    ) -> Self {
        Self {
            flow_type,
            unit,
            name,
            retries,
            retry_interval,
            counters: StepCounters::default(),
        }
    }

    /// The flow type that makes this step eligible.
    #[must_use]
    pub const fn flow_type(&self) -> FlowType {
        self.flow_type
    }

    /// The work unit identity.
    #[must_use]
    pub const fn unit(&self) -> &UnitKey {
        &self.unit
    }

    /// The step name, if one was given.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Step-level retry override (0 = phase default).
    #[must_use]
    pub const fn retries(&self) -> u8 {
        self.retries
    }

    /// Step-level retry interval override (zero = phase default).
    #[must_use]
    pub const fn retry_interval(&self) -> Duration {
        self.retry_interval
    }

    /// Execution counters.
    #[must_use]
    pub const fn counters(&self) -> &StepCounters {
        &self.counters
    }

    /// Name used in logs: the step name, or the work unit otherwise.
    #[must_use]
    pub fn label(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.unit.to_string())
    }
}
