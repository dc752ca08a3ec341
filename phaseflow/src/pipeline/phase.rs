//! Phases: ordered groups of steps run behind one barrier.

use super::Step;
use crate::core::FlowType;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Options accepted when appending a phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseOptions {
    /// Default retries for steps that do not override them.
    pub retries: i32,
    /// Default retry interval in milliseconds.
    pub retry_interval_ms: i64,
}

impl PhaseOptions {
    /// Creates default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default retry count.
    #[must_use]
    pub const fn with_retries(mut self, retries: i32) -> Self {
        self.retries = retries;
        self
    }

    /// Sets the default retry interval.
    #[must_use]
    pub const fn with_retry_interval_ms(mut self, interval: i64) -> Self {
        self.retry_interval_ms = interval;
        self
    }
}

/// Execution counters of a phase, accumulated across runs.
#[derive(Debug, Default)]
pub struct PhaseCounters {
    exec_time_us: AtomicU64,
    steps_executed: AtomicU32,
}

impl PhaseCounters {
    /// Wall-clock time spent in the phase.
    #[must_use]
    pub fn exec_time(&self) -> Duration {
        Duration::from_micros(self.exec_time_us.load(Ordering::Relaxed))
    }

    /// Steps launched, counted once per step regardless of retries.
    #[must_use]
    pub fn steps_executed(&self) -> u32 {
        self.steps_executed.load(Ordering::Relaxed)
    }

    pub(crate) fn add_exec_time(&self, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.exec_time_us.fetch_add(micros, Ordering::Relaxed);
    }

    pub(crate) fn add_step_executed(&self) {
        self.steps_executed.fetch_add(1, Ordering::Relaxed);
    }
}

/// An ordered group of steps.
#[derive(Debug)]
pub struct Phase {
    pub(crate) order: u8,
    pub(crate) name: String,
    pub(crate) steps: Vec<Arc<Step>>,
    pub(crate) retries: u8,
    pub(crate) retry_interval: Duration,
    pub(crate) counters: Arc<PhaseCounters>,
}

impl Phase {
    pub(crate) fn new(order: u8, name: String, retries: u8, retry_interval: Duration) -> Self {
        Self {
            order,
            name,
            steps: Vec::new(),
            retries,
            retry_interval,
            counters: Arc::new(PhaseCounters::default()),
        }
    }

    /// Position in the pipeline.
    #[must_use]
    pub const fn order(&self) -> u8 {
        self.order
    }

    /// Phase name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All steps, in append order.
    #[must_use]
    pub fn steps(&self) -> &[Arc<Step>] {
        &self.steps
    }

    /// Default retries for contained steps.
    #[must_use]
    pub const fn retries(&self) -> u8 {
        self.retries
    }

    /// Default retry interval for contained steps.
    #[must_use]
    pub const fn retry_interval(&self) -> Duration {
        self.retry_interval
    }

    /// Execution counters.
    #[must_use]
    pub fn counters(&self) -> &PhaseCounters {
        &self.counters
    }

    /// Steps eligible under `flow_type`, in append order.
    pub fn eligible_steps(&self, flow_type: FlowType) -> impl Iterator<Item = &Arc<Step>> {
        self.steps.iter().filter(move |s| s.flow_type == flow_type)
    }

    /// Returns true if at least one step is eligible under `flow_type`.
    #[must_use]
    pub fn has_eligible_steps(&self, flow_type: FlowType) -> bool {
        self.eligible_steps(flow_type).next().is_some()
    }
}
