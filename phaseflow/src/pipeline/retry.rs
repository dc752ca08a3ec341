//! Per-step retry policy and the retry loop around work-unit invocations.

use super::engine::RunTrace;
use super::{Phase, Step};
use crate::cancellation::CancellationToken;
use crate::core::{codes, Outcome};
use crate::events::EventKind;
use crate::units::WorkUnit;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};
use tracing::{error, warn};

/// Effective retry settings for one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts allowed, including the first.
    pub max_attempts: u32,
    /// Delay between attempts.
    pub interval: Duration,
}

/// Outcome of a retry decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry(Duration),
    /// No more attempts, give up.
    GiveUp,
}

impl RetryPolicy {
    /// Resolves the policy of `step`, falling back to `phase` defaults for
    /// values the step leaves at zero.
    #[must_use]
    pub fn for_step(phase: &Phase, step: &Step) -> Self {
        let retries = if step.retries > 0 { step.retries } else { phase.retries };
        let interval = if step.retry_interval.is_zero() {
            phase.retry_interval
        } else {
            step.retry_interval
        };

        Self {
            max_attempts: 1 + u32::from(retries),
            interval,
        }
    }

    /// Decides what to do after `attempts` faulted attempts.
    #[must_use]
    pub const fn decide(&self, attempts: u32) -> RetryDecision {
        if attempts >= self.max_attempts {
            RetryDecision::GiveUp
        } else {
            RetryDecision::Retry(self.interval)
        }
    }
}

/// Invokes `unit` until it returns an outcome or the policy gives up.
///
/// Faults (`Err` or panic) are retried; any returned outcome, successful or
/// not, is final. Attempt time accumulates into the step's counters.
pub(crate) async fn run_with_retries(
    unit: &dyn WorkUnit,
    step: &Step,
    policy: RetryPolicy,
    cancel: &CancellationToken,
    trace: &RunTrace,
) -> Outcome {
    let unit_name = step.unit.to_string();
    let mut attempts: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            return Outcome::fail(codes::cancelled(cancel.reason().as_deref()));
        }

        let started = Instant::now();
        let result = AssertUnwindSafe(unit.execute(cancel)).catch_unwind().await;
        step.counters.add_exec_time(started.elapsed());

        let fault = match result {
            Ok(Ok(outcome)) => return outcome,
            Ok(Err(e)) => format!("{e:#}"),
            Err(panic) => format!("panicked: {}", panic_message(panic.as_ref())),
        };

        attempts += 1;
        error!(
            step = %step.label(),
            unit = %unit_name,
            attempt = attempts,
            max_attempts = policy.max_attempts,
            error = %fault,
            "Work unit faulted"
        );

        match policy.decide(attempts) {
            RetryDecision::GiveUp => {
                trace.emit(
                    EventKind::StepFailed,
                    serde_json::json!({
                        "unit": &unit_name,
                        "step": step.name(),
                        "attempts": attempts,
                        "error": &fault,
                    }),
                );
                return Outcome::fail(codes::work_unit_failed(&unit_name));
            }
            RetryDecision::Retry(delay) => {
                step.counters.add_retry();
                trace.emit(
                    EventKind::StepRetrying,
                    serde_json::json!({
                        "unit": &unit_name,
                        "attempt": attempts,
                        "delay_ms": u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "error": &fault,
                    }),
                );

                if !delay.is_zero() && !cancel.sleep(delay).await {
                    warn!(unit = %unit_name, "Retry delay interrupted by cancellation");
                    return Outcome::fail(codes::cancelled(cancel.reason().as_deref()));
                }
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
