//! Execution statistics derived from phase and step counters.

use super::Phase;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Counters of a single phase.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseStats {
    /// Phase name.
    pub name: String,
    /// Phase order.
    pub order: u8,
    /// Wall-clock time spent in the phase.
    pub exec_time_ms: f64,
    /// Sum of the step execution times.
    pub step_time_ms: f64,
    /// Steps launched.
    pub steps_executed: u32,
    /// Retries performed by the phase's steps.
    pub retries: u32,
}

/// Statistics over every phase of a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineStats {
    /// Per-phase figures, in phase order.
    pub phases: Vec<PhaseStats>,
    /// Steps launched across all phases.
    pub total_steps_executed: u32,
    /// Retries across all steps.
    pub total_retries: u32,
    /// Summed phase wall-clock time.
    pub total_time_ms: f64,
    /// Summed step execution time.
    pub total_step_time_ms: f64,
    /// `total_step_time_ms / total_time_ms` as a percentage; 0 when no phase time was recorded.
    pub performance_pct: f64,
}

impl PipelineStats {
    pub(crate) fn collect(phases: &[Phase]) -> Self {
        let phases: Vec<PhaseStats> = phases
            .iter()
            .map(|phase| {
                let step_time: Duration = phase
                    .steps
                    .iter()
                    .map(|s| s.counters.exec_time())
                    .sum();
                PhaseStats {
                    name: phase.name.clone(),
                    order: phase.order,
                    exec_time_ms: as_ms(phase.counters.exec_time()),
                    step_time_ms: as_ms(step_time),
                    steps_executed: phase.counters.steps_executed(),
                    retries: phase.steps.iter().map(|s| s.counters.retries()).sum(),
                }
            })
            .collect();

        let total_time_ms: f64 = phases.iter().map(|p| p.exec_time_ms).sum();
        let total_step_time_ms: f64 = phases.iter().map(|p| p.step_time_ms).sum();
        let performance_pct = if total_time_ms == 0.0 {
            0.0
        } else {
            total_step_time_ms / total_time_ms * 100.0
        };

        Self {
            total_steps_executed: phases.iter().map(|p| p.steps_executed).sum(),
            total_retries: phases.iter().map(|p| p.retries).sum(),
            total_time_ms,
            total_step_time_ms,
            performance_pct,
            phases,
        }
    }
}

impl fmt::Display for PipelineStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Pipeline statistics:")?;
        writeln!(
            f,
            "Exec Time: Pipeline (Steps) {:.0} ms ({:.0} ms). Performance: {:.2}%",
            self.total_time_ms, self.total_step_time_ms, self.performance_pct
        )?;
        write!(
            f,
            "Steps - Executed (Retries): {} ({})",
            self.total_steps_executed, self.total_retries
        )
    }
}

fn as_ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}
