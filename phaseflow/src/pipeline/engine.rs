//! Phase-by-phase execution engine.
//!
//! Phases run strictly in order. Within a phase every eligible step is spawned
//! onto the runtime at once and the phase waits for all of them, even after one
//! has failed, so every sibling's outcome and timing is recorded. The first
//! failing phase ends the run and flips the pipeline to the rollback flow.

use super::retry::{run_with_retries, RetryPolicy};
use super::stats::PipelineStats;
use super::{Phase, Step};
use crate::cancellation::CancellationToken;
use crate::context::SharedContext;
use crate::core::{codes, FlowType, Outcome, RunState};
use crate::events::{Event, EventKind, EventSink, NoOpEventSink};
use crate::units::UnitResolver;
use futures::future::join_all;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// Per-run handle used to stamp and forward events.
#[derive(Clone)]
pub(crate) struct RunTrace {
    run_id: Uuid,
    sink: Arc<dyn EventSink>,
}

impl RunTrace {
    pub(crate) fn emit(&self, kind: EventKind, data: serde_json::Value) {
        self.sink.record(&Event::new(kind, Some(self.run_id), data));
    }
}

/// A pipeline of phases executed against a shared context.
///
/// Assemble it with [`append_phase`](Self::append_phase) and
/// [`append_step`](Self::append_step), then call [`execute`](Self::execute).
pub struct Pipeline<Req, Resp> {
    pub(crate) name: String,
    pub(crate) context: Arc<SharedContext<Req, Resp>>,
    pub(crate) resolver: Arc<dyn UnitResolver>,
    pub(crate) sink: Arc<dyn EventSink>,
    pub(crate) phases: Vec<Phase>,
    flow_type: RwLock<FlowType>,
    state: RwLock<RunState>,
}

impl<Req, Resp> Pipeline<Req, Resp> {
    /// Creates an empty pipeline.
    #[must_use]
    pub fn new(context: Arc<SharedContext<Req, Resp>>, resolver: Arc<dyn UnitResolver>) -> Self {
        Self {
            name: "pipeline".to_string(),
            context,
            resolver,
            sink: Arc::new(NoOpEventSink),
            phases: Vec::new(),
            flow_type: RwLock::new(FlowType::Primary),
            state: RwLock::new(RunState::NotStarted),
        }
    }

    /// Sets the pipeline name used in logs and events.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the shared context.
    #[must_use]
    pub const fn context(&self) -> &Arc<SharedContext<Req, Resp>> {
        &self.context
    }

    /// Returns the phases in execution order.
    #[must_use]
    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    /// Finds a phase by name.
    #[must_use]
    pub fn phase(&self, name: &str) -> Option<&Phase> {
        self.phases.iter().find(|p| p.name == name)
    }

    /// Returns the active flow type.
    #[must_use]
    pub fn flow_type(&self) -> FlowType {
        *self.flow_type.read()
    }

    /// Returns the state of the most recent run.
    #[must_use]
    pub fn state(&self) -> RunState {
        *self.state.read()
    }

    /// Computes execution statistics from the counters.
    #[must_use]
    pub fn stats(&self) -> PipelineStats {
        PipelineStats::collect(&self.phases)
    }

    /// Logs the current statistics and forwards them to the event sink.
    pub fn log_stats(&self) {
        let stats = self.stats();
        info!(
            pipeline = %self.name,
            total_time_ms = stats.total_time_ms,
            total_step_time_ms = stats.total_step_time_ms,
            performance_pct = stats.performance_pct,
            steps_executed = stats.total_steps_executed,
            retries = stats.total_retries,
            "Pipeline statistics"
        );
        let data = serde_json::to_value(&stats).unwrap_or_default();
        self.sink
            .record(&Event::new(EventKind::PipelineStats, None, data));
    }
}

impl<Req, Resp> Pipeline<Req, Resp>
where
    Req: Send + Sync + 'static,
    Resp: Clone + Send + Sync + 'static,
{
    /// Runs the pipeline with a fresh cancellation token.
    pub async fn execute(&self, request: Option<Req>) -> Outcome<Resp> {
        self.execute_with(request, Arc::new(CancellationToken::new()))
            .await
    }

    /// Runs the pipeline.
    ///
    /// `request`, when given, replaces the context's request before the first
    /// phase starts. On success the outcome wraps a copy of the context's
    /// response along with any warnings raised by the steps; on failure it
    /// carries every fail of the failing phase.
    ///
    /// Dropping the returned future (e.g. under `tokio::time::timeout`) aborts
    /// the step tasks of the phase in flight; the state is left at `Running`.
    pub async fn execute_with(
        &self,
        request: Option<Req>,
        cancel: Arc<CancellationToken>,
    ) -> Outcome<Resp> {
        let flow_type = self.flow_type();
        let trace = RunTrace {
            run_id: Uuid::new_v4(),
            sink: Arc::clone(&self.sink),
        };

        let phases: Vec<&Phase> = self
            .phases
            .iter()
            .filter(|p| p.has_eligible_steps(flow_type))
            .collect();

        if phases.is_empty() {
            warn!(pipeline = %self.name, flow_type = %flow_type, "No phases to execute");
            trace.emit(
                EventKind::PipelineRejected,
                serde_json::json!({
                    "pipeline": &self.name,
                    "flow_type": flow_type,
                }),
            );
            return Outcome::fail(codes::no_phases_defined());
        }

        if let Some(request) = request {
            self.context.set_request(request);
        }

        *self.state.write() = RunState::Running;
        let total = phases.len();
        trace!(pipeline = %self.name, flow_type = %flow_type, "Flow type: {}", flow_type);
        trace.emit(
            EventKind::PipelineStarted,
            serde_json::json!({
                "pipeline": &self.name,
                "flow_type": flow_type,
                "phases": total,
            }),
        );

        let mut warnings = Vec::new();
        for (index, phase) in phases.into_iter().enumerate() {
            if cancel.is_cancelled() {
                *self.state.write() = RunState::Aborted;
                let fail = codes::cancelled(cancel.reason().as_deref());
                warn!(pipeline = %self.name, phase = %phase.name, "Run cancelled before phase");
                trace.emit(
                    EventKind::PipelineFailed,
                    serde_json::json!({ "pipeline": &self.name, "phase": &phase.name, "fails": [&fail] }),
                );
                return Outcome::fail(fail);
            }

            trace!("Phase {}/{} {}...", index + 1, total, phase.name);
            let outcome = self.execute_phase(phase, flow_type, &cancel, &trace).await;

            if outcome.is_failure() {
                *self.flow_type.write() = FlowType::Rollback;
                *self.state.write() = RunState::Aborted;
                debug!(
                    pipeline = %self.name,
                    phase = %phase.name,
                    fails = outcome.fails.len(),
                    "Phase failed, switching to rollback flow"
                );
                trace.emit(
                    EventKind::PipelineFailed,
                    serde_json::json!({
                        "pipeline": &self.name,
                        "phase": &phase.name,
                        "fails": &outcome.fails,
                    }),
                );
                return Outcome::failure(outcome.fails);
            }
            warnings.extend(outcome.fails);
        }

        *self.state.write() = RunState::Completed;
        trace.emit(
            EventKind::PipelineCompleted,
            serde_json::json!({ "pipeline": &self.name }),
        );
        Outcome {
            response: Some(self.context.response_snapshot()),
            fails: warnings,
        }
    }

    async fn execute_phase(
        &self,
        phase: &Phase,
        flow_type: FlowType,
        cancel: &Arc<CancellationToken>,
        trace: &RunTrace,
    ) -> Outcome {
        let steps: Vec<Arc<Step>> = phase.eligible_steps(flow_type).cloned().collect();
        let total = steps.len();

        trace.emit(
            EventKind::PhaseStarted,
            serde_json::json!({ "phase": &phase.name, "order": phase.order, "steps": total }),
        );

        let started = Instant::now();
        let handles: Vec<_> = steps
            .iter()
            .enumerate()
            .map(|(index, step)| {
                trace!(
                    "Step {}/{}: {} (work unit: {})...",
                    index + 1,
                    total,
                    step.name().unwrap_or("No Name"),
                    step.unit
                );

                let step = Arc::clone(step);
                let policy = RetryPolicy::for_step(phase, &step);
                let counters = Arc::clone(&phase.counters);
                let resolver = Arc::clone(&self.resolver);
                let cancel = Arc::clone(cancel);
                let trace = trace.clone();

                tokio::spawn(async move {
                    let outcome = run_step(resolver.as_ref(), &step, policy, &cancel, &trace).await;
                    counters.add_step_executed();
                    outcome
                })
            })
            .collect();

        let _abort = AbortOnDrop(handles.iter().map(JoinHandle::abort_handle).collect());
        let joined = join_all(handles).await;
        let elapsed = started.elapsed();
        phase.counters.add_exec_time(elapsed);

        let outcomes = joined.into_iter().zip(&steps).map(|(joined, step)| {
            joined.unwrap_or_else(|e| {
                phase.counters.add_step_executed();
                Outcome::fail(codes::step_aborted(&step.unit.to_string(), &e.to_string()))
            })
        });
        let outcome = Outcome::combine(outcomes);

        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
        if outcome.is_success() {
            trace.emit(
                EventKind::PhaseCompleted,
                serde_json::json!({ "phase": &phase.name, "duration_ms": elapsed_ms }),
            );
        } else {
            trace.emit(
                EventKind::PhaseFailed,
                serde_json::json!({
                    "phase": &phase.name,
                    "duration_ms": elapsed_ms,
                    "fails": &outcome.fails,
                }),
            );
        }
        outcome
    }
}

/// Aborts a phase's step tasks if the phase is dropped before its barrier.
struct AbortOnDrop(Vec<AbortHandle>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

async fn run_step(
    resolver: &dyn UnitResolver,
    step: &Step,
    policy: RetryPolicy,
    cancel: &CancellationToken,
    trace: &RunTrace,
) -> Outcome {
    let unit_name = step.unit.to_string();

    let unit = match resolver.resolve(&step.unit) {
        Ok(unit) => unit,
        Err(e) => {
            warn!(unit = %unit_name, error = %e, "Work unit could not be resolved");
            trace.emit(
                EventKind::StepFailed,
                serde_json::json!({ "unit": &unit_name, "step": step.name(), "error": e.to_string() }),
            );
            return Outcome::fail(codes::work_unit_unresolved(&unit_name, &e.to_string()));
        }
    };

    trace.emit(
        EventKind::StepStarted,
        serde_json::json!({ "unit": &unit_name, "step": step.name() }),
    );

    let outcome = run_with_retries(unit.as_ref(), step, policy, cancel, trace).await;
    if outcome.is_success() {
        trace.emit(
            EventKind::StepCompleted,
            serde_json::json!({
                "unit": &unit_name,
                "step": step.name(),
                "exec_time_ms": step.counters.exec_time().as_secs_f64() * 1000.0,
            }),
        );
    }
    outcome
}

impl<Req, Resp> fmt::Debug for Pipeline<Req, Resp> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("phases", &self.phases)
            .field("flow_type", &self.flow_type())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
