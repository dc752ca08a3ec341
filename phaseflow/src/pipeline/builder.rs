//! Assembly of phases and steps, validated as they are appended.

use super::{Phase, PhaseOptions, Pipeline, Step, StepOptions};
use crate::core::FlowType;
use crate::errors::AssemblyError;
use crate::units::{UnitKey, WorkUnit};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

impl<Req, Resp> Pipeline<Req, Resp> {
    /// Appends an empty phase.
    ///
    /// # Errors
    ///
    /// `InvalidName` if `name` is blank, `DuplicateName` if a phase with the
    /// same (case-sensitive) name exists.
    pub fn append_phase(&mut self, name: &str) -> Result<&mut Self, AssemblyError> {
        self.append_phase_with(name, PhaseOptions::default())
    }

    /// Appends an empty phase with default retry settings for its steps.
    ///
    /// # Errors
    ///
    /// As [`append_phase`](Self::append_phase), plus `InvalidRetries` and
    /// `InvalidInterval` for out-of-range options.
    pub fn append_phase_with(
        &mut self,
        name: &str,
        options: PhaseOptions,
    ) -> Result<&mut Self, AssemblyError> {
        if name.trim().is_empty() {
            return Err(AssemblyError::InvalidName);
        }
        if self.phases.iter().any(|p| p.name == name) {
            return Err(AssemblyError::DuplicateName {
                name: name.to_string(),
            });
        }

        let retries = validate_retries(options.retries)?;
        let interval = validate_interval(options.retry_interval_ms)?;
        let order = u8::try_from(self.phases.len()).map_err(|_| AssemblyError::TooManyPhases)?;

        debug!(pipeline = %self.name, phase = %name, order, "Appending phase");
        self.phases
            .push(Phase::new(order, name.to_string(), retries, interval));
        Ok(self)
    }

    /// Appends a step running work unit `U` to the last phase.
    ///
    /// # Errors
    ///
    /// See [`append_step_keyed`](Self::append_step_keyed).
    pub fn append_step<U>(&mut self, options: StepOptions) -> Result<&mut Self, AssemblyError>
    where
        U: WorkUnit + 'static,
    {
        self.append_step_keyed(UnitKey::of::<U>(), options)
    }

    /// Appends a step bound to `unit` to the last phase.
    ///
    /// # Errors
    ///
    /// `InvalidRetries`/`InvalidInterval` for out-of-range options,
    /// `NoPhaseDefined` before the first phase, `DuplicateStepName` when the
    /// name collides (ignoring case) within the phase, `DuplicateWorkUnit` when
    /// the unit is already bound in the phase.
    pub fn append_step_keyed(
        &mut self,
        unit: UnitKey,
        options: StepOptions,
    ) -> Result<&mut Self, AssemblyError> {
        self.push_step(FlowType::Primary, unit, options)?;
        Ok(self)
    }

    /// Appends a step that only becomes eligible once the pipeline has
    /// switched to the rollback flow.
    ///
    /// # Errors
    ///
    /// As [`append_step_keyed`](Self::append_step_keyed).
    pub fn append_rollback_step<U>(&mut self, options: StepOptions) -> Result<&mut Self, AssemblyError>
    where
        U: WorkUnit + 'static,
    {
        self.push_step(FlowType::Rollback, UnitKey::of::<U>(), options)?;
        Ok(self)
    }

    fn push_step(
        &mut self,
        flow_type: FlowType,
        unit: UnitKey,
        options: StepOptions,
    ) -> Result<(), AssemblyError> {
        let retries = validate_retries(options.retries)?;
        let interval = validate_interval(options.retry_interval_ms)?;
        let phase = self.phases.last_mut().ok_or(AssemblyError::NoPhaseDefined)?;

        let name = options.name.filter(|n| !n.trim().is_empty());
        if let Some(ref name) = name {
            let lowered = name.to_lowercase();
            let taken = phase
                .steps
                .iter()
                .filter_map(|s| s.name.as_deref())
                .any(|existing| existing.to_lowercase() == lowered);
            if taken {
                return Err(AssemblyError::DuplicateStepName {
                    phase: phase.name.clone(),
                    name: name.clone(),
                });
            }
        }

        if phase.steps.iter().any(|s| s.unit == unit) {
            return Err(AssemblyError::DuplicateWorkUnit {
                phase: phase.name.clone(),
                unit: unit.to_string(),
            });
        }

        debug!(phase = %phase.name, unit = %unit, flow_type = %flow_type, "Appending step");
        phase
            .steps
            .push(Arc::new(Step::new(flow_type, unit, name, retries, interval)));
        Ok(())
    }
}

fn validate_retries(retries: i32) -> Result<u8, AssemblyError> {
    u8::try_from(retries).map_err(|_| AssemblyError::InvalidRetries {
        value: i64::from(retries),
    })
}

fn validate_interval(interval_ms: i64) -> Result<Duration, AssemblyError> {
    u64::try_from(interval_ms)
        .map(Duration::from_millis)
        .map_err(|_| AssemblyError::InvalidInterval { value: interval_ms })
}
