//! The events a pipeline reports while it runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Every event the engine emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// A run passed the guard and is about to enter its first phase.
    #[serde(rename = "pipeline.started")]
    PipelineStarted,
    /// Every eligible phase succeeded.
    #[serde(rename = "pipeline.completed")]
    PipelineCompleted,
    /// A phase failed or the run was cancelled at a phase boundary.
    #[serde(rename = "pipeline.failed")]
    PipelineFailed,
    /// No phase had a step eligible for the active flow type.
    #[serde(rename = "pipeline.rejected")]
    PipelineRejected,
    /// Statistics were reported through `Pipeline::log_stats`.
    #[serde(rename = "pipeline.stats")]
    PipelineStats,
    /// A phase launched its steps.
    #[serde(rename = "phase.started")]
    PhaseStarted,
    /// All steps of a phase succeeded.
    #[serde(rename = "phase.completed")]
    PhaseCompleted,
    /// At least one step of a phase failed.
    #[serde(rename = "phase.failed")]
    PhaseFailed,
    /// A work unit was resolved and is about to run.
    #[serde(rename = "step.started")]
    StepStarted,
    /// A faulted attempt will be retried.
    #[serde(rename = "step.retrying")]
    StepRetrying,
    /// A step gave up, or its work unit could not be resolved.
    #[serde(rename = "step.failed")]
    StepFailed,
    /// A step returned a successful outcome.
    #[serde(rename = "step.completed")]
    StepCompleted,
}

impl EventKind {
    /// All kinds, grouped by scope.
    pub const ALL: [Self; 12] = [
        Self::PipelineStarted,
        Self::PipelineCompleted,
        Self::PipelineFailed,
        Self::PipelineRejected,
        Self::PipelineStats,
        Self::PhaseStarted,
        Self::PhaseCompleted,
        Self::PhaseFailed,
        Self::StepStarted,
        Self::StepRetrying,
        Self::StepFailed,
        Self::StepCompleted,
    ];

    /// Dotted event name, e.g. `"step.retrying"`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PipelineStarted => "pipeline.started",
            Self::PipelineCompleted => "pipeline.completed",
            Self::PipelineFailed => "pipeline.failed",
            Self::PipelineRejected => "pipeline.rejected",
            Self::PipelineStats => "pipeline.stats",
            Self::PhaseStarted => "phase.started",
            Self::PhaseCompleted => "phase.completed",
            Self::PhaseFailed => "phase.failed",
            Self::StepStarted => "step.started",
            Self::StepRetrying => "step.retrying",
            Self::StepFailed => "step.failed",
            Self::StepCompleted => "step.completed",
        }
    }

    /// The part before the dot: `pipeline`, `phase` or `step`.
    #[must_use]
    pub fn scope(self) -> &'static str {
        let name = self.as_str();
        name.split_once('.').map_or(name, |(scope, _)| scope)
    }

    /// Looks a kind up by its dotted name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One emitted event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    /// What happened.
    #[serde(rename = "event")]
    pub kind: EventKind,
    /// The run that emitted it; `None` for events raised outside a run.
    pub run_id: Option<Uuid>,
    /// When it was emitted.
    pub timestamp: DateTime<Utc>,
    /// Event-specific fields.
    pub data: serde_json::Value,
}

impl Event {
    pub(crate) fn new(kind: EventKind, run_id: Option<Uuid>, data: serde_json::Value) -> Self {
        Self {
            kind,
            run_id,
            timestamp: Utc::now(),
            data,
        }
    }

    /// Returns a field of `data`.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&serde_json::Value> {
        self.data.get(field)
    }

    /// Flattens the event into one JSON object: `data` plus `event`, `run_id`
    /// and an RFC 3339 `timestamp`.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut object = match &self.data {
            serde_json::Value::Object(map) => map.clone(),
            serde_json::Value::Null => serde_json::Map::new(),
            other => {
                let mut map = serde_json::Map::new();
                map.insert("data".to_string(), other.clone());
                map
            }
        };
        object.insert("event".to_string(), self.kind.as_str().into());
        object.insert(
            "run_id".to_string(),
            self.run_id
                .map_or(serde_json::Value::Null, |id| id.to_string().into()),
        );
        object.insert("timestamp".to_string(), self.timestamp.to_rfc3339().into());
        serde_json::Value::Object(object)
    }
}
