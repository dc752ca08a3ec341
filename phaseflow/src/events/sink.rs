//! Where pipeline events go.

use super::{Event, EventKind};
use parking_lot::RwLock;
use tracing::{debug, info, trace, Level};
use uuid::Uuid;

/// Receives the events of every run.
///
/// `record` is called synchronously from inside step tasks, so it has to be
/// quick and must not panic.
pub trait EventSink: Send + Sync {
    /// Records one event.
    fn record(&self, event: &Event);
}

/// Discards everything. The default sink of a pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

impl EventSink for NoOpEventSink {
    fn record(&self, _event: &Event) {}
}

/// Writes each event to `tracing` as one record with `event` and `run_id` fields.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self::new(Level::INFO)
    }
}

impl LoggingEventSink {
    /// Logs at `level`. Anything above `INFO` is logged at `INFO`.
    #[must_use]
    pub const fn new(level: Level) -> Self {
        Self { level }
    }

    /// Logs at `DEBUG`.
    #[must_use]
    pub const fn debug() -> Self {
        Self::new(Level::DEBUG)
    }
}

impl EventSink for LoggingEventSink {
    fn record(&self, event: &Event) {
        let run_id = event.run_id.map(|id| id.to_string()).unwrap_or_default();
        let kind = event.kind.as_str();
        let data = &event.data;
        if self.level == Level::TRACE {
            trace!(event = kind, run_id = %run_id, data = %data, "pipeline event");
        } else if self.level == Level::DEBUG {
            debug!(event = kind, run_id = %run_id, data = %data, "pipeline event");
        } else {
            info!(event = kind, run_id = %run_id, data = %data, "pipeline event");
        }
    }
}

/// Keeps every event in memory, in emission order.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: RwLock<Vec<Event>>,
}

impl CollectingEventSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of everything recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.events.read().clone()
    }

    /// The kinds recorded so far.
    #[must_use]
    pub fn kinds(&self) -> Vec<EventKind> {
        self.events.read().iter().map(|e| e.kind).collect()
    }

    /// Events of one kind.
    #[must_use]
    pub fn of_kind(&self, kind: EventKind) -> Vec<Event> {
        self.events
            .read()
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }

    /// Events emitted by one run.
    #[must_use]
    pub fn of_run(&self, run_id: Uuid) -> Vec<Event> {
        self.events
            .read()
            .iter()
            .filter(|e| e.run_id == Some(run_id))
            .cloned()
            .collect()
    }

    /// Distinct run ids, in the order the runs first reported.
    #[must_use]
    pub fn run_ids(&self) -> Vec<Uuid> {
        let mut ids = Vec::new();
        for id in self.events.read().iter().filter_map(|e| e.run_id) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }

    /// Number of events recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// True before the first event.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Forgets everything recorded so far.
    pub fn clear(&self) {
        self.events.write().clear();
    }
}

impl EventSink for CollectingEventSink {
    fn record(&self, event: &Event) {
        self.events.write().push(event.clone());
    }
}
