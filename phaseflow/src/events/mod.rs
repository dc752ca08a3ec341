//! Pipeline events.
//!
//! The engine reports run, phase and step progress as typed [`Event`]s to an
//! [`EventSink`]. Every event raised during a run carries that run's id and the
//! time it was emitted.

mod kind;
mod sink;

pub use kind::{Event, EventKind};
pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
