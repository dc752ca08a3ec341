//! # Phaseflow
//!
//! A phased pipeline engine for request processing.
//!
//! A pipeline is an ordered list of phases. Phases run strictly one after
//! another; the steps inside a phase run concurrently and the phase waits for
//! all of them before the next one starts. Phaseflow provides:
//!
//! - **Phase/step assembly**: validated as it is built, so a pipeline is
//!   structurally sound before it runs
//! - **Shared context**: typed request/response slots plus a write-once side channel
//! - **Per-step retries**: step settings override phase defaults
//! - **Outcomes**: success/failure values carrying severity-tagged fails
//! - **Rollback flow**: the first failing phase switches later runs to rollback steps
//! - **Cancellation**: one token observed at phase boundaries, attempts and retry delays
//! - **Statistics and events**: counters, a performance ratio and an event sink
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use phaseflow::prelude::*;
//! use std::sync::Arc;
//!
//! let registry = Arc::new(UnitRegistry::new());
//! registry.register(|| LoadUser);
//! registry.register(|| RenderPage);
//!
//! let context = Arc::new(SharedContext::new(Request::default(), Response::default()));
//! let mut pipeline = Pipeline::new(context, registry);
//! pipeline
//!     .append_phase("load")?
//!     .append_step::<LoadUser>(StepOptions::new().with_retries(2))?
//!     .append_phase("render")?
//!     .append_step::<RenderPage>(StepOptions::new())?;
//!
//! let outcome = pipeline.execute(Some(request)).await;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod context;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod testing;
pub mod units;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::context::{SharedContext, SideChannel};
    pub use crate::core::{codes, Fail, FailLevel, FailList, FlowType, Outcome, RunState};
    pub use crate::errors::{AssemblyError, ResolveError, SideChannelError};
    pub use crate::events::{
        CollectingEventSink, Event, EventKind, EventSink, LoggingEventSink, NoOpEventSink,
    };
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::pipeline::{
        PhaseOptions, Pipeline, PipelineStats, RetryPolicy, StepOptions,
    };
    pub use crate::units::{FnUnit, UnitKey, UnitRegistry, UnitResolver, WorkUnit};
}
