//! Context shared across the steps of a pipeline.
//!
//! This module provides:
//! - The request/response context handed to every work unit
//! - A write-once side channel for passing data between steps

mod shared;
mod side_channel;

pub use shared::SharedContext;
pub use side_channel::SideChannel;
