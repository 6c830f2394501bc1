//! Pipeline orchestration modules.
//!
//! [`state`] holds the pure three-stage state machine; [`orchestrator`]
//! wraps it with the event loop, stage task spawning, and cancellation.

pub mod orchestrator;
pub mod state;
