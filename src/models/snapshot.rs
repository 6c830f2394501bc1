//! Read-only pipeline snapshots exposed to presentation code.

use serde::Serialize;

use crate::models::stage::{StageKind, StageStatus};

/// Point-in-time view of a single stage.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct StageSnapshot {
    /// Stage identity.
    pub kind: StageKind,
    /// Current lifecycle status.
    pub status: StageStatus,
    /// Accumulated text streamed so far (final text once terminal).
    pub text: String,
}

/// Point-in-time view of the whole pipeline.
///
/// Snapshots are the only surface presentation code reads; all mutation
/// happens inside the orchestrator's transition function.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct PipelineSnapshot {
    /// Session the snapshot belongs to, if one has been assigned.
    pub session_id: Option<String>,
    /// Per-stage views in pipeline order.
    pub stages: Vec<StageSnapshot>,
    /// Fraction of stages in a terminal state, in `[0, 1]`.
    pub progress: f64,
    /// Whether all stages have reached a terminal state.
    pub all_complete: bool,
}
