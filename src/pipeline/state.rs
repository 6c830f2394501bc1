//! Pure pipeline state machine.
//!
//! All pipeline state lives here and is mutated only through
//! [`PipelineState::reset_for_session`] and [`PipelineState::apply`]. The
//! transition function returns [`Action`]s for the orchestrator to execute;
//! it performs no I/O itself, which keeps every ordering and race-safety
//! property checkable with plain synchronous tests.

use tracing::{debug, info, warn};

use crate::models::snapshot::{PipelineSnapshot, StageSnapshot};
use crate::models::stage::{StageKind, StageResult, StageStatus};
use crate::stream::StageEvent;

/// Follow-up work a state transition demands from the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Start the given stage's streamer task.
    StartStage {
        /// Session the stage run belongs to.
        session_id: String,
        /// Stage to start.
        kind: StageKind,
        /// Predecessor's final text, attached only for the synthesis stage.
        predecessor_text: Option<String>,
    },
    /// All three stages reached a terminal state. Raised exactly once
    /// per session.
    AllComplete,
}

/// Per-stage slot owned by the state machine.
#[derive(Debug, Clone)]
struct StageSlot {
    kind: StageKind,
    status: StageStatus,
    text: String,
    result: Option<StageResult>,
}

impl StageSlot {
    fn idle(kind: StageKind) -> Self {
        Self {
            kind,
            status: StageStatus::Idle,
            text: String::new(),
            result: None,
        }
    }
}

/// State machine over the three analysis stages.
///
/// Inert until a session identifier is assigned. Events carrying a session
/// id other than the current one are discarded wholesale, so a replaced
/// session's in-flight stage can never write stale state.
#[derive(Debug)]
pub struct PipelineState {
    session_id: Option<String>,
    stages: [StageSlot; StageKind::COUNT],
    all_complete: bool,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineState {
    /// Construct an inert state machine with all stages `Idle`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            session_id: None,
            stages: [
                StageSlot::idle(StageKind::Summary),
                StageSlot::idle(StageKind::LegalAssessment),
                StageSlot::idle(StageKind::RiskAssessment),
            ],
            all_complete: false,
        }
    }

    /// Assign (or replace) the session and reset all stage state atomically.
    ///
    /// Returns the action starting stage 1 — session arrival is its
    /// readiness gate. Replacing the session mid-flight discards the old
    /// session entirely; late events for it are dropped by [`Self::apply`].
    pub fn reset_for_session(&mut self, session_id: String) -> Vec<Action> {
        debug_assert!(!session_id.is_empty(), "session identifier must not be empty");

        if let Some(ref old) = self.session_id {
            info!(old_session = %old, new_session = %session_id, "session replaced, resetting pipeline");
        }

        for slot in &mut self.stages {
            *slot = StageSlot::idle(slot.kind);
        }
        self.all_complete = false;
        self.session_id = Some(session_id.clone());

        vec![Action::StartStage {
            session_id,
            kind: StageKind::Summary,
            predecessor_text: None,
        }]
    }

    /// Apply one stage event and return the follow-up actions.
    ///
    /// Stale events (wrong session id) and events arriving after the
    /// pipeline reached its terminal state produce no observable effect.
    pub fn apply(&mut self, event: StageEvent) -> Vec<Action> {
        let Some(ref current) = self.session_id else {
            warn!(stage = event.stage().slug(), "event received before any session, discarding");
            return Vec::new();
        };
        if current != event.session_id() {
            debug!(
                event_session = event.session_id(),
                current_session = %current,
                stage = event.stage().slug(),
                "stale event from replaced session, discarding"
            );
            return Vec::new();
        }
        if self.all_complete {
            debug!(stage = event.stage().slug(), "event after pipeline completion, discarding");
            return Vec::new();
        }

        match event {
            StageEvent::Started { stage, .. } => {
                self.stages[stage.index()].status = StageStatus::Streaming;
                Vec::new()
            }
            StageEvent::Delta { stage, text, .. } => {
                let slot = &mut self.stages[stage.index()];
                if slot.status.is_terminal() {
                    debug!(stage = stage.slug(), "delta after terminal status, discarding");
                } else {
                    slot.text = text;
                }
                Vec::new()
            }
            StageEvent::Completed { stage, result, .. } => self.complete_stage(stage, result),
        }
    }

    /// Read-only view for presentation.
    #[must_use]
    pub fn snapshot(&self) -> PipelineSnapshot {
        PipelineSnapshot {
            session_id: self.session_id.clone(),
            stages: self
                .stages
                .iter()
                .map(|slot| StageSnapshot {
                    kind: slot.kind,
                    status: slot.status,
                    text: slot.text.clone(),
                })
                .collect(),
            progress: self.progress(),
            all_complete: self.all_complete,
        }
    }

    /// Fraction of stages in a terminal state: `{0, 1/3, 2/3, 1}`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // Numerator is at most 3.
    pub fn progress(&self) -> f64 {
        self.terminal_count() as f64 / StageKind::COUNT as f64
    }

    /// Whether every stage has reached a terminal state.
    #[must_use]
    pub fn all_complete(&self) -> bool {
        self.all_complete
    }

    /// The current session identifier, if one has been assigned.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// The final result recorded for a stage, if it reached terminal state.
    #[must_use]
    pub fn stage_result(&self, kind: StageKind) -> Option<&StageResult> {
        self.stages[kind.index()].result.as_ref()
    }

    // ── Private helpers ───────────────────────────────────────────────────

    /// Record a stage's terminal result and gate its successor.
    fn complete_stage(&mut self, stage: StageKind, result: StageResult) -> Vec<Action> {
        let status = result.status();
        let slot = &mut self.stages[stage.index()];
        slot.text = result.text.clone();
        slot.status = status;
        slot.result = Some(result);

        info!(
            stage = stage.slug(),
            status = ?status,
            progress = self.progress(),
            "stage reached terminal state"
        );

        let mut actions = Vec::new();

        if let Some(next) = stage.successor() {
            // Readiness flips synchronously inside this transition, so the
            // successor can never start before this completion is recorded.
            let predecessor_text = next.carries_predecessor_text().then(|| {
                self.stages[StageKind::LegalAssessment.index()]
                    .text
                    .clone()
            });
            let session_id = self.session_id.clone().unwrap_or_default();
            actions.push(Action::StartStage {
                session_id,
                kind: next,
                predecessor_text,
            });
        }

        if self.terminal_count() == StageKind::COUNT {
            self.all_complete = true;
            actions.push(Action::AllComplete);
        }

        actions
    }

    fn terminal_count(&self) -> usize {
        self.stages
            .iter()
            .filter(|slot| slot.status.is_terminal())
            .count()
    }
}
