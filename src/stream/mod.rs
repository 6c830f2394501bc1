//! Stage streaming: wire decoding and per-stage request driving.
//!
//! [`codec::SseCodec`] frames the raw byte stream into records,
//! [`frame::parse_frame`] turns records into protocol frames, and
//! [`streamer::run_stage`] drives one stage end to end, emitting
//! [`StageEvent`]s through a tokio [`mpsc`](tokio::sync::mpsc) channel.

pub mod codec;
pub mod frame;
pub mod streamer;

use crate::models::stage::{StageKind, StageResult};

/// Events emitted by a running stage into the orchestrator's event channel.
///
/// Every event carries the session it was produced under so the
/// orchestrator can discard late deliveries from a replaced session.
#[derive(Debug, Clone)]
pub enum StageEvent {
    /// Stage left `Idle` and issued (or is about to issue) its request.
    Started {
        /// Session the stage belongs to.
        session_id: String,
        /// Stage that started.
        stage: StageKind,
        /// Placeholder status message shown until the first fragment.
        status_message: String,
    },
    /// A fragment was appended; `text` is the full accumulated buffer.
    Delta {
        /// Session the stage belongs to.
        session_id: String,
        /// Stage whose buffer changed.
        stage: StageKind,
        /// Full accumulated buffer after the append.
        text: String,
    },
    /// Stage reached its terminal state. Emitted exactly once per run.
    Completed {
        /// Session the stage belongs to.
        session_id: String,
        /// Stage that finished.
        stage: StageKind,
        /// Final accumulated text and outcome.
        result: StageResult,
    },
}

impl StageEvent {
    /// Session identifier the event was produced under.
    #[must_use]
    pub fn session_id(&self) -> &str {
        match self {
            Self::Started { session_id, .. }
            | Self::Delta { session_id, .. }
            | Self::Completed { session_id, .. } => session_id,
        }
    }

    /// Stage the event concerns.
    #[must_use]
    pub fn stage(&self) -> StageKind {
        match self {
            Self::Started { stage, .. }
            | Self::Delta { stage, .. }
            | Self::Completed { stage, .. } => *stage,
        }
    }
}
