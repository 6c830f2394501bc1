//! Pipeline orchestrator: event loop, stage task spawning, cancellation.
//!
//! Owns the [`PipelineState`], the HTTP client, and the stage event
//! channel. Stage streamer tasks run under a per-session child of the
//! orchestrator's cancellation token, so replacing the session (or tearing
//! the pipeline down) stops in-flight streams from mutating state; the
//! session-identity guard in [`PipelineState::apply`] additionally discards
//! any event that was already in flight when the session changed.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, Instrument};

use crate::config::GlobalConfig;
use crate::models::snapshot::PipelineSnapshot;
use crate::pipeline::state::{Action, PipelineState};
use crate::stream::streamer::run_stage;
use crate::stream::StageEvent;
use crate::{AppError, Result};

/// Drives the three-stage analysis pipeline for one session at a time.
pub struct PipelineOrchestrator {
    config: Arc<GlobalConfig>,
    client: reqwest::Client,
    state: PipelineState,
    event_tx: mpsc::Sender<StageEvent>,
    event_rx: mpsc::Receiver<StageEvent>,
    /// Root token — cancelled on shutdown or drop.
    cancel: CancellationToken,
    /// Child token for the current session's stage tasks.
    session_cancel: CancellationToken,
}

impl PipelineOrchestrator {
    /// Construct an inert orchestrator; no work starts until
    /// [`set_session`](Self::set_session) is called.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the HTTP client cannot be built.
    pub fn new(config: Arc<GlobalConfig>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.connect_timeout() {
            builder = builder.connect_timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|err| AppError::Config(format!("failed to build http client: {err}")))?;

        let (event_tx, event_rx) = mpsc::channel(config.event_channel_capacity);
        let cancel = CancellationToken::new();
        let session_cancel = cancel.child_token();

        Ok(Self {
            config,
            client,
            state: PipelineState::new(),
            event_tx,
            event_rx,
            cancel,
            session_cancel,
        })
    }

    /// Token presentation code can use to tear the pipeline down.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Assign (or replace) the session and start stage 1.
    ///
    /// Replacing a session mid-flight cancels the old session's stage tasks
    /// and resets all stage state atomically.
    pub fn set_session(&mut self, session_id: String) {
        // Stop the previous session's in-flight stage tasks.
        self.session_cancel.cancel();
        self.session_cancel = self.cancel.child_token();

        info!(session_id, "session assigned, starting pipeline");
        let actions = self.state.reset_for_session(session_id);
        self.dispatch(actions);
    }

    /// Receive the next stage event, or `None` on cancellation.
    pub async fn next_event(&mut self) -> Option<StageEvent> {
        tokio::select! {
            biased;

            () = self.cancel.cancelled() => {
                debug!("orchestrator cancelled while awaiting events");
                None
            }

            event = self.event_rx.recv() => event,
        }
    }

    /// Apply one event to the state machine and execute the resulting
    /// actions. Returns `true` once the pipeline has reached "all complete".
    pub fn apply(&mut self, event: StageEvent) -> bool {
        let actions = self.state.apply(event);
        self.dispatch(actions);
        self.state.all_complete()
    }

    /// Drive the event loop until every stage is terminal or the pipeline
    /// is cancelled, then return the final snapshot.
    ///
    /// # Errors
    ///
    /// Currently infallible in practice; the `Result` reserves the surface
    /// for transport-level fatal errors should the degrade-and-continue
    /// policy ever change.
    pub async fn run_until_complete(&mut self) -> Result<PipelineSnapshot> {
        while let Some(event) = self.next_event().await {
            if self.apply(event) {
                break;
            }
        }
        Ok(self.snapshot())
    }

    /// Read-only view of the current pipeline state.
    #[must_use]
    pub fn snapshot(&self) -> PipelineSnapshot {
        self.state.snapshot()
    }

    /// Cancel all in-flight work; the orchestrator becomes inert.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    // ── Private helpers ───────────────────────────────────────────────────

    /// Execute transition actions: spawn stage tasks, log completion.
    fn dispatch(&self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::StartStage {
                    session_id,
                    kind,
                    predecessor_text,
                } => {
                    debug!(session_id, stage = kind.slug(), "spawning stage task");
                    let task = run_stage(
                        self.client.clone(),
                        Arc::clone(&self.config),
                        session_id,
                        kind,
                        predecessor_text,
                        self.event_tx.clone(),
                        self.session_cancel.clone(),
                    );
                    tokio::spawn(
                        async move {
                            if let Err(err) = task.await {
                                error!(%err, "stage task aborted");
                            }
                        }
                        .instrument(info_span!("stage", slug = kind.slug())),
                    );
                }
                Action::AllComplete => {
                    info!("analysis pipeline complete");
                }
            }
        }
    }
}

impl Drop for PipelineOrchestrator {
    /// Cancel any in-flight stage tasks when the orchestrator is dropped.
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
