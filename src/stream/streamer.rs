//! Stage streamer task.
//!
//! Drives a single analysis stage end to end: the simulated pre-request
//! latency, the POST to the stage's streaming endpoint, incremental frame
//! consumption via [`FramedRead`] backed by [`SseCodec`], buffer
//! accumulation, and guaranteed finalization. Progress is reported through
//! a tokio [`mpsc`] channel as [`StageEvent`]s.
//!
//! Transport and framing failures are absorbed here: they become a visible
//! annotation appended to the stage buffer and a structured
//! [`StageOutcome`], never an error propagated to the orchestrator.

use std::sync::Arc;

use futures_util::{StreamExt, TryStreamExt};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::codec::FramedRead;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::GlobalConfig;
use crate::models::stage::{StageKind, StageOutcome, StageResult};
use crate::stream::codec::SseCodec;
use crate::stream::frame::{parse_frame, StreamFrame};
use crate::stream::StageEvent;
use crate::{AppError, Result};

/// Request body for the synthesis stage.
///
/// Wire format: `{"legal_assessment": "<stage-2 final text>"}`.
#[derive(Debug, Serialize)]
struct SynthesisRequestBody<'a> {
    legal_assessment: &'a str,
}

/// How the streaming body of a stage ended.
enum StreamEnd {
    /// EOF, request failure, or read failure — finalization must run.
    Finished,
    /// Cancellation token fired — exit without emitting anything further.
    Cancelled,
}

/// Accumulated stage text plus the flags finalization classifies on.
struct StageBuffer {
    text: String,
    fragment_seen: bool,
    error_seen: bool,
}

impl StageBuffer {
    fn new() -> Self {
        Self {
            text: String::new(),
            fragment_seen: false,
            error_seen: false,
        }
    }

    /// Append a parsed frame, recording whether genuine content arrived.
    fn append_frame(&mut self, frame: &StreamFrame) {
        self.text.push_str(frame.content());
        if frame.is_error() {
            self.error_seen = true;
        } else {
            self.fragment_seen = true;
        }
    }

    /// Append a clearly delimited error annotation without discarding
    /// previously accumulated content.
    fn append_error_annotation(&mut self, message: &str) {
        self.error_seen = true;
        self.text.push_str("\n**Error:** ");
        self.text.push_str(message);
    }

    /// `Failed` only when an error occurred and no content fragment was
    /// ever appended; a partially streamed stage still counts as `Success`.
    fn outcome(&self) -> StageOutcome {
        if self.error_seen && !self.fragment_seen {
            StageOutcome::Failed
        } else {
            StageOutcome::Success
        }
    }
}

/// Run one analysis stage to its terminal state.
///
/// Emits [`StageEvent::Started`] immediately, then [`StageEvent::Delta`]
/// with the full accumulated buffer after every appended frame, and finally
/// [`StageEvent::Completed`] exactly once with the [`StageResult`]. The
/// caller is responsible for invoking this at most once per stage per
/// session, and only when the stage's readiness gate is open.
///
/// # Cancellation
///
/// Respects `cancel`: when the token fires the task exits without emitting
/// a completion event. The orchestrator's session-identity guard
/// independently discards anything already in flight.
///
/// # Errors
///
/// Returns `AppError::Session` when `session_id` is empty — a
/// caller-ordering bug, asserted in debug builds. Transport and framing
/// failures do not surface as errors; they are folded into the stage
/// buffer and outcome.
pub async fn run_stage(
    client: reqwest::Client,
    config: Arc<GlobalConfig>,
    session_id: String,
    stage: StageKind,
    predecessor_text: Option<String>,
    event_tx: mpsc::Sender<StageEvent>,
    cancel: CancellationToken,
) -> Result<()> {
    debug_assert!(
        !session_id.is_empty(),
        "stage started without a session; the orchestrator must gate on session arrival"
    );
    if session_id.is_empty() {
        return Err(AppError::Session("stage started without a session".into()));
    }

    let started = StageEvent::Started {
        session_id: session_id.clone(),
        stage,
        status_message: stage.status_message().to_owned(),
    };
    if event_tx.send(started).await.is_err() {
        debug!(session_id, stage = stage.slug(), "event channel closed before start");
        return Ok(());
    }

    let mut buf = StageBuffer::new();
    let end = stream_stage(
        &client,
        &config,
        &session_id,
        stage,
        predecessor_text.as_deref(),
        &event_tx,
        &cancel,
        &mut buf,
    )
    .await;

    if matches!(end, StreamEnd::Cancelled) {
        debug!(session_id, stage = stage.slug(), "stage cancelled, skipping finalization");
        return Ok(());
    }

    // Finalization: always reached on success and failure paths alike.
    let result = StageResult {
        outcome: buf.outcome(),
        text: buf.text,
    };
    info!(
        session_id,
        stage = stage.slug(),
        outcome = ?result.outcome,
        chars = result.text.len(),
        "stage finished"
    );

    let completed = StageEvent::Completed {
        session_id: session_id.clone(),
        stage,
        result,
    };
    if event_tx.send(completed).await.is_err() {
        debug!(session_id, stage = stage.slug(), "event channel closed before completion");
    }

    Ok(())
}

// ── Private helpers ───────────────────────────────────────────────────────────

/// Wait out the simulated latency, issue the request, and consume the
/// response stream into `buf`, emitting a delta after every appended frame.
#[allow(clippy::too_many_arguments)] // Internal plumbing; not part of public API width.
async fn stream_stage(
    client: &reqwest::Client,
    config: &GlobalConfig,
    session_id: &str,
    stage: StageKind,
    predecessor_text: Option<&str>,
    event_tx: &mpsc::Sender<StageEvent>,
    cancel: &CancellationToken,
    buf: &mut StageBuffer,
) -> StreamEnd {
    // Simulated "thinking" time before the request goes out.
    let delay = config.pre_request_delay();
    if !delay.is_zero() {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return StreamEnd::Cancelled,
            () = tokio::time::sleep(delay) => {}
        }
    }

    let response = match open_stream(client, config, session_id, stage, predecessor_text).await {
        Ok(response) => response,
        Err(err) => {
            warn!(session_id, stage = stage.slug(), %err, "stage request failed");
            buf.append_error_annotation(&err.to_string());
            send_delta(event_tx, session_id, stage, buf).await;
            return StreamEnd::Finished;
        }
    };

    let reader = StreamReader::new(response.bytes_stream().map_err(std::io::Error::other));
    let mut framed = FramedRead::new(reader, SseCodec::new(config.max_line_bytes));

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!(session_id, stage = stage.slug(), "stage cancelled mid-stream");
                return StreamEnd::Cancelled;
            }

            item = framed.next() => match item {
                None => break, // EOF — service closed the stream.

                Some(Ok(line)) => {
                    let Some(frame) = parse_frame(&line) else {
                        continue;
                    };
                    if frame.is_error() {
                        warn!(
                            session_id,
                            stage = stage.slug(),
                            payload = frame.content(),
                            "service emitted inline error payload"
                        );
                    }
                    buf.append_frame(&frame);
                    send_delta(event_tx, session_id, stage, buf).await;
                }

                Some(Err(err)) => {
                    warn!(session_id, stage = stage.slug(), %err, "stream read failed mid-stage");
                    buf.append_error_annotation(&err.to_string());
                    send_delta(event_tx, session_id, stage, buf).await;
                    break;
                }
            }
        }
    }

    StreamEnd::Finished
}

/// Issue the stage's POST request and verify the response status.
async fn open_stream(
    client: &reqwest::Client,
    config: &GlobalConfig,
    session_id: &str,
    stage: StageKind,
    predecessor_text: Option<&str>,
) -> Result<reqwest::Response> {
    let url = format!(
        "{}/stream_{}/{}",
        config.api_base_url,
        stage.slug(),
        session_id
    );
    debug!(%url, "issuing stage request");

    let mut request = client.post(&url);
    if stage.carries_predecessor_text() {
        request = request.json(&SynthesisRequestBody {
            legal_assessment: predecessor_text.unwrap_or_default(),
        });
    }

    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AppError::Transport(format!(
            "unexpected status {status} from {url}: {body}"
        )));
    }

    Ok(response)
}

/// Republish the full buffer so presentation can render incrementally.
async fn send_delta(
    event_tx: &mpsc::Sender<StageEvent>,
    session_id: &str,
    stage: StageKind,
    buf: &StageBuffer,
) {
    let delta = StageEvent::Delta {
        session_id: session_id.to_owned(),
        stage,
        text: buf.text.clone(),
    };
    if event_tx.send(delta).await.is_err() {
        debug!(session_id, stage = stage.slug(), "event channel closed, delta dropped");
    }
}
