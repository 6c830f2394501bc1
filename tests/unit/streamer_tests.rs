//! Unit tests for the stage streamer's failure and precondition paths.
//!
//! Happy-path streaming against a live stub service is covered by the
//! integration tests; these exercise the paths that need no server.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use lexstream::config::GlobalConfig;
use lexstream::models::stage::{StageKind, StageOutcome};
use lexstream::stream::streamer::run_stage;
use lexstream::stream::StageEvent;

fn test_config(base_url: &str) -> Arc<GlobalConfig> {
    let toml = format!(
        r#"
api_base_url = "{base_url}"
pre_request_delay_ms = 0
"#
    );
    Arc::new(GlobalConfig::from_toml_str(&toml).expect("valid test config"))
}

/// Starting a stage without a session is a caller-ordering bug and trips
/// the development assertion.
#[tokio::test]
#[should_panic(expected = "stage started without a session")]
async fn empty_session_fails_fast() {
    let (event_tx, _event_rx) = mpsc::channel(4);
    let _ = run_stage(
        reqwest::Client::new(),
        test_config("http://localhost:1"),
        String::new(),
        StageKind::Summary,
        None,
        event_tx,
        CancellationToken::new(),
    )
    .await;
}

/// A connection failure is absorbed: the stage still reaches its terminal
/// event, with the error annotation as its only text and a `Failed`
/// outcome because no content fragment ever arrived.
#[tokio::test]
async fn connection_failure_finalizes_with_failed_outcome() {
    let (event_tx, mut event_rx) = mpsc::channel(16);

    // Port 1 is never listening; the connect is refused immediately.
    run_stage(
        reqwest::Client::new(),
        test_config("http://127.0.0.1:1"),
        "S1".to_owned(),
        StageKind::Summary,
        None,
        event_tx,
        CancellationToken::new(),
    )
    .await
    .expect("transport failures must not surface as errors");

    let mut events = Vec::new();
    while let Ok(event) = event_rx.try_recv() {
        events.push(event);
    }

    assert!(
        matches!(&events[0], StageEvent::Started { session_id, stage, .. }
            if session_id == "S1" && *stage == StageKind::Summary),
        "first event must be Started"
    );

    let completed = events.last().expect("a terminal event must be emitted");
    let StageEvent::Completed { result, .. } = completed else {
        panic!("last event must be Completed, got: {completed:?}");
    };
    assert_eq!(result.outcome, StageOutcome::Failed);
    assert!(
        result.text.contains("**Error:**"),
        "annotation must be visible in the final text: {:?}",
        result.text
    );

    // Exactly one terminal event.
    let terminal_count = events
        .iter()
        .filter(|e| matches!(e, StageEvent::Completed { .. }))
        .count();
    assert_eq!(terminal_count, 1);
}

/// The placeholder status message is published with the start transition.
#[tokio::test]
async fn started_event_carries_the_stage_status_message() {
    let (event_tx, mut event_rx) = mpsc::channel(16);

    run_stage(
        reqwest::Client::new(),
        test_config("http://127.0.0.1:1"),
        "S1".to_owned(),
        StageKind::RiskAssessment,
        Some("prior text".to_owned()),
        event_tx,
        CancellationToken::new(),
    )
    .await
    .expect("must finalize");

    let first = event_rx.try_recv().expect("Started must be emitted");
    let StageEvent::Started { status_message, .. } = first else {
        panic!("expected Started, got: {first:?}");
    };
    assert_eq!(status_message, "Generating final recommendations...");
}

/// A token cancelled during the simulated latency suppresses the request
/// and the completion event entirely.
#[tokio::test]
async fn cancellation_during_latency_emits_no_completion() {
    let (event_tx, mut event_rx) = mpsc::channel(16);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let toml = r#"
api_base_url = "http://127.0.0.1:1"
pre_request_delay_ms = 50
"#;
    let config = Arc::new(GlobalConfig::from_toml_str(toml).expect("valid test config"));

    run_stage(
        reqwest::Client::new(),
        config,
        "S1".to_owned(),
        StageKind::Summary,
        None,
        event_tx,
        cancel,
    )
    .await
    .expect("cancellation is a clean exit");

    let mut events = Vec::new();
    while let Ok(event) = event_rx.try_recv() {
        events.push(event);
    }
    assert_eq!(events.len(), 1, "only Started may be emitted: {events:?}");
    assert!(matches!(events[0], StageEvent::Started { .. }));
}
