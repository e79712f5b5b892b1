use pretty_assertions::assert_eq;
use quill_session::{
    cancel_pair, FailureKind, PollerConfig, RecoveryPoller, SessionCoordinator, SessionId,
    SessionPhase, StageId, StageStatus, StatusResponse, TransportError,
};
use quill_test_utils::{
    self as fixtures, ScriptedEventSource, ScriptedStatusEndpoint, Step,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn coordinator(endpoint: Arc<ScriptedStatusEndpoint>) -> SessionCoordinator {
    let poller = RecoveryPoller::new(endpoint, PollerConfig::new(5, Duration::from_secs(1)));
    SessionCoordinator::new(SessionId::new("sess"), poller)
}

#[tokio::test]
async fn test_full_stream_reaches_completed() {
    let endpoint = Arc::new(ScriptedStatusEndpoint::always_pending());
    let mut c = coordinator(endpoint.clone());
    let source = ScriptedEventSource::frames(fixtures::two_stage_run(
        "The cat sat",
        "The black cat sat down",
    ));
    let (_trigger, mut cancel) = cancel_pair();

    let phase = c.run(&source, &mut cancel).await;

    assert_eq!(phase, SessionPhase::Completed);
    assert_eq!(endpoint.calls(), 0);
    let state = c.state();
    assert_eq!(state.terminal_result().unwrap().document, "The black cat sat down");
    assert_eq!(state.output(&StageId::new("draft")), Some("The cat sat"));
    assert_eq!(
        state.stage(&StageId::new("polish")).unwrap().status,
        StageStatus::Complete
    );
    assert_eq!(state.progress().completed, 2);
}

#[tokio::test]
async fn test_frames_after_terminal_are_ignored() {
    let endpoint = Arc::new(ScriptedStatusEndpoint::always_pending());
    let mut c = coordinator(endpoint);

    assert!(c.ingest_frame(&fixtures::stage_start("a", "A")));
    assert!(c.ingest_frame(&fixtures::complete("done", json!({}))));
    let frozen = c.state().clone();

    assert!(!c.ingest_frame(&fixtures::stage_chunk("late")));
    assert!(!c.ingest_frame(&fixtures::error("late failure")));
    assert!(!c.ingest_frame(&fixtures::stage_complete("a", "other")));

    assert_eq!(*c.state(), frozen);
    assert_eq!(c.phase(), SessionPhase::Completed);
}

#[tokio::test]
async fn test_malformed_frames_do_not_change_state() {
    let endpoint = Arc::new(ScriptedStatusEndpoint::always_pending());
    let mut c = coordinator(endpoint);
    c.ingest_frame(&fixtures::stage_start("a", "A"));
    let before = c.state().clone();

    for frame in [
        "not json",
        r#"{"no":"type"}"#,
        r#"{"type":"stage-teleport","stageId":"a"}"#,
        r#"{"type":"stage-chunk","text":42}"#,
        r#"{"type":"stage-start"}"#,
    ] {
        assert!(!c.ingest_frame(frame), "frame {frame} should be dropped");
    }

    assert_eq!(*c.state(), before);
    assert_eq!(c.stats().events_dropped, 5);
}

#[tokio::test]
async fn test_chunks_accumulate_until_next_stage() {
    let endpoint = Arc::new(ScriptedStatusEndpoint::always_pending());
    let mut c = coordinator(endpoint);

    c.ingest_frame(&fixtures::stage_start("a", "A"));
    c.ingest_frame(&fixtures::stage_chunk("Hel"));
    c.ingest_frame(&fixtures::stage_chunk("lo"));
    assert_eq!(c.state().chunk_buffer(), "Hello");

    c.ingest_frame(&fixtures::stage_start("b", "B"));
    assert_eq!(c.state().chunk_buffer(), "");
    assert_eq!(c.state().current_stage(), Some(&StageId::new("b")));
}

#[tokio::test]
async fn test_stream_error_event_fails_without_polling() {
    let endpoint = Arc::new(ScriptedStatusEndpoint::always_pending());
    let mut c = coordinator(endpoint.clone());
    let source = ScriptedEventSource::frames([
        fixtures::stage_start("a", "A"),
        fixtures::error("model overloaded"),
        fixtures::stage_chunk("never applied"),
    ]);
    let (_trigger, mut cancel) = cancel_pair();

    assert_eq!(c.run(&source, &mut cancel).await, SessionPhase::Failed);
    assert_eq!(endpoint.calls(), 0);
    let state = c.state();
    let error = state.terminal_error().unwrap();
    assert_eq!(error.kind, FailureKind::Pipeline);
    assert_eq!(error.message, "model overloaded");
    assert_eq!(state.chunk_buffer(), "");
}

#[tokio::test(start_paused = true)]
async fn test_dropped_stream_recovers_through_polling() {
    let endpoint = Arc::new(ScriptedStatusEndpoint::pending_then(
        2,
        StatusResponse::completed("recovered doc", json!({ "source": "status" })),
    ));
    let mut c = coordinator(endpoint.clone());
    let source = ScriptedEventSource::new(vec![
        Step::Frame(fixtures::pipeline_info(&[("a", "A"), ("b", "B")])),
        Step::Frame(fixtures::stage_start("a", "A")),
        Step::Frame(fixtures::stage_chunk("partial")),
        Step::Fail(TransportError::Interrupted("connection reset".into())),
    ]);
    let mut phases = c.subscribe();
    let (_trigger, mut cancel) = cancel_pair();

    let phase = c.run(&source, &mut cancel).await;

    assert_eq!(phase, SessionPhase::Completed);
    assert_eq!(endpoint.calls(), 3);
    assert_eq!(c.stats().poll_attempts, 3);
    assert!(phases.has_changed().unwrap());
    let state = phases.borrow_and_update();
    assert_eq!(state.terminal_result().unwrap().document, "recovered doc");
    // partial stream data survives recovery
    assert_eq!(state.manifest().len(), 2);
    assert_eq!(state.chunk_buffer(), "partial");
}

#[tokio::test(start_paused = true)]
async fn test_clean_end_of_stream_without_terminal_recovers() {
    let endpoint = Arc::new(ScriptedStatusEndpoint::pending_then(
        0,
        StatusResponse::error("pipeline crashed"),
    ));
    let mut c = coordinator(endpoint);
    let source = ScriptedEventSource::frames([fixtures::stage_start("a", "A")]);
    let (_trigger, mut cancel) = cancel_pair();

    assert_eq!(c.run(&source, &mut cancel).await, SessionPhase::Failed);
    assert_eq!(c.state().terminal_error().unwrap().message, "pipeline crashed");
}

#[tokio::test(start_paused = true)]
async fn test_refused_subscription_recovers() {
    let endpoint = Arc::new(ScriptedStatusEndpoint::pending_then(
        1,
        StatusResponse::completed("doc", json!(null)),
    ));
    let mut c = coordinator(endpoint);
    let source = ScriptedEventSource::refusing(TransportError::Connect("refused".into()));
    let (_trigger, mut cancel) = cancel_pair();

    assert_eq!(c.run(&source, &mut cancel).await, SessionPhase::Completed);
    assert_eq!(source.subscriptions(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_recovery_budget_exhausted_fails() {
    let endpoint = Arc::new(ScriptedStatusEndpoint::always_pending());
    let mut c = coordinator(endpoint.clone());
    let source = ScriptedEventSource::new(vec![Step::Fail(TransportError::Closed)]);
    let (_trigger, mut cancel) = cancel_pair();

    assert_eq!(c.run(&source, &mut cancel).await, SessionPhase::Failed);
    assert_eq!(endpoint.calls(), 5);
    let state = c.state();
    let error = state.terminal_error().unwrap();
    assert_eq!(error.kind, FailureKind::RecoveryTimeout);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_while_streaming_leaves_phase() {
    let endpoint = Arc::new(ScriptedStatusEndpoint::always_pending());
    let mut c = coordinator(endpoint.clone());
    let source = ScriptedEventSource::new(vec![
        Step::Frame(fixtures::stage_start("a", "A")),
        Step::Hang,
    ]);
    let (trigger, mut cancel) = cancel_pair();

    let run = tokio::spawn(async move {
        let phase = c.run(&source, &mut cancel).await;
        (phase, c)
    });
    tokio::time::sleep(Duration::from_secs(1)).await;
    trigger.cancel();

    let (phase, c) = run.await.unwrap();
    assert_eq!(phase, SessionPhase::Streaming);
    assert_eq!(c.stats().poll_attempts, 0);
    assert_eq!(endpoint.calls(), 0);
}
