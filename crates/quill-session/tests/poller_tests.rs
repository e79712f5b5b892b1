use async_trait::async_trait;
use mockall::mock;
use pretty_assertions::assert_eq;
use quill_session::{
    cancel_pair, FailureKind, PollerConfig, RecoveryOutcome, RecoveryPoller, SessionId,
    StatusEndpoint, StatusResponse, TransportError,
};
use quill_test_utils::ScriptedStatusEndpoint;
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

mock! {
    Status {}

    #[async_trait]
    impl StatusEndpoint for Status {
        async fn fetch_status(&self, session_id: &SessionId) -> Result<StatusResponse, TransportError>;
    }
}

fn config(max_attempts: u32) -> PollerConfig {
    PollerConfig::new(max_attempts, Duration::from_secs(3))
}

#[tokio::test(start_paused = true)]
async fn test_completes_on_final_attempt_after_pending_responses() {
    let endpoint = Arc::new(ScriptedStatusEndpoint::pending_then(
        3,
        StatusResponse::completed("final text", json!({ "words": 2 })),
    ));
    let poller = RecoveryPoller::new(endpoint.clone(), config(4));
    let (_trigger, mut cancel) = cancel_pair();

    let start = Instant::now();
    let report = poller.recover(&SessionId::new("s"), &mut cancel).await;

    // success on the last attempt of the budget
    assert_eq!(report.attempts, 4);
    assert_eq!(endpoint.calls(), 4);
    match report.outcome {
        RecoveryOutcome::Completed(result) => {
            assert_eq!(result.document, "final text");
            assert_eq!(result.metadata, json!({ "words": 2 }));
        }
        other => panic!("expected completion, got {other:?}"),
    }
    assert_eq!(start.elapsed(), Duration::from_secs(9));
}

#[tokio::test(start_paused = true)]
async fn test_error_stops_polling_immediately() {
    let mut mock = MockStatus::new();
    let mut calls = 0;
    mock.expect_fetch_status().times(2).returning(move |_| {
        calls += 1;
        if calls == 1 {
            Ok(StatusResponse::pending())
        } else {
            Ok(StatusResponse::error("quota exceeded"))
        }
    });

    let poller = RecoveryPoller::new(Arc::new(mock), config(5));
    let (_trigger, mut cancel) = cancel_pair();
    let report = poller.recover(&SessionId::new("s"), &mut cancel).await;

    assert_eq!(report.attempts, 2);
    match report.outcome {
        RecoveryOutcome::Failed(error) => {
            assert_eq!(error.kind, FailureKind::Pipeline);
            assert_eq!(error.message, "quota exceeded");
        }
        other => panic!("expected failure, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_error_without_message_uses_default() {
    let endpoint = Arc::new(ScriptedStatusEndpoint::new([Ok(StatusResponse {
        error: None,
        ..StatusResponse::error("unused")
    })]));
    let poller = RecoveryPoller::new(endpoint, config(3));
    let (_trigger, mut cancel) = cancel_pair();
    let report = poller.recover(&SessionId::new("s"), &mut cancel).await;

    match report.outcome {
        RecoveryOutcome::Failed(error) => {
            assert_eq!(error.message, quill_session::DEFAULT_PIPELINE_ERROR);
        }
        other => panic!("expected failure, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_budget_exhaustion_reports_connection_loss() {
    let endpoint = Arc::new(ScriptedStatusEndpoint::always_pending());
    let poller = RecoveryPoller::new(endpoint.clone(), config(4));
    let (_trigger, mut cancel) = cancel_pair();

    let start = Instant::now();
    let report = poller.recover(&SessionId::new("s"), &mut cancel).await;

    assert_eq!(endpoint.calls(), 4);
    assert_eq!(report.attempts, 4);
    match report.outcome {
        RecoveryOutcome::Failed(error) => {
            assert_eq!(error.kind, FailureKind::RecoveryTimeout);
            assert!(error.message.contains("lost connection"));
            assert!(error.message.contains("4 status checks"));
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    // no wait after the last attempt
    assert_eq!(start.elapsed(), Duration::from_secs(9));
}

#[tokio::test(start_paused = true)]
async fn test_transport_errors_count_as_attempts() {
    let endpoint = Arc::new(ScriptedStatusEndpoint::new([
        Err(TransportError::Connect("refused".into())),
        Err(TransportError::Status {
            endpoint: "status".into(),
            status: 502,
        }),
        Ok(StatusResponse::completed("doc", json!(null))),
    ]));
    let poller = RecoveryPoller::new(endpoint, config(3));
    let (_trigger, mut cancel) = cancel_pair();
    let report = poller.recover(&SessionId::new("s"), &mut cancel).await;

    assert_eq!(report.attempts, 3);
    assert!(matches!(report.outcome, RecoveryOutcome::Completed(_)));
}

#[tokio::test(start_paused = true)]
async fn test_completed_without_document_keeps_polling() {
    let endpoint = Arc::new(ScriptedStatusEndpoint::new([
        Ok(StatusResponse {
            document: None,
            ..StatusResponse::completed("", json!(null))
        }),
        Ok(StatusResponse::completed("doc", json!({}))),
    ]));
    let poller = RecoveryPoller::new(endpoint, config(3));
    let (_trigger, mut cancel) = cancel_pair();
    let report = poller.recover(&SessionId::new("s"), &mut cancel).await;

    assert_eq!(report.attempts, 2);
    assert!(matches!(report.outcome, RecoveryOutcome::Completed(_)));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_wait_stops_polling() {
    let endpoint = Arc::new(ScriptedStatusEndpoint::always_pending());
    let poller = RecoveryPoller::new(endpoint.clone(), config(40));
    let (trigger, mut cancel) = cancel_pair();

    let task = tokio::spawn(async move { poller.recover(&SessionId::new("s"), &mut cancel).await });

    tokio::time::sleep(Duration::from_secs(4)).await;
    trigger.cancel();
    let report = task.await.unwrap();

    assert_eq!(report.outcome, RecoveryOutcome::Cancelled);
    assert_eq!(report.attempts, 2);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(endpoint.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_already_cancelled_makes_no_calls() {
    let endpoint = Arc::new(ScriptedStatusEndpoint::always_pending());
    let poller = RecoveryPoller::new(endpoint.clone(), config(3));
    let (trigger, mut cancel) = cancel_pair();
    trigger.cancel();

    let report = poller.recover(&SessionId::new("s"), &mut cancel).await;
    assert_eq!(report.attempts, 0);
    assert_eq!(report.outcome, RecoveryOutcome::Cancelled);
    assert_eq!(endpoint.calls(), 0);
}

/// Endpoint whose calls never return
#[derive(Default)]
struct StalledStatus {
    calls: AtomicU32,
}

#[async_trait]
impl StatusEndpoint for StalledStatus {
    async fn fetch_status(&self, _: &SessionId) -> Result<StatusResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

#[tokio::test(start_paused = true)]
async fn test_stalled_status_checks_use_up_the_budget() {
    let endpoint = Arc::new(StalledStatus::default());
    let poller = RecoveryPoller::new(
        endpoint.clone(),
        config(3).with_request_timeout(Duration::from_secs(5)),
    );
    let (_trigger, mut cancel) = cancel_pair();

    let start = Instant::now();
    let report = poller.recover(&SessionId::new("s"), &mut cancel).await;

    assert_eq!(endpoint.calls.load(Ordering::SeqCst), 3);
    assert_eq!(report.attempts, 3);
    match report.outcome {
        RecoveryOutcome::Failed(error) => assert_eq!(error.kind, FailureKind::RecoveryTimeout),
        other => panic!("expected timeout, got {other:?}"),
    }
    // three 5s checks and two 3s waits
    assert_eq!(start.elapsed(), Duration::from_secs(21));
}
