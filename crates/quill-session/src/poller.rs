//! Recovery poller
//!
//! When the event stream drops before a terminal event, the session falls
//! back to polling the backend's status endpoint on a fixed schedule:
//!
//! 1. Up to `max_attempts` status checks, `interval` apart
//! 2. `completed` with a document ends the session successfully
//! 3. `error` ends it as a pipeline failure, without using the remaining budget
//! 4. `pending`, a failed call, or `completed` without a document waits and retries
//! 5. An exhausted budget ends it with a recovery timeout
//!
//! A status check that outlives `request_timeout` counts as a failed call.
//! Cancellation is checked before every call and interrupts both the call and
//! the wait between calls.

use crate::cancel::CancelSignal;
use crate::config::PollerConfig;
use crate::error::TransportError;
use crate::types::{SessionId, TerminalError, TerminalResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Message used when the backend reports an error without one
pub const DEFAULT_PIPELINE_ERROR: &str = "generation failed";

/// Backend-reported session status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Still running
    Pending,
    /// Finished with a document
    Completed,
    /// Finished with an error
    Error,
}

/// Response of the status endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Session status
    pub status: SessionStatus,
    /// Final document, when completed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
    /// Result metadata, when completed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    /// Failure message, when errored
    #[serde(default, alias = "message", skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusResponse {
    /// Still running
    #[must_use]
    pub fn pending() -> Self {
        Self {
            status: SessionStatus::Pending,
            document: None,
            metadata: None,
            error: None,
        }
    }

    /// Finished with `document`
    #[must_use]
    pub fn completed(document: impl Into<String>, metadata: serde_json::Value) -> Self {
        Self {
            status: SessionStatus::Completed,
            document: Some(document.into()),
            metadata: Some(metadata),
            error: None,
        }
    }

    /// Finished with an error
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: SessionStatus::Error,
            document: None,
            metadata: None,
            error: Some(message.into()),
        }
    }
}

/// Backend status endpoint
#[async_trait]
pub trait StatusEndpoint: Send + Sync {
    /// Fetch the current status of a session
    async fn fetch_status(&self, session_id: &SessionId) -> Result<StatusResponse, TransportError>;
}

/// How recovery ended
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryOutcome {
    /// Backend delivered the final document
    Completed(TerminalResult),
    /// Pipeline error or exhausted budget
    Failed(TerminalError),
    /// Session disposed while polling
    Cancelled,
}

/// Outcome plus the number of status calls made
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryReport {
    /// How recovery ended
    pub outcome: RecoveryOutcome,
    /// Status calls made
    pub attempts: u32,
}

/// Polls the status endpoint until a terminal outcome
#[derive(Clone)]
pub struct RecoveryPoller {
    endpoint: Arc<dyn StatusEndpoint>,
    config: PollerConfig,
}

impl std::fmt::Debug for RecoveryPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveryPoller")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RecoveryPoller {
    /// Create poller
    #[inline]
    #[must_use]
    pub fn new(endpoint: Arc<dyn StatusEndpoint>, config: PollerConfig) -> Self {
        Self { endpoint, config }
    }

    /// Poller settings
    #[inline]
    #[must_use]
    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Poll until completion, explicit failure, budget exhaustion or
    /// cancellation
    pub async fn recover(&self, session_id: &SessionId, cancel: &mut CancelSignal) -> RecoveryReport {
        let max_attempts = self.config.max_attempts;
        let interval = self.config.interval();
        let timeout = self.config.request_timeout();
        let mut attempts = 0;

        for attempt in 1..=max_attempts {
            if cancel.is_cancelled() {
                return RecoveryReport {
                    outcome: RecoveryOutcome::Cancelled,
                    attempts,
                };
            }

            attempts = attempt;
            let response = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    return RecoveryReport { outcome: RecoveryOutcome::Cancelled, attempts };
                }
                response = tokio::time::timeout(timeout, self.endpoint.fetch_status(session_id)) => {
                    response.unwrap_or_else(|_| {
                        Err(TransportError::Interrupted(format!(
                            "status check timed out after {}ms",
                            timeout.as_millis()
                        )))
                    })
                }
            };

            match response {
                Ok(StatusResponse {
                    status: SessionStatus::Completed,
                    document: Some(document),
                    metadata,
                    ..
                }) => {
                    tracing::info!(session = %session_id, attempt, "recovered completed session");
                    let result =
                        TerminalResult::new(document, metadata.unwrap_or(serde_json::Value::Null));
                    return RecoveryReport {
                        outcome: RecoveryOutcome::Completed(result),
                        attempts,
                    };
                }
                Ok(StatusResponse {
                    status: SessionStatus::Completed,
                    document: None,
                    ..
                }) => {
                    tracing::warn!(session = %session_id, attempt, "completed status without document");
                }
                Ok(StatusResponse {
                    status: SessionStatus::Error,
                    error,
                    ..
                }) => {
                    let message = error.unwrap_or_else(|| DEFAULT_PIPELINE_ERROR.to_string());
                    return RecoveryReport {
                        outcome: RecoveryOutcome::Failed(TerminalError::pipeline(message)),
                        attempts,
                    };
                }
                Ok(StatusResponse {
                    status: SessionStatus::Pending,
                    ..
                }) => {
                    tracing::debug!(session = %session_id, attempt, max_attempts, "session still pending");
                }
                Err(err) => {
                    tracing::debug!(session = %session_id, attempt, "status check failed: {}", err);
                }
            }

            if attempt < max_attempts {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => {
                        return RecoveryReport { outcome: RecoveryOutcome::Cancelled, attempts };
                    }
                    () = tokio::time::sleep(interval) => {}
                }
            }
        }

        tracing::warn!(session = %session_id, attempts, "recovery budget exhausted");
        RecoveryReport {
            outcome: RecoveryOutcome::Failed(TerminalError::recovery_timeout(attempts)),
            attempts,
        }
    }
}
