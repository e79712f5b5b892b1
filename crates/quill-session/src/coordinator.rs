//! Session coordinator
//!
//! The single owner of a [`SessionState`]. It:
//! - Decodes frames and applies events in delivery order
//! - Detects transport failure and switches to recovery polling
//! - Enforces terminal idempotence (nothing changes after completed/failed)
//! - Publishes every change through a `watch` channel for readers

use crate::cancel::CancelSignal;
use crate::error::TransportError;
use crate::events::StreamEvent;
use crate::poller::{RecoveryOutcome, RecoveryPoller};
use crate::state::SessionState;
use crate::transport::{EventSource, FrameStream};
use crate::types::{SessionId, SessionPhase};
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::watch;

/// Counters for one coordinator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinatorStats {
    /// Raw frames handed to the coordinator
    pub frames_received: u64,
    /// Events that changed the state
    pub events_applied: u64,
    /// Frames dropped as malformed
    pub events_dropped: u64,
    /// Status calls made during recovery
    pub poll_attempts: u32,
}

/// Why frame consumption stopped
enum StreamEnd {
    Terminal,
    Cancelled,
    Failed(TransportError),
}

/// Owns and drives one session's state
#[derive(Debug)]
pub struct SessionCoordinator {
    state: watch::Sender<SessionState>,
    poller: RecoveryPoller,
    stats: CoordinatorStats,
}

impl SessionCoordinator {
    /// Create coordinator with fresh state
    #[must_use]
    pub fn new(session_id: SessionId, poller: RecoveryPoller) -> Self {
        let (state, _) = watch::channel(SessionState::new(session_id));
        Self {
            state,
            poller,
            stats: CoordinatorStats::default(),
        }
    }

    /// Session identifier
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.state.borrow().session_id().clone()
    }

    /// Borrow current state
    #[inline]
    pub fn state(&self) -> watch::Ref<'_, SessionState> {
        self.state.borrow()
    }

    /// Current phase
    #[inline]
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.state.borrow().phase()
    }

    /// Receiver notified on every state change
    #[inline]
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Counters
    #[inline]
    #[must_use]
    pub fn stats(&self) -> CoordinatorStats {
        self.stats
    }

    /// Decode and apply one raw frame.
    ///
    /// Malformed frames are dropped without touching the state. Returns
    /// whether the state changed.
    pub fn ingest_frame(&mut self, frame: &str) -> bool {
        self.stats.frames_received += 1;
        match StreamEvent::decode(frame) {
            Ok(event) => self.ingest(event),
            Err(err) => {
                self.stats.events_dropped += 1;
                tracing::debug!(session = %self.state.borrow().session_id(), "dropping frame: {}", err);
                false
            }
        }
    }

    /// Apply one decoded event. Returns whether the state changed.
    pub fn ingest(&mut self, event: StreamEvent) -> bool {
        let changed = self.state.send_if_modified(|state| state.apply(event));
        if changed {
            self.stats.events_applied += 1;
        }
        changed
    }

    /// Drive the session to a terminal phase.
    ///
    /// Subscribes to `source` and applies frames until a terminal event. A
    /// failed subscription, a stream error or an early end of stream starts
    /// recovery polling. Returns early, leaving the phase as is, when `cancel`
    /// fires.
    pub async fn run(&mut self, source: &dyn EventSource, cancel: &mut CancelSignal) -> SessionPhase {
        let session_id = self.session_id();
        tracing::info!(session = %session_id, "subscribing to event stream");

        let subscribed = tokio::select! {
            biased;
            () = cancel.cancelled() => return self.phase(),
            subscribed = source.subscribe(&session_id) => subscribed,
        };

        let failure = match subscribed {
            Ok(frames) => match self.consume(frames, cancel).await {
                StreamEnd::Terminal | StreamEnd::Cancelled => return self.phase(),
                StreamEnd::Failed(err) => err,
            },
            Err(err) => err,
        };

        tracing::warn!(session = %session_id, "event stream lost: {}", failure);
        self.recover(cancel).await;
        self.phase()
    }

    /// Consume state, ending the coordinator
    #[must_use]
    pub fn into_state(self) -> SessionState {
        self.state.borrow().clone()
    }

    async fn consume(&mut self, mut frames: FrameStream, cancel: &mut CancelSignal) -> StreamEnd {
        self.state.send_if_modified(SessionState::mark_streaming);

        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => return StreamEnd::Cancelled,
                next = frames.next() => next,
            };

            match next {
                Some(Ok(frame)) => {
                    self.ingest_frame(&frame);
                    if self.phase().is_terminal() {
                        return StreamEnd::Terminal;
                    }
                }
                Some(Err(err)) => return StreamEnd::Failed(err),
                None => return StreamEnd::Failed(TransportError::Closed),
            }
        }
    }

    async fn recover(&mut self, cancel: &mut CancelSignal) {
        if !self.state.send_if_modified(SessionState::begin_recovery) {
            return;
        }

        let session_id = self.session_id();
        let report = self.poller.recover(&session_id, cancel).await;
        self.stats.poll_attempts += report.attempts;

        match report.outcome {
            RecoveryOutcome::Completed(result) => {
                self.state.send_if_modified(|state| state.complete(result));
            }
            RecoveryOutcome::Failed(error) => {
                self.state.send_if_modified(|state| state.fail(error));
            }
            RecoveryOutcome::Cancelled => {
                tracing::info!(session = %session_id, attempts = report.attempts, "recovery cancelled");
            }
        }
    }
}
