//! Session handle
//!
//! [`SessionHandle::start`] spawns one coordinator task per session. The
//! handle is the only way to talk to it: read state, wait for the terminal
//! phase, derive views, and dispose. Dropping the handle cancels the task.

use crate::cancel::{cancel_pair, CancelTrigger};
use crate::config::QuillConfig;
use crate::coordinator::{CoordinatorStats, SessionCoordinator};
use crate::error::{SessionError, SessionResult};
use crate::poller::{RecoveryPoller, StatusEndpoint};
use crate::state::SessionState;
use crate::transport::EventSource;
use crate::types::{SessionId, SessionPhase, StageId, StageProgress};
use crate::views::{Attribution, SessionViews, StageDiff};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Final state and counters of a finished session task
#[derive(Debug, Clone)]
pub struct SessionReport {
    /// State at the moment the task stopped
    pub state: SessionState,
    /// Coordinator counters
    pub stats: CoordinatorStats,
}

/// Handle to a running session
#[derive(Debug)]
pub struct SessionHandle {
    id: SessionId,
    state: watch::Receiver<SessionState>,
    trigger: CancelTrigger,
    task: JoinHandle<SessionReport>,
    views: SessionViews,
}

impl SessionHandle {
    /// Start coordinating `session_id` on the current tokio runtime
    #[must_use]
    pub fn start(
        session_id: SessionId,
        config: &QuillConfig,
        source: Arc<dyn EventSource>,
        endpoint: Arc<dyn StatusEndpoint>,
    ) -> Self {
        let poller = RecoveryPoller::new(endpoint, config.poller.clone());
        let mut coordinator = SessionCoordinator::new(session_id.clone(), poller);
        let state = coordinator.subscribe();
        let (trigger, mut cancel) = cancel_pair();

        let task = tokio::spawn(async move {
            let phase = coordinator.run(source.as_ref(), &mut cancel).await;
            let stats = coordinator.stats();
            tracing::info!(
                session = %coordinator.session_id(),
                %phase,
                frames = stats.frames_received,
                dropped = stats.events_dropped,
                polls = stats.poll_attempts,
                "session task finished"
            );
            SessionReport {
                state: coordinator.into_state(),
                stats,
            }
        });

        Self {
            id: session_id,
            state,
            trigger,
            task,
            views: SessionViews::from_config(&config.views),
        }
    }

    /// Session identifier
    #[inline]
    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Clone of the current state
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Current phase
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.state.borrow().phase()
    }

    /// Stage completion counts
    #[must_use]
    pub fn progress(&self) -> StageProgress {
        self.state.borrow().progress()
    }

    /// Receiver notified on every state change
    #[inline]
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Wait until the session is completed or failed
    ///
    /// # Errors
    /// - `Disposed` if the task stopped before reaching a terminal phase
    pub async fn wait_terminal(&mut self) -> SessionResult<SessionPhase> {
        self.state
            .wait_for(SessionState::is_terminal)
            .await
            .map(|state| state.phase())
            .map_err(|_| SessionError::Disposed)
    }

    /// Attribution of the current outputs
    #[must_use]
    pub fn attribution(&self) -> Attribution {
        let snapshots = self.state.borrow().snapshots();
        self.views.attribution(&snapshots)
    }

    /// Diff between two stage outputs
    ///
    /// # Errors
    /// - `UnknownStage` or `NoOutput` for either stage
    pub fn stage_diff(&self, from: &StageId, to: &StageId) -> SessionResult<StageDiff> {
        let (old, new) = {
            let state = self.state.borrow();
            (
                state.completed_output(from)?.to_owned(),
                state.completed_output(to)?.to_owned(),
            )
        };
        Ok(self.views.stage_diff(&old, &new))
    }

    /// Signal the task to stop without waiting for it
    #[inline]
    pub fn cancel(&self) {
        self.trigger.cancel();
    }

    /// Cancel the task and wait for it to stop
    ///
    /// No state change happens after this returns.
    ///
    /// # Errors
    /// - `TaskFailed` if the task panicked
    pub async fn dispose(self) -> SessionResult<SessionReport> {
        self.trigger.cancel();
        let report = self
            .task
            .await
            .map_err(|e| SessionError::TaskFailed(e.to_string()))?;
        tracing::debug!(session = %self.id, phase = %report.state.phase(), "session disposed");
        Ok(report)
    }
}
