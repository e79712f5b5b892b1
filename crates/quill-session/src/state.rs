//! Per-session state store
//!
//! [`SessionState`] is everything a renderer needs about one session. It is
//! created by a [`SessionCoordinator`](crate::SessionCoordinator) and only
//! that coordinator mutates it; everybody else reads.
//!
//! # Invariants
//! - `outputs` only holds stages present in the manifest
//! - the chunk buffer is cleared exactly when a new stage becomes active
//! - once the phase is terminal no field changes

use crate::error::{SessionError, SessionResult};
use crate::events::StreamEvent;
use crate::phase::validate_transition;
use crate::types::{
    PipelineManifest, SessionId, SessionPhase, StageExecutionState, StageId, StageProgress,
    StageStatus, TerminalError, TerminalResult,
};
use quill_diff::Snapshot;
use serde::Serialize;
use std::collections::BTreeMap;

/// State of one generation session
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    session_id: SessionId,
    manifest: PipelineManifest,
    stages: BTreeMap<StageId, StageExecutionState>,
    current_stage: Option<StageId>,
    chunk_buffer: String,
    outputs: BTreeMap<StageId, String>,
    terminal_result: Option<TerminalResult>,
    terminal_error: Option<TerminalError>,
    phase: SessionPhase,
}

impl SessionState {
    /// Fresh state in the `connecting` phase
    #[must_use]
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            manifest: PipelineManifest::new(),
            stages: BTreeMap::new(),
            current_stage: None,
            chunk_buffer: String::new(),
            outputs: BTreeMap::new(),
            terminal_result: None,
            terminal_error: None,
            phase: SessionPhase::Connecting,
        }
    }

    /// Session identifier
    #[inline]
    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Stage ordering
    #[inline]
    #[must_use]
    pub fn manifest(&self) -> &PipelineManifest {
        &self.manifest
    }

    /// Execution state of `id`
    #[inline]
    #[must_use]
    pub fn stage(&self, id: &StageId) -> Option<&StageExecutionState> {
        self.stages.get(id)
    }

    /// Execution states in manifest order
    pub fn stages(&self) -> impl Iterator<Item = &StageExecutionState> {
        self.manifest.iter().filter_map(|info| self.stages.get(&info.id))
    }

    /// Stage the chunk buffer belongs to
    #[inline]
    #[must_use]
    pub fn current_stage(&self) -> Option<&StageId> {
        self.current_stage.as_ref()
    }

    /// In-flight text of the current stage
    #[inline]
    #[must_use]
    pub fn chunk_buffer(&self) -> &str {
        &self.chunk_buffer
    }

    /// Completed output of `id`
    #[inline]
    #[must_use]
    pub fn output(&self, id: &StageId) -> Option<&str> {
        self.outputs.get(id).map(String::as_str)
    }

    /// Completed output of `id`, distinguishing unknown stages from empty ones
    ///
    /// # Errors
    /// - `UnknownStage` when `id` is not in the manifest
    /// - `NoOutput` when the stage has not produced output
    pub fn completed_output(&self, id: &StageId) -> SessionResult<&str> {
        if !self.manifest.contains(id) {
            return Err(SessionError::UnknownStage(id.clone()));
        }
        self.output(id).ok_or_else(|| SessionError::NoOutput(id.clone()))
    }

    /// All completed outputs
    #[inline]
    #[must_use]
    pub fn outputs(&self) -> &BTreeMap<StageId, String> {
        &self.outputs
    }

    /// Final result, once completed
    #[inline]
    #[must_use]
    pub fn terminal_result(&self) -> Option<&TerminalResult> {
        self.terminal_result.as_ref()
    }

    /// Final error, once failed
    #[inline]
    #[must_use]
    pub fn terminal_error(&self) -> Option<&TerminalError> {
        self.terminal_error.as_ref()
    }

    /// Current phase
    #[inline]
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Completed or failed
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Stage outputs in manifest order, skipping stages without one
    #[must_use]
    pub fn snapshots(&self) -> Vec<Snapshot<StageId>> {
        self.manifest
            .iter()
            .filter_map(|info| {
                self.outputs
                    .get(&info.id)
                    .map(|text| Snapshot::new(info.id.clone(), text.clone()))
            })
            .collect()
    }

    /// Completion summary
    #[must_use]
    pub fn progress(&self) -> StageProgress {
        StageProgress {
            completed: self
                .stages
                .values()
                .filter(|s| s.status == StageStatus::Complete)
                .count(),
            total: self.manifest.len(),
            active: self
                .current_stage
                .clone()
                .filter(|id| self.stages.get(id).is_some_and(|s| s.status == StageStatus::Active)),
        }
    }

    /// Apply a decoded event. Returns whether anything changed.
    pub(crate) fn apply(&mut self, event: StreamEvent) -> bool {
        if self.phase.is_terminal() {
            return false;
        }

        let mut changed = false;
        if self.phase == SessionPhase::Connecting {
            changed |= self.transition(SessionPhase::Streaming);
        }

        changed
            | match event {
                StreamEvent::PipelineInfo { stages } => self.announce(stages),
                StreamEvent::StageStart {
                    stage_id,
                    label,
                    step_index,
                    total_steps,
                    trace_id,
                } => self.start_stage(stage_id, &label, step_index, total_steps, trace_id),
                StreamEvent::StageChunk { text } => {
                    self.chunk_buffer.push_str(&text);
                    !text.is_empty()
                }
                StreamEvent::StageComplete { stage_id, output } => {
                    self.complete_stage(stage_id, output)
                }
                StreamEvent::Complete { document, metadata } => {
                    self.complete(TerminalResult::new(document, metadata))
                }
                StreamEvent::Error { message } => self.fail(TerminalError::pipeline(message)),
            }
    }

    /// Stream opened
    pub(crate) fn mark_streaming(&mut self) -> bool {
        self.transition(SessionPhase::Streaming)
    }

    /// Stream lost before a terminal event
    pub(crate) fn begin_recovery(&mut self) -> bool {
        self.transition(SessionPhase::Recovering)
    }

    /// Record the final result
    pub(crate) fn complete(&mut self, result: TerminalResult) -> bool {
        if validate_transition(self.phase, SessionPhase::Completed).is_err() {
            return false;
        }
        self.terminal_result = Some(result);
        self.transition(SessionPhase::Completed)
    }

    /// Record a terminal failure
    pub(crate) fn fail(&mut self, error: TerminalError) -> bool {
        if validate_transition(self.phase, SessionPhase::Failed).is_err() {
            return false;
        }
        tracing::error!(session = %self.session_id, kind = ?error.kind, "session failed: {}", error.message);
        self.terminal_error = Some(error);
        self.transition(SessionPhase::Failed)
    }

    fn transition(&mut self, to: SessionPhase) -> bool {
        if let Err(err) = validate_transition(self.phase, to) {
            tracing::debug!(session = %self.session_id, "ignored: {}", err);
            return false;
        }
        tracing::info!(session = %self.session_id, from = %self.phase, to = %to, "session phase changed");
        self.phase = to;
        true
    }

    fn announce(&mut self, stages: Vec<crate::types::StageInfo>) -> bool {
        if !self.manifest.announce(stages) {
            return false;
        }
        for info in self.manifest.iter() {
            self.stages
                .entry(info.id.clone())
                .or_insert_with(|| StageExecutionState::pending(info.id.clone()));
        }
        tracing::info!(session = %self.session_id, stages = self.manifest.len(), "pipeline announced");
        true
    }

    fn ensure_stage(&mut self, id: &StageId, label: &str) -> &mut StageExecutionState {
        let label = if label.is_empty() { id.as_str() } else { label };
        if self.manifest.ensure(id, label) {
            tracing::debug!(session = %self.session_id, stage = %id, "stage added outside announcement");
        }
        self.stages
            .entry(id.clone())
            .or_insert_with(|| StageExecutionState::pending(id.clone()))
    }

    fn start_stage(
        &mut self,
        stage_id: StageId,
        label: &str,
        step_index: u32,
        total_steps: u32,
        trace_id: Option<String>,
    ) -> bool {
        let stage = self.ensure_stage(&stage_id, label);
        let before = stage.clone();
        stage.step_index = step_index;
        stage.total_steps = total_steps;
        if trace_id.is_some() {
            stage.trace_id = trace_id;
        }

        let advanced = stage.advance(StageStatus::Active);
        let modified = *stage != before;

        if advanced {
            tracing::info!(session = %self.session_id, stage = %stage_id, step = step_index, total = total_steps, "stage started");
            self.chunk_buffer.clear();
            self.current_stage = Some(stage_id);
        }
        modified
    }

    fn complete_stage(&mut self, stage_id: StageId, output: Option<String>) -> bool {
        let stage = self.ensure_stage(&stage_id, "");
        let advanced = stage.advance(StageStatus::Complete);

        let has_output = output.is_some();
        let stored = match output {
            Some(output) if self.outputs.get(&stage_id) != Some(&output) => {
                self.outputs.insert(stage_id.clone(), output);
                true
            }
            _ => false,
        };

        if advanced {
            tracing::info!(session = %self.session_id, stage = %stage_id, has_output, "stage complete");
        }
        advanced || stored
    }
}
