//! Core types for Quill sessions
//!
//! Defines the fundamental types shared by the store, the transport and the
//! poller:
//! - Session and stage identifiers
//! - Pipeline manifest and per-stage execution state
//! - Session phase and terminal outcomes

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use ulid::Ulid;

/// Backend session identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap an identifier issued by the backend
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh identifier (ULID for sortability)
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new().to_string())
    }

    /// Borrow as string
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Pipeline stage identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageId(String);

impl StageId {
    /// Create stage identifier
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow as string
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StageId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for StageId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for StageId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for StageId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// One announced pipeline stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageInfo {
    /// Stage identifier
    pub id: StageId,
    /// Human-readable label
    pub label: String,
}

impl StageInfo {
    /// Create stage info
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<StageId>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// Ordered, duplicate-free list of pipeline stages
///
/// # Invariants
/// - stage ids are unique
/// - once a stage has a position, it keeps it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineManifest {
    stages: Vec<StageInfo>,
    announced: bool,
}

impl PipelineManifest {
    /// Empty, unannounced manifest
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a pipeline announcement.
    ///
    /// Only the first announcement counts. Duplicate ids keep their first
    /// occurrence; stages already known from earlier stage events are kept
    /// after the announced ones. Returns whether the manifest changed.
    pub(crate) fn announce(&mut self, stages: Vec<StageInfo>) -> bool {
        if self.announced {
            return false;
        }

        let mut ordered: Vec<StageInfo> = Vec::with_capacity(stages.len() + self.stages.len());
        for stage in stages.into_iter().chain(self.stages.drain(..)) {
            if !ordered.iter().any(|s| s.id == stage.id) {
                ordered.push(stage);
            }
        }

        self.stages = ordered;
        self.announced = true;
        true
    }

    /// Append a stage not seen before. Returns whether it was added.
    pub(crate) fn ensure(&mut self, id: &StageId, label: &str) -> bool {
        if self.contains(id) {
            return false;
        }
        self.stages.push(StageInfo::new(id.clone(), label));
        true
    }

    /// Whether the pipeline has been announced
    #[inline]
    #[must_use]
    pub fn is_announced(&self) -> bool {
        self.announced
    }

    /// Whether `id` is part of the manifest
    #[inline]
    #[must_use]
    pub fn contains(&self, id: &StageId) -> bool {
        self.position(id).is_some()
    }

    /// Canonical position of `id`
    #[inline]
    #[must_use]
    pub fn position(&self, id: &StageId) -> Option<usize> {
        self.stages.iter().position(|s| &s.id == id)
    }

    /// Label of `id`
    #[must_use]
    pub fn label(&self, id: &StageId) -> Option<&str> {
        self.stages
            .iter()
            .find(|s| &s.id == id)
            .map(|s| s.label.as_str())
    }

    /// Stages in canonical order
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &StageInfo> {
        self.stages.iter()
    }

    /// Number of stages
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// True when no stage is known
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

/// Execution status of a stage; only moves forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    /// Announced, not started
    Pending,
    /// Currently producing output
    Active,
    /// Finished
    Complete,
}

/// Progress of one stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageExecutionState {
    /// Stage identifier
    pub stage_id: StageId,
    /// Current status
    pub status: StageStatus,
    /// Position reported by the backend
    pub step_index: u32,
    /// Stage count reported by the backend
    pub total_steps: u32,
    /// Backend trace for this stage, when reported
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

impl StageExecutionState {
    /// Fresh pending stage
    #[inline]
    #[must_use]
    pub fn pending(stage_id: StageId) -> Self {
        Self {
            stage_id,
            status: StageStatus::Pending,
            step_index: 0,
            total_steps: 0,
            trace_id: None,
        }
    }

    /// Move status forward. Returns whether the status changed.
    pub(crate) fn advance(&mut self, to: StageStatus) -> bool {
        if to > self.status {
            self.status = to;
            true
        } else {
            false
        }
    }
}

/// Lifecycle phase of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    /// Waiting for the stream to open
    Connecting,
    /// Receiving events
    Streaming,
    /// Stream lost; polling the status endpoint
    Recovering,
    /// Finished with a result
    Completed,
    /// Finished with an error
    Failed,
}

impl SessionPhase {
    /// Completed or failed
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::Streaming => "streaming",
            Self::Recovering => "recovering",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Final document of a successful session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalResult {
    /// Final document text
    pub document: String,
    /// Backend-defined metadata
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl TerminalResult {
    /// Create result
    #[inline]
    #[must_use]
    pub fn new(document: impl Into<String>, metadata: serde_json::Value) -> Self {
        Self {
            document: document.into(),
            metadata,
        }
    }
}

/// Category of a terminal failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    /// The pipeline itself reported an error
    Pipeline,
    /// Recovery polling ran out of attempts
    RecoveryTimeout,
}

/// Terminal failure surfaced to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalError {
    /// Failure category
    pub kind: FailureKind,
    /// Message shown to the caller
    pub message: String,
}

impl TerminalError {
    /// Failure reported by the pipeline, message kept verbatim
    #[inline]
    #[must_use]
    pub fn pipeline(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Pipeline,
            message: message.into(),
        }
    }

    /// Recovery budget exhausted
    #[must_use]
    pub fn recovery_timeout(attempts: u32) -> Self {
        Self {
            kind: FailureKind::RecoveryTimeout,
            message: format!(
                "lost connection to the generation session: no result after {attempts} status checks"
            ),
        }
    }
}

impl fmt::Display for TerminalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Stage completion summary for progress displays
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageProgress {
    /// Stages marked complete
    pub completed: usize,
    /// Stages in the manifest
    pub total: usize,
    /// Stage currently streaming, if any
    pub active: Option<StageId>,
}

impl StageProgress {
    /// Completed share in `[0, 1]`; an empty manifest reports zero
    #[must_use]
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let fraction = self.completed as f64 / self.total as f64;
        fraction
    }
}
