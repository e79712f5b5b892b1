//! Typed stream events
//!
//! The backend sends JSON objects discriminated by a `type` field. Decoding
//! into [`StreamEvent`] is the only place payloads are interpreted; anything
//! that does not fit the closed set of variants becomes a [`MalformedEvent`].

use crate::error::MalformedEvent;
use crate::types::{StageId, StageInfo};
use serde::{Deserialize, Serialize};

/// Event emitted by the generation backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StreamEvent {
    /// Ordered list of stages for this run
    PipelineInfo {
        /// Stages in execution order
        stages: Vec<StageInfo>,
    },

    /// A stage began producing output
    #[serde(rename_all = "camelCase")]
    StageStart {
        /// Stage identifier
        stage_id: StageId,
        /// Human-readable label
        #[serde(default)]
        label: String,
        /// Position reported by the backend
        #[serde(default)]
        step_index: u32,
        /// Stage count reported by the backend
        #[serde(default)]
        total_steps: u32,
        /// Backend trace identifier
        #[serde(default, skip_serializing_if = "Option::is_none")]
        trace_id: Option<String>,
    },

    /// Incremental text of the active stage
    StageChunk {
        /// Text to append
        text: String,
    },

    /// A stage finished
    #[serde(rename_all = "camelCase")]
    StageComplete {
        /// Stage identifier
        stage_id: StageId,
        /// Full output of the stage
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<String>,
    },

    /// The pipeline finished
    Complete {
        /// Final document
        document: String,
        /// Backend-defined metadata
        #[serde(default)]
        metadata: serde_json::Value,
    },

    /// The pipeline failed
    Error {
        /// Failure message, shown verbatim
        message: String,
    },
}

impl StreamEvent {
    /// Decode one JSON frame
    ///
    /// # Errors
    /// `MalformedEvent` for invalid JSON, a missing or unknown `type` tag, or
    /// fields of the wrong shape
    pub fn decode(frame: &str) -> Result<Self, MalformedEvent> {
        serde_json::from_str(frame).map_err(|e| MalformedEvent::new(e.to_string()))
    }

    /// Encode as a JSON frame
    #[must_use]
    pub fn encode(&self) -> String {
        // Serializing a closed enum of strings and JSON values cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Wire tag of the event
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Self::PipelineInfo { .. } => "pipeline-info",
            Self::StageStart { .. } => "stage-start",
            Self::StageChunk { .. } => "stage-chunk",
            Self::StageComplete { .. } => "stage-complete",
            Self::Complete { .. } => "complete",
            Self::Error { .. } => "error",
        }
    }

    /// Whether the event ends the session
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Error { .. })
    }
}
