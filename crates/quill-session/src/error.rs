//! Error types for Quill sessions
//!
//! Provides error handling for:
//! - Transport failures (recoverable, trigger status polling)
//! - Malformed stream events (dropped)
//! - Session API misuse and configuration problems
//!
//! Pipeline failures and recovery timeouts are not Rust errors: they are
//! terminal session outcomes recorded as [`TerminalError`](crate::TerminalError).

use crate::types::{SessionPhase, StageId};
use std::path::PathBuf;

/// Failure of the streaming transport or the status endpoint
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Could not open the stream or reach the endpoint
    #[error("failed to connect: {0}")]
    Connect(String),

    /// Stream broke mid-flight
    #[error("stream interrupted: {0}")]
    Interrupted(String),

    /// Stream ended before a terminal event
    #[error("stream closed before a terminal event")]
    Closed,

    /// Endpoint answered with a non-success status
    #[error("unexpected status {status} from {endpoint}")]
    Status {
        /// Requested URL or endpoint name
        endpoint: String,
        /// HTTP status code
        status: u16,
    },

    /// Endpoint answered with an unreadable body
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

/// Stream event that could not be decoded
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed event: {reason}")]
pub struct MalformedEvent {
    /// Decoder message
    pub reason: String,
}

impl MalformedEvent {
    /// Create malformed event error
    #[inline]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Main session error type
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport failure surfaced to a caller
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Event could not be decoded
    #[error(transparent)]
    Malformed(#[from] MalformedEvent),

    /// Phase change not permitted by the state machine
    #[error("illegal phase transition: {from} -> {to}")]
    IllegalTransition {
        /// Current phase
        from: SessionPhase,
        /// Requested phase
        to: SessionPhase,
    },

    /// Stage not in the manifest
    #[error("unknown stage: {0}")]
    UnknownStage(StageId),

    /// Stage has no completed output
    #[error("stage has no output: {0}")]
    NoOutput(StageId),

    /// Session task ended without reaching a terminal phase
    #[error("session disposed before completion")]
    Disposed,

    /// Session task panicked or was aborted
    #[error("session task failed: {0}")]
    TaskFailed(String),

    /// Invalid configuration value
    #[error("configuration error: {0}")]
    Config(String),

    /// Configuration file could not be read
    #[error("io error reading {path}: {source}")]
    ConfigIo {
        /// Config file path
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid TOML
    #[error("invalid configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl SessionError {
    /// Create config IO error for path
    pub fn config_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ConfigIo {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for session operations
pub type SessionResult<T> = Result<T, SessionError>;
