//! Quill session coordination
//!
//! Drives one multi-stage generation session from its event stream:
//! - Decodes stream frames into typed events
//! - Applies them to a single owned [`SessionState`]
//! - Falls back to status polling when the stream is lost
//! - Derives attribution and stage diffs from stored outputs
//!
//! # Example
//!
//! ```rust,ignore
//! use quill_session::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example(
//! #     source: Arc<dyn EventSource>,
//! #     status: Arc<dyn StatusEndpoint>,
//! # ) -> Result<(), SessionError> {
//! let config = QuillConfig::new();
//! let mut session = SessionHandle::start(SessionId::generate(), &config, source, status);
//!
//! let phase = session.wait_terminal().await?;
//! println!("session ended {phase}");
//! for segment in session.attribution().iter() {
//!     println!("{}: {:?}", segment.owner_stage_id, segment.text);
//! }
//! session.dispose().await?;
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod cancel;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod phase;
pub mod poller;
pub mod session;
pub mod state;
pub mod transport;
pub mod types;
pub mod views;

pub use cancel::{cancel_pair, CancelSignal, CancelTrigger};
pub use config::{LoggingConfig, PollerConfig, QuillConfig, ViewConfig};
pub use coordinator::{CoordinatorStats, SessionCoordinator};
pub use error::{MalformedEvent, SessionError, SessionResult, TransportError};
pub use events::StreamEvent;
pub use phase::{allowed_transitions, validate_transition};
pub use poller::{
    RecoveryOutcome, RecoveryPoller, RecoveryReport, SessionStatus, StatusEndpoint,
    StatusResponse, DEFAULT_PIPELINE_ERROR,
};
pub use session::{SessionHandle, SessionReport};
pub use state::SessionState;
pub use transport::{ChannelEventSource, EventSource, FrameStream};
pub use types::{
    FailureKind, PipelineManifest, SessionId, SessionPhase, StageExecutionState, StageId,
    StageInfo, StageProgress, StageStatus, TerminalError, TerminalResult,
};
pub use views::{Attribution, SessionViews, StageDiff};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with sessions
    pub use crate::{
        EventSource, QuillConfig, SessionError, SessionHandle, SessionId, SessionPhase,
        SessionState, StageId, StatusEndpoint, StreamEvent,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
