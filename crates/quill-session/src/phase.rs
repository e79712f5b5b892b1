//! Session phase transitions
//!
//! ```text
//! connecting ──► streaming ──► completed | failed
//!      │             │
//!      └──────► recovering ──► completed | failed
//! ```
//!
//! Terminal phases have no outgoing transitions.

use crate::error::SessionError;
use crate::types::SessionPhase;

/// Validates a phase transition.
pub fn validate_transition(from: SessionPhase, to: SessionPhase) -> Result<(), SessionError> {
    if allowed(from, to) {
        Ok(())
    } else {
        Err(SessionError::IllegalTransition { from, to })
    }
}

/// Phases reachable from `from` in one step
#[must_use]
pub fn allowed_transitions(from: SessionPhase) -> Vec<SessionPhase> {
    use SessionPhase::*;
    match from {
        Connecting => vec![Streaming, Recovering],
        Streaming => vec![Recovering, Completed, Failed],
        Recovering => vec![Completed, Failed],
        Completed => vec![],
        Failed => vec![],
    }
}

fn allowed(from: SessionPhase, to: SessionPhase) -> bool {
    allowed_transitions(from).into_iter().any(|p| p == to)
}
