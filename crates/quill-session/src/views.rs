//! Derived views over stored snapshots
//!
//! Attribution and stage-to-stage diffs are pure functions of the stored
//! outputs, so they are recomputed on demand and memoized by the digest of
//! the texts they read. A cached entry can never be stale: different texts
//! produce a different key.

use crate::config::ViewConfig;
use crate::types::StageId;
use moka::sync::Cache;
use quill_diff::{attribute, diff, AttributionSegment, ContentDigest, DiffSegment, Snapshot};
use std::sync::Arc;

/// Attribution of the final stage output
pub type Attribution = Arc<Vec<AttributionSegment<StageId>>>;

/// Diff between two stage outputs
pub type StageDiff = Arc<Vec<DiffSegment>>;

/// Memoized diff and attribution results
#[derive(Debug, Clone)]
pub struct SessionViews {
    attributions: Cache<ContentDigest, Attribution>,
    diffs: Cache<ContentDigest, StageDiff>,
}

impl SessionViews {
    /// Create views holding up to `capacity` results of each kind
    #[inline]
    #[must_use]
    pub fn new(capacity: u64) -> Self {
        Self {
            attributions: Cache::new(capacity),
            diffs: Cache::new(capacity),
        }
    }

    /// Create views from configuration
    #[inline]
    #[must_use]
    pub fn from_config(config: &ViewConfig) -> Self {
        Self::new(config.cache_capacity)
    }

    /// Attribute stage outputs given in manifest order
    ///
    /// Takes copies of the outputs so no lock on the live state is held while
    /// computing.
    #[must_use]
    pub fn attribution(&self, snapshots: &[Snapshot<StageId>]) -> Attribution {
        let key = ContentDigest::of_snapshots(snapshots);
        self.attributions.get_with(key, || {
            tracing::debug!(snapshots = snapshots.len(), key = %key.short(), "computing attribution");
            Arc::new(attribute(snapshots))
        })
    }

    /// Diff two stage outputs
    #[must_use]
    pub fn stage_diff(&self, old: &str, new: &str) -> StageDiff {
        let key = ContentDigest::of_pair(old, new);
        self.diffs.get_with(key, || Arc::new(diff(old, new)))
    }

    /// Drop every memoized result
    #[inline]
    pub fn clear(&self) {
        self.attributions.invalidate_all();
        self.diffs.invalidate_all();
    }
}

impl Default for SessionViews {
    fn default() -> Self {
        Self::from_config(&ViewConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::StreamEvent;
    use crate::state::SessionState;
    use crate::types::{SessionId, StageInfo};
    use tokio::sync::watch;

    fn finished_state() -> SessionState {
        let mut state = SessionState::new(SessionId::new("views"));
        state.apply(StreamEvent::PipelineInfo {
            stages: vec![
                StageInfo::new("draft", "Draft"),
                StageInfo::new("edit", "Edit"),
                StageInfo::new("review", "Review"),
            ],
        });
        for (id, text) in [("draft", "hello world"), ("edit", "hello there")] {
            state.apply(StreamEvent::StageComplete {
                stage_id: StageId::new(id),
                output: Some(text.to_string()),
            });
        }
        state
    }

    #[test]
    fn attribution_is_memoized() {
        let views = SessionViews::new(8);
        let state = finished_state();
        let first = views.attribution(&state.snapshots());
        let second = views.attribution(&state.snapshots());
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.len(), 2);
        assert_eq!(first[1].owner_stage_id, StageId::new("edit"));
    }

    #[test]
    fn views_are_computed_outside_the_state_borrow() {
        let views = SessionViews::default();
        let (tx, rx) = watch::channel(finished_state());

        let snapshots = rx.borrow().snapshots();
        let outputs = {
            let state = rx.borrow();
            (
                state.completed_output(&StageId::new("draft")).unwrap().to_string(),
                state.completed_output(&StageId::new("edit")).unwrap().to_string(),
            )
        };

        // the writer is never blocked by a reader computing views
        assert!(tx.send_if_modified(|state| state.apply(StreamEvent::StageComplete {
            stage_id: StageId::new("review"),
            output: Some("hello there friend".to_string()),
        })));

        assert_eq!(views.attribution(&snapshots).len(), 2);
        assert_eq!(views.stage_diff(&outputs.0, &outputs.1).len(), 3);
        let latest = views.attribution(&rx.borrow().snapshots());
        assert_eq!(latest.last().unwrap().owner_stage_id, StageId::new("review"));
    }

    #[test]
    fn stage_diff_between_two_outputs() {
        let views = SessionViews::default();
        let segments = views.stage_diff("hello world", "hello there");
        assert_eq!(
            *segments,
            vec![
                DiffSegment::equal("hello "),
                DiffSegment::removed("world"),
                DiffSegment::added("there"),
            ]
        );
        assert!(Arc::ptr_eq(&segments, &views.stage_diff("hello world", "hello there")));
    }

    #[test]
    fn empty_session_has_empty_attribution() {
        let views = SessionViews::default();
        let state = SessionState::new(SessionId::new("empty"));
        assert!(views.attribution(&state.snapshots()).is_empty());
    }
}
