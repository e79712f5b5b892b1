//! Per-stage attribution of a final text
//!
//! Given the ordered outputs of the stages that rewrote a document,
//! [`attribute`] decides which stage introduced or last changed every
//! character of the final output.
//!
//! # Algorithm
//!
//! 1. The first snapshot owns all of its characters.
//! 2. Each later snapshot is diffed against the text currently owned. Equal
//!    runs keep their owners, removed runs drop theirs, added runs belong to
//!    the later snapshot.
//! 3. Consecutive characters with the same owner are grouped into segments.
//! 4. A provenance pass looks at every consecutive snapshot pair for a removed
//!    run immediately followed by an added run. The first unannotated segment
//!    of the newer stage whose text equals the added run records the removed
//!    text and the older stage.
//!
//! Step 4 matches by text equality only. When a stage makes the same
//! replacement twice, the annotation lands on the first matching segment and
//! the second stays unannotated.

use crate::diff::{diff, DiffKind};
use serde::{Deserialize, Serialize};

/// A stage's complete output text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot<O> {
    /// Stage that produced the text
    pub owner: O,
    /// Complete output
    pub text: String,
}

impl<O> Snapshot<O> {
    /// Create snapshot
    #[inline]
    #[must_use]
    pub fn new(owner: O, text: impl Into<String>) -> Self {
        Self {
            owner,
            text: text.into(),
        }
    }
}

/// A run of final text owned by one stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributionSegment<O> {
    /// Text of the run
    pub text: String,
    /// Stage that introduced or last changed the run
    pub owner_stage_id: O,
    /// Text this run replaced, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_text: Option<String>,
    /// Stage whose output held `previous_text`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_owner_stage_id: Option<O>,
}

impl<O> AttributionSegment<O> {
    /// Segment without provenance
    #[inline]
    #[must_use]
    pub fn new(text: impl Into<String>, owner: O) -> Self {
        Self {
            text: text.into(),
            owner_stage_id: owner,
            previous_text: None,
            previous_owner_stage_id: None,
        }
    }

    /// Attach provenance
    #[inline]
    #[must_use]
    pub fn with_previous(mut self, text: impl Into<String>, owner: O) -> Self {
        self.previous_text = Some(text.into());
        self.previous_owner_stage_id = Some(owner);
        self
    }
}

/// Attribute the final snapshot's text to the stages that shaped it.
///
/// `snapshots` must be in pipeline order. Concatenating the returned segments
/// reproduces the text of the last snapshot; an empty input gives an empty
/// result.
#[must_use]
pub fn attribute<O: Clone>(snapshots: &[Snapshot<O>]) -> Vec<AttributionSegment<O>> {
    let Some(first) = snapshots.first() else {
        return Vec::new();
    };

    // Ownership is tracked by snapshot index
    let mut owned: Vec<(char, usize)> = first.text.chars().map(|c| (c, 0)).collect();

    for (idx, snapshot) in snapshots.iter().enumerate().skip(1) {
        let current: String = owned.iter().map(|&(c, _)| c).collect();
        let mut next = Vec::with_capacity(snapshot.text.len());
        let mut cursor = 0;

        for segment in diff(&current, &snapshot.text) {
            let len = segment.char_len();
            match segment.kind {
                DiffKind::Equal => {
                    next.extend_from_slice(&owned[cursor..cursor + len]);
                    cursor += len;
                }
                DiffKind::Removed => cursor += len,
                DiffKind::Added => next.extend(segment.text.chars().map(|c| (c, idx))),
            }
        }

        owned = next;
    }

    let mut runs = group_runs(&owned);
    annotate_replacements(snapshots, &mut runs);

    runs.into_iter()
        .map(|run| AttributionSegment {
            text: run.text,
            owner_stage_id: snapshots[run.owner].owner.clone(),
            previous_text: run.previous.as_ref().map(|(text, _)| text.clone()),
            previous_owner_stage_id: run
                .previous
                .map(|(_, prev)| snapshots[prev].owner.clone()),
        })
        .collect()
}

/// Characters owned per stage, in order of first appearance
#[must_use]
pub fn ownership_summary<O: Clone + PartialEq>(segments: &[AttributionSegment<O>]) -> Vec<(O, usize)> {
    let mut summary: Vec<(O, usize)> = Vec::new();
    for segment in segments {
        let chars = segment.text.chars().count();
        match summary.iter_mut().find(|(owner, _)| *owner == segment.owner_stage_id) {
            Some((_, total)) => *total += chars,
            None => summary.push((segment.owner_stage_id.clone(), chars)),
        }
    }
    summary
}

struct Run {
    text: String,
    owner: usize,
    previous: Option<(String, usize)>,
}

fn group_runs(owned: &[(char, usize)]) -> Vec<Run> {
    let mut runs: Vec<Run> = Vec::new();
    for &(ch, owner) in owned {
        match runs.last_mut() {
            Some(run) if run.owner == owner => run.text.push(ch),
            _ => runs.push(Run {
                text: ch.to_string(),
                owner,
                previous: None,
            }),
        }
    }
    runs
}

fn annotate_replacements<O>(snapshots: &[Snapshot<O>], runs: &mut [Run]) {
    for idx in 1..snapshots.len() {
        let segments = diff(&snapshots[idx - 1].text, &snapshots[idx].text);

        for pair in segments.windows(2) {
            let (removed, added) = (&pair[0], &pair[1]);
            if removed.kind != DiffKind::Removed || added.kind != DiffKind::Added {
                continue;
            }

            if let Some(run) = runs
                .iter_mut()
                .find(|r| r.owner == idx && r.previous.is_none() && r.text == added.text)
            {
                run.previous = Some((removed.text.clone(), idx - 1));
            }
        }
    }
}
