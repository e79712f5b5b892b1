//! Word-level sequence diff
//!
//! Provides [`diff`], a longest-common-subsequence comparison over the tokens
//! produced by [`tokenize`](crate::tokenize). The output is a list of
//! [`DiffSegment`]s that decomposes both inputs exactly:
//!
//! - `Equal` + `Removed` segments, in order, reconstruct the old text
//! - `Equal` + `Added` segments, in order, reconstruct the new text
//!
//! # Complexity
//!
//! The LCS table holds `(m + 1) × (n + 1)` cells for `m` and `n` tokens, so
//! time and memory are both `O(m·n)`. Document-length inputs are fine; inputs
//! with hundreds of thousands of words on both sides are not.

use crate::tokenize::tokenize;
use serde::{Deserialize, Serialize};

/// Role of a diff segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffKind {
    /// Present in both texts
    Equal,
    /// Present only in the new text
    Added,
    /// Present only in the old text
    Removed,
}

/// A run of text with a single diff role
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiffSegment {
    /// Segment role
    #[serde(rename = "type")]
    pub kind: DiffKind,
    /// Segment text, whitespace included
    pub text: String,
}

impl DiffSegment {
    /// Create segment
    #[inline]
    #[must_use]
    pub fn new(kind: DiffKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    /// Equal segment
    #[inline]
    #[must_use]
    pub fn equal(text: impl Into<String>) -> Self {
        Self::new(DiffKind::Equal, text)
    }

    /// Added segment
    #[inline]
    #[must_use]
    pub fn added(text: impl Into<String>) -> Self {
        Self::new(DiffKind::Added, text)
    }

    /// Removed segment
    #[inline]
    #[must_use]
    pub fn removed(text: impl Into<String>) -> Self {
        Self::new(DiffKind::Removed, text)
    }

    /// Number of characters in the segment
    #[inline]
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Compute the word-level diff between two texts.
///
/// Backtracking walks from the end of both token sequences. When the two
/// candidate moves have equal LCS length the insertion is taken first, which
/// keeps the output stable for a given pair of inputs. Adjacent segments of the
/// same kind are merged.
///
/// `diff(b, a)` is not a relabeled `diff(a, b)`: tie-breaking and merging can
/// place boundaries differently.
#[must_use]
pub fn diff(old: &str, new: &str) -> Vec<DiffSegment> {
    let a = tokenize(old);
    let b = tokenize(new);
    let table = LcsTable::build(&a, &b);

    let mut reversed: Vec<(DiffKind, &str)> = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (a.len(), b.len());

    while i > 0 || j > 0 {
        if i > 0 && j > 0 && a[i - 1] == b[j - 1] {
            reversed.push((DiffKind::Equal, a[i - 1]));
            i -= 1;
            j -= 1;
        } else if j > 0 && (i == 0 || table.get(i, j - 1) >= table.get(i - 1, j)) {
            reversed.push((DiffKind::Added, b[j - 1]));
            j -= 1;
        } else {
            reversed.push((DiffKind::Removed, a[i - 1]));
            i -= 1;
        }
    }

    merge_adjacent(reversed.into_iter().rev())
}

/// Rebuild the old text from a segment list
#[must_use]
pub fn reconstruct_old(segments: &[DiffSegment]) -> String {
    segments
        .iter()
        .filter(|s| s.kind != DiffKind::Added)
        .map(|s| s.text.as_str())
        .collect()
}

/// Rebuild the new text from a segment list
#[must_use]
pub fn reconstruct_new(segments: &[DiffSegment]) -> String {
    segments
        .iter()
        .filter(|s| s.kind != DiffKind::Removed)
        .map(|s| s.text.as_str())
        .collect()
}

/// Character counts per diff role
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStats {
    /// Characters kept
    pub equal: usize,
    /// Characters introduced by the new text
    pub added: usize,
    /// Characters dropped from the old text
    pub removed: usize,
}

impl DiffStats {
    /// Tally a segment list
    #[must_use]
    pub fn from_segments(segments: &[DiffSegment]) -> Self {
        segments.iter().fold(Self::default(), |mut stats, seg| {
            let n = seg.char_len();
            match seg.kind {
                DiffKind::Equal => stats.equal += n,
                DiffKind::Added => stats.added += n,
                DiffKind::Removed => stats.removed += n,
            }
            stats
        })
    }

    /// True when neither side changed
    #[inline]
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        self.added == 0 && self.removed == 0
    }

    /// Share of characters kept, in `[0, 1]`.
    ///
    /// Computed as `2·equal / (old_len + new_len)`; two empty texts are fully
    /// similar.
    #[must_use]
    pub fn similarity(&self) -> f64 {
        let total = 2 * self.equal + self.added + self.removed;
        if total == 0 {
            return 1.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let ratio = (2 * self.equal) as f64 / total as f64;
        ratio
    }
}

/// Diff segments with their tally, for compare views
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffSummary {
    /// Segments as returned by [`diff`]
    pub segments: Vec<DiffSegment>,
    /// Character counts of `segments`
    pub stats: DiffStats,
    /// [`DiffStats::similarity`] of `stats`
    pub similarity: f64,
}

/// Diff two texts and tally the result
#[must_use]
pub fn diff_summary(old: &str, new: &str) -> DiffSummary {
    let segments = diff(old, new);
    let stats = DiffStats::from_segments(&segments);
    DiffSummary {
        similarity: stats.similarity(),
        segments,
        stats,
    }
}

/// Prefix LCS lengths, row-major
struct LcsTable {
    width: usize,
    cells: Vec<u32>,
}

impl LcsTable {
    fn build(a: &[&str], b: &[&str]) -> Self {
        let width = b.len() + 1;
        let mut cells = vec![0u32; (a.len() + 1) * width];

        for i in 1..=a.len() {
            for j in 1..=b.len() {
                cells[i * width + j] = if a[i - 1] == b[j - 1] {
                    cells[(i - 1) * width + (j - 1)] + 1
                } else {
                    cells[(i - 1) * width + j].max(cells[i * width + (j - 1)])
                };
            }
        }

        Self { width, cells }
    }

    #[inline]
    fn get(&self, i: usize, j: usize) -> u32 {
        self.cells[i * self.width + j]
    }
}

fn merge_adjacent<'a>(parts: impl Iterator<Item = (DiffKind, &'a str)>) -> Vec<DiffSegment> {
    let mut merged: Vec<DiffSegment> = Vec::new();
    for (kind, text) in parts {
        match merged.last_mut() {
            Some(last) if last.kind == kind => last.text.push_str(text),
            _ => merged.push(DiffSegment::new(kind, text)),
        }
    }
    merged
}
