//! Quill Diff
//!
//! Pure text comparison primitives for multi-stage generation pipelines.
//!
//! # Core Concepts
//!
//! - [`diff`]: word-level LCS diff producing [`DiffSegment`]s
//! - [`attribute`]: which stage introduced or last changed each span of the
//!   final text, as [`AttributionSegment`]s
//! - [`ContentDigest`]: Blake3 digest used to memoize both
//!
//! Everything here is content-agnostic: texts are treated as sequences of
//! whitespace-delimited tokens, never interpreted.
//!
//! # Example
//!
//! ```rust
//! use quill_diff::{attribute, diff, DiffSegment, Snapshot};
//!
//! let segments = diff("a b c", "a x c");
//! assert_eq!(segments[1], DiffSegment::removed("b "));
//!
//! let spans = attribute(&[
//!     Snapshot::new("draft", "hello world"),
//!     Snapshot::new("polish", "hello there"),
//! ]);
//! assert_eq!(spans[1].owner_stage_id, "polish");
//! assert_eq!(spans[1].previous_text.as_deref(), Some("world"));
//! ```

#![warn(unreachable_pub)]
#![warn(missing_docs)]

mod attribution;
mod diff;
mod digest;
mod tokenize;

pub use attribution::{attribute, ownership_summary, AttributionSegment, Snapshot};
pub use diff::{
    diff, diff_summary, reconstruct_new, reconstruct_old, DiffKind, DiffSegment, DiffStats,
    DiffSummary,
};
pub use digest::ContentDigest;
pub use tokenize::tokenize;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
