//! Attribution Engine Tests

use proptest::prelude::*;
use quill_diff::{attribute, AttributionSegment, Snapshot};

fn concat<O>(segments: &[AttributionSegment<O>]) -> String {
    segments.iter().map(|s| s.text.as_str()).collect()
}

#[test]
fn test_single_stage() {
    let segments = attribute(&[Snapshot::new("S1", "The whole document.")]);
    assert_eq!(segments, vec![AttributionSegment::new("The whole document.", "S1")]);
}

#[test]
fn test_identical_second_stage_transfers_nothing() {
    let text = "Identical output from both stages.";
    let segments = attribute(&[Snapshot::new("S1", text), Snapshot::new("S2", text)]);
    assert_eq!(segments, vec![AttributionSegment::new(text, "S1")]);
}

#[test]
fn test_hello_world_provenance() {
    let segments = attribute(&[
        Snapshot::new("S1", "hello world"),
        Snapshot::new("S2", "hello there"),
    ]);
    assert_eq!(
        segments,
        vec![
            AttributionSegment::new("hello ", "S1"),
            AttributionSegment::new("there", "S2").with_previous("world", "S1"),
        ]
    );
}

#[test]
fn test_provenance_matches_by_text_only() {
    // One real replacement ("red " -> "blue ") plus a pure insertion of the
    // same text. Matching by exact text annotates the first "blue " span,
    // which is the insertion, and leaves the actual replacement bare.
    let segments = attribute(&[
        Snapshot::new("S1", "fish red end"),
        Snapshot::new("S2", "blue fish blue end"),
    ]);
    let replaced: Vec<_> = segments.iter().filter(|s| s.owner_stage_id == "S2").collect();
    assert_eq!(replaced.len(), 2);
    assert_eq!(replaced[0].previous_text.as_deref(), Some("red "));
    assert_eq!(replaced[1].previous_text, None);
    assert_eq!(concat(&segments), "blue fish blue end");
}

#[test]
fn test_empty_middle_stage() {
    let segments = attribute(&[
        Snapshot::new("S1", "kept text"),
        Snapshot::new("S2", ""),
        Snapshot::new("S3", "kept text"),
    ]);
    assert_eq!(concat(&segments), "kept text");
    assert!(segments.iter().all(|s| s.owner_stage_id == "S3"));
}

proptest! {
    #[test]
    fn prop_segments_reconstruct_final_text(
        texts in prop::collection::vec("[ab ]{0,12}", 1..5)
    ) {
        let owners = ["S1", "S2", "S3", "S4", "S5"];
        let snapshots: Vec<_> = texts
            .iter()
            .zip(owners)
            .map(|(text, owner)| Snapshot::new(owner, text.clone()))
            .collect();

        let segments = attribute(&snapshots);
        prop_assert_eq!(concat(&segments), texts.last().cloned().unwrap_or_default());
        prop_assert!(segments.iter().all(|s| owners[..texts.len()].contains(&s.owner_stage_id)));
        prop_assert!(segments.iter().all(|s| !s.text.is_empty()));
        for pair in segments.windows(2) {
            prop_assert_ne!(pair[0].owner_stage_id, pair[1].owner_stage_id);
        }
    }
}
