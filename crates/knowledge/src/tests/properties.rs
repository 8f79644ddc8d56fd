//! Property tests for result merging and citation resolution.

use crate::rag::format_citation;
use crate::types::{CollectionKind, PassageMetadata, RankedResultSet, RetrievedPassage};
use proptest::prelude::*;
use std::collections::HashSet;

fn arb_passage() -> impl Strategy<Value = RetrievedPassage> {
    (0u8..12, 0.0f32..=1.0, any::<bool>()).prop_map(|(id, score, sector)| RetrievedPassage {
        source_collection: if sector {
            CollectionKind::Sector
        } else {
            CollectionKind::General
        },
        passage_id: format!("p{}", id),
        text: format!("texte {}", id),
        similarity_score: score,
        metadata: PassageMetadata::default(),
        sector_id: None,
        sector_name: None,
    })
}

fn arb_batches() -> impl Strategy<Value = Vec<Vec<RetrievedPassage>>> {
    prop::collection::vec(prop::collection::vec(arb_passage(), 0..10), 0..3)
}

proptest! {
    #[test]
    fn merge_has_no_duplicate_ids(batches in arb_batches(), top_k in 0usize..15) {
        let merged = RankedResultSet::merge(batches, top_k);
        let ids: HashSet<&str> = merged.passages().iter().map(|p| p.passage_id.as_str()).collect();
        prop_assert_eq!(ids.len(), merged.len());
        prop_assert!(merged.len() <= top_k);
    }

    #[test]
    fn merge_is_sorted_descending(batches in arb_batches(), top_k in 1usize..15) {
        let merged = RankedResultSet::merge(batches, top_k);
        for pair in merged.passages().windows(2) {
            prop_assert!(pair[0].similarity_score >= pair[1].similarity_score);
        }
    }

    #[test]
    fn merge_is_idempotent(batches in arb_batches(), top_k in 1usize..15) {
        let once = RankedResultSet::merge(batches, top_k);
        let twice = RankedResultSet::merge([once.passages().to_vec()], top_k);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn merge_with_itself_changes_nothing(batches in arb_batches(), top_k in 1usize..15) {
        let once = RankedResultSet::merge(batches, top_k);
        let doubled = RankedResultSet::merge(
            [once.passages().to_vec(), once.passages().to_vec()],
            top_k,
        );
        prop_assert_eq!(once, doubled);
    }

    #[test]
    fn first_occurrence_wins(batches in arb_batches()) {
        let mut first_seen: Vec<&RetrievedPassage> = Vec::new();
        for p in batches.iter().flatten() {
            if !first_seen.iter().any(|s| s.passage_id == p.passage_id) {
                first_seen.push(p);
            }
        }
        let merged = RankedResultSet::merge(batches.clone(), usize::MAX);
        for p in merged.passages() {
            prop_assert!(first_seen.contains(&p));
        }
    }

    #[test]
    fn citation_is_never_empty(passage in arb_passage()) {
        prop_assert!(!format_citation(&passage).is_empty());
    }
}
