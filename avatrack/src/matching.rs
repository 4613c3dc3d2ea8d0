//! Cross-source box matching
//!
//! Two detection runs over the same frames produce independent box lists:
//! one carries tracker identities, the other carries action labels only.
//! The matcher pairs every identity-less record with the first identity
//! record at the same video and frame whose four coordinates all lie within
//! [`MATCH_TOLERANCE`], and copies the identity across.
//!
//! Matching is first-match, not best-match, and identity records are not
//! consumed: several identity-less records may resolve to the same source
//! record.

use crate::records::{Detection, MatchedRecord, UNRESOLVED_ID};
use rayon::prelude::*;

/// Per-coordinate tolerance (normalized units) for "same physical box"
pub const MATCH_TOLERANCE: f64 = 0.005;

/// The identity source numbers people from 1; stitched identities start at 0
pub const IDENTITY_SOURCE_OFFSET: i64 = 1;

/// Result of matching two detection sets
#[derive(Debug, Clone, Default)]
pub struct MatchOutcome {
    /// One record per identity-less input, in input order
    pub records: Vec<MatchedRecord>,
    /// Records that received an identity from the other source
    pub matched: usize,
    /// Records left at [`UNRESOLVED_ID`]
    pub unmatched: usize,
}

/// First-match box matcher
pub struct BoxMatcher;

/// Identity rows with a finite box and a non-negative source id
fn usable_source(candidate: &Detection) -> bool {
    candidate.bbox.is_finite() && candidate.person_id >= 0
}

fn first_match<'a, I>(record: &Detection, candidates: I) -> Option<&'a Detection>
where
    I: IntoIterator<Item = &'a Detection>,
{
    candidates.into_iter().find(|candidate| {
        candidate.video_name == record.video_name
            && candidate.frame_index == record.frame_index
            && record.bbox.within_tolerance(&candidate.bbox, MATCH_TOLERANCE)
    })
}

impl BoxMatcher {
    /// Find the first identity record denoting the same box as `record`
    ///
    /// Candidates must share video and frame exactly. Candidates with
    /// non-finite coordinates or a negative identity are never returned.
    pub fn find_match<'a>(
        record: &Detection,
        with_identity: &'a [Detection],
    ) -> Option<&'a Detection> {
        first_match(record, with_identity.iter().filter(|c| usable_source(c)))
    }

    /// Keep the identity rows that can be matched, warning once per bad row
    fn usable_sources(with_identity: &[Detection]) -> Vec<&Detection> {
        with_identity
            .iter()
            .filter(|candidate| {
                if !candidate.bbox.is_finite() {
                    log::warn!(
                        "Ignoring identity record at {} with malformed box {}",
                        candidate.position(),
                        candidate.bbox
                    );
                    return false;
                }
                if candidate.person_id < 0 {
                    log::warn!(
                        "Ignoring identity record at {} with invalid person id {}",
                        candidate.position(),
                        candidate.person_id
                    );
                    return false;
                }
                true
            })
            .collect()
    }

    /// Transfer identities from `with_identity` onto `without_identity`
    ///
    /// Every input record yields exactly one output record. Inputs are not
    /// modified.
    pub fn match_records(
        with_identity: &[Detection],
        without_identity: &[Detection],
    ) -> MatchOutcome {
        log::info!(
            "Matching {} records against {} identity records",
            without_identity.len(),
            with_identity.len()
        );

        let sources = Self::usable_sources(with_identity);
        if sources.len() < with_identity.len() {
            log::warn!(
                "{} of {} identity records ignored",
                with_identity.len() - sources.len(),
                with_identity.len()
            );
        }

        // Indexed parallel collect keeps input order
        let resolved: Vec<(MatchedRecord, bool)> = without_identity
            .par_iter()
            .map(|record| {
                if !record.bbox.is_finite() {
                    log::warn!(
                        "Record at {} has malformed box {}, leaving identity unresolved",
                        record.position(),
                        record.bbox
                    );
                    return (record.clone().with_person_id(UNRESOLVED_ID), false);
                }

                match first_match(record, sources.iter().copied()) {
                    Some(source) => {
                        let person_id = source.person_id - IDENTITY_SOURCE_OFFSET;
                        (record.clone().with_person_id(person_id), true)
                    }
                    None => (record.clone().with_person_id(UNRESOLVED_ID), false),
                }
            })
            .collect();

        let matched = resolved.iter().filter(|(_, found)| *found).count();
        let records: Vec<MatchedRecord> = resolved.into_iter().map(|(record, _)| record).collect();
        let unmatched = records.len() - matched;

        log::info!("Matched: {}, unmatched: {}", matched, unmatched);

        MatchOutcome {
            records,
            matched,
            unmatched,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbox::Bbox;

    fn det(video: &str, frame: u32, bounds: [f64; 4], action: u32) -> Detection {
        Detection::new(video, frame, Bbox::from_bounds(bounds), action)
    }

    #[test]
    fn test_identity_transferred_with_offset() {
        let without = vec![det("1", 5, [0.1, 0.1, 0.3, 0.3], 7)];
        let with = vec![det("1", 5, [0.101, 0.101, 0.301, 0.301], 0).with_person_id(3)];

        let outcome = BoxMatcher::match_records(&with, &without);
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].person_id, 2);
        assert_eq!(outcome.records[0].action_label, 7);
        assert_eq!(outcome.matched, 1);
        assert_eq!(outcome.unmatched, 0);
    }

    #[test]
    fn test_no_match_leaves_unresolved() {
        let without = vec![det("1", 5, [0.1, 0.1, 0.3, 0.3], 7)];
        let with = vec![
            det("1", 5, [0.2, 0.1, 0.3, 0.3], 0).with_person_id(3),
            det("1", 6, [0.1, 0.1, 0.3, 0.3], 0).with_person_id(4),
            det("2", 5, [0.1, 0.1, 0.3, 0.3], 0).with_person_id(5),
        ];

        let outcome = BoxMatcher::match_records(&with, &without);
        assert_eq!(outcome.records[0].person_id, UNRESOLVED_ID);
        assert_eq!(outcome.unmatched, 1);
    }

    #[test]
    fn test_first_match_wins_over_best_match() {
        let without = vec![det("v", 1, [0.5, 0.5, 0.7, 0.7], 1)];
        let with = vec![
            det("v", 1, [0.504, 0.5, 0.7, 0.7], 0).with_person_id(9),
            det("v", 1, [0.5, 0.5, 0.7, 0.7], 0).with_person_id(2),
        ];

        let outcome = BoxMatcher::match_records(&with, &without);
        assert_eq!(outcome.records[0].person_id, 8);
    }

    #[test]
    fn test_many_to_one_matches_allowed() {
        let without = vec![
            det("v", 1, [0.5, 0.5, 0.7, 0.7], 1),
            det("v", 1, [0.501, 0.5, 0.7, 0.7], 2),
        ];
        let with = vec![det("v", 1, [0.5, 0.5, 0.7, 0.7], 0).with_person_id(4)];

        let outcome = BoxMatcher::match_records(&with, &without);
        assert_eq!(outcome.records[0].person_id, 3);
        assert_eq!(outcome.records[1].person_id, 3);
        assert_eq!(outcome.matched, 2);
    }

    #[test]
    fn test_tolerance_boundary() {
        let with = vec![det("v", 1, [0.5, 0.5, 0.75, 0.75], 0).with_person_id(2)];

        let at_boundary = vec![det("v", 1, [0.505, 0.5, 0.75, 0.75], 1)];
        let outcome = BoxMatcher::match_records(&with, &at_boundary);
        assert_eq!(outcome.records[0].person_id, UNRESOLVED_ID);

        let inside = vec![det("v", 1, [0.5049, 0.5, 0.75, 0.75], 1)];
        let outcome = BoxMatcher::match_records(&with, &inside);
        assert_eq!(outcome.records[0].person_id, 1);
    }

    #[test]
    fn test_count_and_order_preserved() {
        let with = vec![det("a", 2, [0.1, 0.1, 0.2, 0.2], 0).with_person_id(1)];
        let without: Vec<Detection> = (0..50)
            .map(|i| det(if i % 2 == 0 { "a" } else { "b" }, i % 5, [0.1, 0.1, 0.2, 0.2], i))
            .collect();

        let outcome = BoxMatcher::match_records(&with, &without);
        assert_eq!(outcome.records.len(), without.len());
        assert_eq!(outcome.matched + outcome.unmatched, without.len());
        for (out, input) in outcome.records.iter().zip(&without) {
            assert_eq!(out.action_label, input.action_label);
            assert_eq!(out.video_name, input.video_name);
        }
    }

    #[test]
    fn test_malformed_records_do_not_abort() {
        let with = vec![
            det("v", 1, [f64::NAN, 0.1, 0.2, 0.2], 0).with_person_id(7),
            det("v", 1, [0.1, 0.1, 0.2, 0.2], 0).with_person_id(3),
        ];
        let without = vec![
            det("v", 1, [0.1, 0.1, 0.2, 0.2], 1),
            det("v", 1, [0.1, f64::INFINITY, 0.2, 0.2], 1),
        ];

        let outcome = BoxMatcher::match_records(&with, &without);
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.records[0].person_id, 2);
        assert_eq!(outcome.records[1].person_id, UNRESOLVED_ID);
    }

    #[test]
    fn test_identity_rows_without_valid_id_are_ignored() {
        let with = vec![
            det("v", 1, [0.1, 0.1, 0.2, 0.2], 0).with_person_id(UNRESOLVED_ID),
            det("v", 1, [0.1, 0.1, 0.2, 0.2], 0).with_person_id(-4),
            det("v", 2, [0.1, 0.1, 0.2, 0.2], 0).with_person_id(UNRESOLVED_ID),
            det("v", 2, [0.1, 0.1, 0.2, 0.2], 0).with_person_id(5),
        ];
        let without = vec![
            det("v", 1, [0.1, 0.1, 0.2, 0.2], 1),
            det("v", 2, [0.1, 0.1, 0.2, 0.2], 1),
        ];

        let outcome = BoxMatcher::match_records(&with, &without);
        assert_eq!(outcome.records[0].person_id, UNRESOLVED_ID);
        assert_eq!(outcome.records[1].person_id, 4);
        assert_eq!(outcome.matched, 1);
        assert!(outcome.records.iter().all(|r| r.person_id >= UNRESOLVED_ID));

        assert_eq!(
            BoxMatcher::find_match(&without[1], &with).map(|t| t.person_id),
            Some(5)
        );
    }

    #[test]
    fn test_empty_inputs() {
        let outcome = BoxMatcher::match_records(&[], &[]);
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.matched, 0);

        let without = vec![det("v", 1, [0.1, 0.1, 0.2, 0.2], 1)];
        let outcome = BoxMatcher::match_records(&[], &without);
        assert_eq!(outcome.records[0].person_id, UNRESOLVED_ID);
    }
}
