//! Person identity propagation
//!
//! Records left unresolved by the box matcher get fresh, video-scoped
//! identities. Each unresolved record seeds a new identity, which is then
//! carried forward over the following records of the same video while the
//! box stays within [`MATCH_TOLERANCE`] of the seed box and the frame gap
//! stays within [`MAX_FRAME_GAP`].
//!
//! The pass is greedy and forward-only: it never looks backward and a chain
//! ends at the first record that does not continue it.

use crate::error::{Result, StitchError};
use crate::matching::MATCH_TOLERANCE;
use crate::records::{MatchedRecord, UNRESOLVED_ID};
use serde::Serialize;
use std::cmp::Ordering;

/// Number of records examined after a seed
pub const LOOKAHEAD_WINDOW: usize = 10;

/// Largest frame distance from the seed that can still continue its chain
pub const MAX_FRAME_GAP: u32 = 10;

/// Counters collected during a propagation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PropagationStats {
    /// Distinct video groups visited
    pub videos: usize,
    /// Unresolved records that minted a new identity
    pub seeds: usize,
    /// Unresolved records that inherited a seed's identity
    pub propagated: usize,
    /// Records that already carried an identity before the pass
    pub already_resolved: usize,
}

fn order(a: &MatchedRecord, b: &MatchedRecord) -> Ordering {
    a.video_name
        .cmp(&b.video_name)
        .then(a.frame_index.cmp(&b.frame_index))
}

/// Stable sort by `(video_name, frame_index)`
pub fn sort_records(records: &mut [MatchedRecord]) {
    records.sort_by(order);
}

/// Verify records are sorted by `(video_name, frame_index)`
pub fn check_order(records: &[MatchedRecord]) -> Result<()> {
    for (index, pair) in records.windows(2).enumerate() {
        if order(&pair[0], &pair[1]) == Ordering::Greater {
            return Err(StitchError::InvalidInputOrder {
                index: index + 1,
                previous: pair[0].position(),
                current: pair[1].position(),
            });
        }
    }
    Ok(())
}

/// Single forward pass identity assignment
pub struct IdentityPropagator;

impl IdentityPropagator {
    /// Sort records, then propagate identities
    pub fn sort_and_run(records: &mut [MatchedRecord]) -> Result<PropagationStats> {
        sort_records(records);
        Self::run(records)
    }

    /// Resolve every negative identity in `records`
    ///
    /// Records must already be sorted by `(video_name, frame_index)`;
    /// otherwise [`StitchError::InvalidInputOrder`] is returned and nothing
    /// is modified.
    pub fn run(records: &mut [MatchedRecord]) -> Result<PropagationStats> {
        check_order(records)?;

        let mut stats = PropagationStats {
            already_resolved: records.iter().filter(|r| r.is_resolved()).count(),
            ..Default::default()
        };
        let mut max_id = UNRESOLVED_ID;
        let mut current_video: Option<String> = None;

        // Index loop: writes made while extending a chain must be visible to
        // the iterations that follow
        for index in 0..records.len() {
            if current_video.as_deref() != Some(records[index].video_name.as_str()) {
                current_video = Some(records[index].video_name.clone());
                max_id = UNRESOLVED_ID;
                stats.videos += 1;
                log::debug!("Processing video: {}", records[index].video_name);
            }

            if records[index].is_resolved() {
                max_id = max_id.max(records[index].person_id);
                continue;
            }

            let new_id = max_id + 1;
            records[index].person_id = new_id;
            stats.seeds += 1;
            stats.propagated += Self::extend_chain(records, index, new_id);
            max_id += 1;

            if stats.seeds % 100 == 0 {
                log::debug!("Processed {} unassigned entries", stats.seeds);
            }
        }

        log::info!(
            "Propagation complete: {} videos, {} new identities, {} records extended",
            stats.videos,
            stats.seeds,
            stats.propagated
        );
        Ok(stats)
    }

    /// Carry `person_id` from the seed at `seed_index` onto the records that
    /// follow it. Returns the number of records extended.
    fn extend_chain(records: &mut [MatchedRecord], seed_index: usize, person_id: i64) -> usize {
        let seed_bbox = records[seed_index].bbox;
        let seed_frame = records[seed_index].frame_index;

        if !seed_bbox.is_finite() {
            log::warn!(
                "Invalid coordinates at index {} ({}), identity not extended",
                seed_index,
                records[seed_index].position()
            );
            return 0;
        }

        let mut extended = 0;
        for offset in 1..=LOOKAHEAD_WINDOW {
            let next = seed_index + offset;
            let Some(candidate) = records.get(next) else {
                break;
            };

            if candidate.video_name != records[seed_index].video_name
                || candidate.is_resolved()
                || candidate.frame_index.abs_diff(seed_frame) > MAX_FRAME_GAP
            {
                break;
            }

            if !candidate.bbox.is_finite() {
                log::warn!(
                    "Invalid coordinates at index {} ({})",
                    next,
                    candidate.position()
                );
                break;
            }

            if !seed_bbox.within_tolerance(&candidate.bbox, MATCH_TOLERANCE) {
                break;
            }

            records[next].person_id = person_id;
            extended += 1;
        }
        extended
    }
}
