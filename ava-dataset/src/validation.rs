//! Sanity summary of an annotation table before training

use avatrack::Detection;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DatasetSummary {
    pub rows: usize,
    pub videos: usize,
    /// Boxes with a coordinate outside `[0, 1]` or not a number
    pub coordinate_issues: usize,
    pub degenerate_boxes: usize,
    pub unresolved_ids: usize,
    pub action_distribution: BTreeMap<u32, usize>,
}

impl DatasetSummary {
    pub fn is_clean(&self) -> bool {
        self.coordinate_issues == 0 && self.degenerate_boxes == 0 && self.unresolved_ids == 0
    }
}

pub fn summarize(records: &[Detection]) -> DatasetSummary {
    let mut summary = DatasetSummary {
        rows: records.len(),
        ..Default::default()
    };
    let mut videos = BTreeSet::new();

    for record in records {
        videos.insert(record.video_name.as_str());
        if !record.bbox.is_finite() || !record.bbox.is_normalized() {
            summary.coordinate_issues += 1;
        }
        if record.bbox.is_degenerate() {
            summary.degenerate_boxes += 1;
        }
        if !record.is_resolved() {
            summary.unresolved_ids += 1;
        }
        *summary
            .action_distribution
            .entry(record.action_label)
            .or_insert(0) += 1;
    }
    summary.videos = videos.len();

    if !summary.is_clean() {
        log::warn!(
            "Dataset issues: {} coordinate, {} degenerate, {} unresolved",
            summary.coordinate_issues,
            summary.degenerate_boxes,
            summary.unresolved_ids
        );
    }
    summary
}
