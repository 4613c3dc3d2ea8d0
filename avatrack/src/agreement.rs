//! Inter-annotator agreement scoring
//!
//! Compares two finished annotation sets by joining rows on
//! `(video_name, timestamp, person_id)` and scoring each joined pair by
//! spatial IoU and action-label equality. Rows present in only one set are
//! left out of the report rather than counted as disagreement.

use crate::bbox::{calculate_iou, Bbox};
use crate::records::AnnotationRecord;
use ndarray::Array1;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub const DEFAULT_MIN_IOU_THRESHOLD: f64 = 0.5;

/// Closed-open time interval `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub start: f64,
    pub end: f64,
}

impl Interval {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

fn is_scorable(bbox: &Bbox) -> bool {
    if !bbox.is_finite() || bbox.is_degenerate() {
        return false;
    }
    if !bbox.is_normalized() {
        log::warn!("Bounding box coordinates outside [0,1]: {}", bbox);
    }
    true
}

/// Intersection over union of two boxes, in `[0, 1]`
///
/// Degenerate (`x1 >= x2` or `y1 >= y2`) or non-finite boxes score `0.0`.
pub fn spatial_iou(box_a: &Bbox, box_b: &Bbox) -> f64 {
    if !is_scorable(box_a) || !is_scorable(box_b) {
        log::warn!("Invalid bounding box: {} or {}", box_a, box_b);
        return 0.0;
    }
    calculate_iou(box_a, box_b).clamp(0.0, 1.0)
}

/// Intersection over union of two time intervals, in `[0, 1]`
pub fn temporal_iou(a: Interval, b: Interval) -> f64 {
    let valid = |i: &Interval| i.start.is_finite() && i.end.is_finite() && i.start < i.end;
    if !valid(&a) || !valid(&b) {
        log::warn!(
            "Invalid temporal interval: [{}, {}] or [{}, {}]",
            a.start,
            a.end,
            b.start,
            b.end
        );
        return 0.0;
    }

    let start = a.start.max(b.start);
    let end = a.end.min(b.end);
    if start >= end {
        return 0.0;
    }

    let intersection = end - start;
    let union = a.duration() + b.duration() - intersection;
    if union > 0.0 {
        (intersection / union).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Element-wise spatial IoU of two equally long box lists
///
/// Lists of different length yield an empty result.
pub fn batch_spatial_iou(boxes_a: &[Bbox], boxes_b: &[Bbox]) -> Vec<f64> {
    if boxes_a.len() != boxes_b.len() {
        log::warn!(
            "Mismatched box counts: {} vs {}",
            boxes_a.len(),
            boxes_b.len()
        );
        return Vec::new();
    }
    boxes_a
        .par_iter()
        .zip(boxes_b.par_iter())
        .map(|(a, b)| spatial_iou(a, b))
        .collect()
}

/// Agreement scoring parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgreementConfig {
    /// Pairs at or above this IoU count as high agreement; pairs below it
    /// are kept for manual review
    pub min_iou_threshold: f64,
}

impl Default for AgreementConfig {
    fn default() -> Self {
        Self {
            min_iou_threshold: DEFAULT_MIN_IOU_THRESHOLD,
        }
    }
}

/// One joined pair of annotations
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgreementSample {
    pub video_name: String,
    pub timestamp: f64,
    pub person_id: i64,
    pub spatial_iou: f64,
    pub label_match: bool,
    pub box_a: Bbox,
    pub box_b: Bbox,
}

/// Aggregate agreement between two annotation sets
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AgreementReport {
    pub mean_spatial_iou: f64,
    pub median_spatial_iou: f64,
    pub std_spatial_iou: f64,
    pub label_accuracy: f64,
    pub total_matches: usize,
    pub high_iou_matches: usize,
    pub low_iou_samples: Vec<AgreementSample>,
}

/// Low-agreement pair flagged for manual review
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewSample {
    #[serde(flatten)]
    pub sample: AgreementSample,
    pub annotator_pair: String,
    pub needs_review: bool,
}

type JoinKey<'a> = (&'a str, u64, i64);

fn join_key(record: &AnnotationRecord) -> JoinKey<'_> {
    // +0.0 folds -0.0 into 0.0 so both hash alike
    (
        record.video_name.as_str(),
        (record.timestamp + 0.0).to_bits(),
        record.person_id,
    )
}

fn median(mut values: Vec<f64>) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Scores agreement between annotation sets
#[derive(Debug, Clone, Default)]
pub struct AgreementScorer {
    config: AgreementConfig,
}

impl AgreementScorer {
    pub fn new(config: AgreementConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AgreementConfig {
        &self.config
    }

    /// Join `set_a` with `set_b` and summarize the joined pairs
    ///
    /// With `video_filter`, both sets are restricted to that video first.
    /// The first matching row of `set_b` is used for each row of `set_a`.
    pub fn annotation_agreement(
        &self,
        set_a: &[AnnotationRecord],
        set_b: &[AnnotationRecord],
        video_filter: Option<&str>,
    ) -> AgreementReport {
        let keep = |record: &&AnnotationRecord| {
            video_filter.map_or(true, |video| record.video_name == video)
        };

        let mut index: HashMap<JoinKey<'_>, &AnnotationRecord> = HashMap::new();
        for record in set_b.iter().filter(keep) {
            if !record.timestamp.is_finite() {
                log::warn!(
                    "Skipping annotation of {} with invalid timestamp {}",
                    record.video_name,
                    record.timestamp
                );
                continue;
            }
            index.entry(join_key(record)).or_insert(record);
        }

        let samples: Vec<AgreementSample> = set_a
            .iter()
            .filter(keep)
            .filter_map(|row_a| {
                if !row_a.timestamp.is_finite() {
                    log::warn!(
                        "Skipping annotation of {} with invalid timestamp {}",
                        row_a.video_name,
                        row_a.timestamp
                    );
                    return None;
                }
                let row_b = index.get(&join_key(row_a))?;
                if !row_a.bbox.is_finite() || !row_b.bbox.is_finite() {
                    log::warn!(
                        "Excluding {}@{} person {}: malformed box {} / {}",
                        row_a.video_name,
                        row_a.timestamp,
                        row_a.person_id,
                        row_a.bbox,
                        row_b.bbox
                    );
                    return None;
                }
                Some(AgreementSample {
                    video_name: row_a.video_name.clone(),
                    timestamp: row_a.timestamp,
                    person_id: row_a.person_id,
                    spatial_iou: spatial_iou(&row_a.bbox, &row_b.bbox),
                    label_match: row_a.action_label == row_b.action_label,
                    box_a: row_a.bbox,
                    box_b: row_b.bbox,
                })
            })
            .collect();

        self.summarize(samples)
    }

    fn summarize(&self, samples: Vec<AgreementSample>) -> AgreementReport {
        if samples.is_empty() {
            log::warn!("No matching annotations found");
            return AgreementReport::default();
        }

        let threshold = self.config.min_iou_threshold;
        let scores: Array1<f64> = samples.iter().map(|s| s.spatial_iou).collect();
        let total = samples.len();
        let label_hits = samples.iter().filter(|s| s.label_match).count();

        let report = AgreementReport {
            mean_spatial_iou: scores.mean().unwrap_or(0.0),
            median_spatial_iou: median(scores.to_vec()),
            std_spatial_iou: scores.std(0.0),
            label_accuracy: label_hits as f64 / total as f64,
            total_matches: total,
            high_iou_matches: scores.iter().filter(|&&iou| iou >= threshold).count(),
            low_iou_samples: samples
                .into_iter()
                .filter(|s| s.spatial_iou < threshold)
                .collect(),
        };

        log::info!(
            "Agreement analysis complete: {} matches found",
            report.total_matches
        );
        report
    }

    /// Pairwise agreement for every unordered pair of annotators
    ///
    /// Pairs are keyed `"{a}_vs_{b}"` with `a` ordered before `b`.
    pub fn multi_annotator_agreement(
        &self,
        annotations: &BTreeMap<String, Vec<AnnotationRecord>>,
        video_filter: Option<&str>,
    ) -> BTreeMap<String, AgreementReport> {
        let names: Vec<&String> = annotations.keys().collect();
        let mut results = BTreeMap::new();

        for (i, first) in names.iter().enumerate() {
            for second in &names[i + 1..] {
                let key = format!("{}_vs_{}", first, second);
                log::debug!("Scoring annotator pair {}", key);
                let report = self.annotation_agreement(
                    &annotations[*first],
                    &annotations[*second],
                    video_filter,
                );
                results.insert(key, report);
            }
        }
        results
    }
}

/// Collect every low-IoU pair across annotator pairs for review
pub fn problematic_samples(pairwise: &BTreeMap<String, AgreementReport>) -> Vec<ReviewSample> {
    pairwise
        .iter()
        .flat_map(|(pair, report)| {
            report.low_iou_samples.iter().map(move |sample| ReviewSample {
                sample: sample.clone(),
                annotator_pair: pair.clone(),
                needs_review: true,
            })
        })
        .collect()
}
