//! Record types flowing through matching, propagation and agreement scoring

use crate::bbox::Bbox;
use serde::{Deserialize, Serialize};

/// Sentinel for a person identity that has not been resolved yet
pub const UNRESOLVED_ID: i64 = -1;

/// One observed person box at one AVA frame slot of a video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub video_name: String,
    /// Video-local frame counter (one AVA "second" slot), not wall-clock time
    pub frame_index: u32,
    pub bbox: Bbox,
    pub action_label: u32,
    /// Negative (normally `-1`) when unresolved, otherwise an identity scoped
    /// to `video_name`
    pub person_id: i64,
}

/// Output of the box matcher; later mutated in place by identity propagation
pub type MatchedRecord = Detection;

impl Detection {
    /// Create a detection with an unresolved identity
    pub fn new(
        video_name: impl Into<String>,
        frame_index: u32,
        bbox: Bbox,
        action_label: u32,
    ) -> Self {
        Self {
            video_name: video_name.into(),
            frame_index,
            bbox,
            action_label,
            person_id: UNRESOLVED_ID,
        }
    }

    pub fn with_person_id(mut self, person_id: i64) -> Self {
        self.person_id = person_id;
        self
    }

    /// Any negative id counts as unresolved
    pub fn is_resolved(&self) -> bool {
        self.person_id >= 0
    }

    /// Short `video@frame` label used in log lines and errors
    pub fn position(&self) -> String {
        format!("{}@{}", self.video_name, self.frame_index)
    }
}

/// One annotator's labelled box, keyed by `(video_name, timestamp, person_id)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    pub video_name: String,
    pub timestamp: f64,
    pub bbox: Bbox,
    pub action_label: u32,
    pub person_id: i64,
}

impl AnnotationRecord {
    pub fn new(
        video_name: impl Into<String>,
        timestamp: f64,
        bbox: Bbox,
        action_label: u32,
        person_id: i64,
    ) -> Self {
        Self {
            video_name: video_name.into(),
            timestamp,
            bbox,
            action_label,
            person_id,
        }
    }
}
