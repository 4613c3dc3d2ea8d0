//! Bounding box operations and IoU calculations

use serde::{Deserialize, Serialize};
use std::fmt;

/// Bounding box in normalized frame coordinates `[x1, y1, x2, y2]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bbox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl Bbox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn from_bounds(bounds: [f64; 4]) -> Self {
        Self::new(bounds[0], bounds[1], bounds[2], bounds[3])
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn center_x(&self) -> f64 {
        (self.x1 + self.x2) / 2.0
    }

    pub fn center_y(&self) -> f64 {
        (self.y1 + self.y2) / 2.0
    }

    /// Convert to bounds array [x1, y1, x2, y2]
    pub fn to_bounds(&self) -> [f64; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    /// All four coordinates are finite numbers
    pub fn is_finite(&self) -> bool {
        self.to_bounds().iter().all(|c| c.is_finite())
    }

    /// Zero or negative width/height
    pub fn is_degenerate(&self) -> bool {
        self.x1 >= self.x2 || self.y1 >= self.y2
    }

    /// All coordinates lie in `[0, 1]`
    pub fn is_normalized(&self) -> bool {
        self.to_bounds().iter().all(|c| (0.0..=1.0).contains(c))
    }

    /// Per-coordinate closeness test: every coordinate differs by strictly
    /// less than `tolerance`.
    ///
    /// This is an L∞ comparison, not an overlap measure. Non-finite
    /// coordinates never compare as close.
    pub fn within_tolerance(&self, other: &Bbox, tolerance: f64) -> bool {
        self.to_bounds()
            .iter()
            .zip(other.to_bounds().iter())
            .all(|(a, b)| (a - b).abs() < tolerance)
    }
}

impl fmt::Display for Bbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bbox({}, {}, {}, {})", self.x1, self.y1, self.x2, self.y2)
    }
}

/// Calculate IoU between two bounding boxes
///
/// No validation is performed; see [`crate::agreement::spatial_iou`] for the
/// checked variant used in agreement scoring.
pub fn calculate_iou(bbox1: &Bbox, bbox2: &Bbox) -> f64 {
    let x1 = bbox1.x1.max(bbox2.x1);
    let y1 = bbox1.y1.max(bbox2.y1);
    let x2 = bbox1.x2.min(bbox2.x2);
    let y2 = bbox1.y2.min(bbox2.y2);

    if x2 <= x1 || y2 <= y1 {
        return 0.0;
    }

    let intersection = (x2 - x1) * (y2 - y1);
    let union = bbox1.area() + bbox2.area() - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}
