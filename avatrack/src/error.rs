//! Error types for identity stitching

use thiserror::Error;

/// Result type alias for the stitching library
pub type Result<T> = std::result::Result<T, StitchError>;

/// Errors that can occur while stitching identities
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StitchError {
    /// Propagation requires records sorted by `(video_name, frame_index)`
    #[error("records out of order at index {index}: {current} follows {previous}")]
    InvalidInputOrder {
        index: usize,
        previous: String,
        current: String,
    },
}
