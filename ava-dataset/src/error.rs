//! Error types for the AVA dataset preparation library

use avatrack::StitchError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for the dataset library
pub type Result<T> = std::result::Result<T, DatasetError>;

/// Errors that can occur while preparing dataset files
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Input file not found: {}", .0.display())]
    MissingInput(PathBuf),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Identity stitching failed: {0}")]
    StitchError(#[from] StitchError),

    #[error("No valid action labels found")]
    NoActionLabels,

    #[error("Invalid label: {0}")]
    InvalidLabel(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl DatasetError {
    pub fn invalid_label<S: Into<String>>(msg: S) -> Self {
        Self::InvalidLabel(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::ConfigError(msg.into())
    }
}
