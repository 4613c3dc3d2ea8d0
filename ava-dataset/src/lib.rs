//! AVA Dataset Preparation Library
//!
//! File-level plumbing around the `avatrack` algorithms: CSV codecs for
//! detection and annotation tables, label maps, dataset validation and the
//! stitching / agreement pipelines driven by the `ava-stitch` binary.

pub mod csv_io;
pub mod error;
pub mod label_map;
pub mod pipeline;
pub mod types;
pub mod validation;

pub use error::{DatasetError, Result};
pub use label_map::LabelMap;
pub use pipeline::{run_agreement, StitchPipeline};
pub use types::{
    AgreementRun, AgreementRunConfig, AnnotatorInput, PipelineConfig, PipelineReport,
    PipelineTiming,
};
pub use validation::{summarize, DatasetSummary};

/// Get library version information
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
