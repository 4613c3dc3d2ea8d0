//! Configuration and report types for dataset preparation runs

use crate::error::{DatasetError, Result};
use avatrack::{AgreementConfig, AgreementReport, PropagationStats, ReviewSample};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Configuration for the match + propagate stitching run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Detections carrying tracker identities (1-based person ids)
    pub with_identity_path: PathBuf,
    /// Detections carrying action labels but no identities
    pub without_identity_path: PathBuf,
    /// Matched records before propagation; skipped when `None`
    pub intermediate_path: Option<PathBuf>,
    /// Final AVA annotation CSV
    pub output_path: PathBuf,
    /// Write a header row to the final CSV (the AVA loader expects none)
    pub write_header: bool,
    /// Generate a label map from the final records
    pub label_map_path: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            with_identity_path: PathBuf::from("train_personID.csv"),
            without_identity_path: PathBuf::from("train_without_personID.csv"),
            intermediate_path: Some(PathBuf::from("train_temp.csv")),
            output_path: PathBuf::from("annotations/train.csv"),
            write_header: false,
            label_map_path: None,
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from a JSON file; missing fields take defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(DatasetError::MissingInput(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would overwrite an input file
    pub fn validate(&self) -> Result<()> {
        let inputs = [&self.with_identity_path, &self.without_identity_path];
        let outputs = [
            Some(&self.output_path),
            self.intermediate_path.as_ref(),
            self.label_map_path.as_ref(),
        ];
        for output in outputs.into_iter().flatten() {
            if output.as_os_str().is_empty() {
                return Err(DatasetError::config("output path is empty"));
            }
            if inputs.contains(&output) {
                return Err(DatasetError::config(format!(
                    "output {} would overwrite an input file",
                    output.display()
                )));
            }
        }
        Ok(())
    }
}

/// Wall-clock time spent in each stitching stage
#[derive(Clone, Debug, Default, Serialize)]
pub struct PipelineTiming {
    pub load_ms: f32,
    pub match_ms: f32,
    pub propagate_ms: f32,
    pub write_ms: f32,
    pub total_ms: f32,
}

/// Summary of a stitching run
#[derive(Clone, Debug, Default, Serialize)]
pub struct PipelineReport {
    pub with_identity_rows: usize,
    pub without_identity_rows: usize,
    pub skipped_rows: usize,
    pub matched: usize,
    pub unmatched: usize,
    pub propagation: PropagationStats,
    pub output_rows: usize,
    pub label_count: Option<usize>,
    pub timing: PipelineTiming,
}

/// One annotator's export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatorInput {
    pub name: String,
    pub path: PathBuf,
}

impl std::str::FromStr for AnnotatorInput {
    type Err = DatasetError;

    /// Parse `name=path`
    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('=') {
            Some((name, path)) if !name.trim().is_empty() && !path.trim().is_empty() => Ok(Self {
                name: name.trim().to_string(),
                path: PathBuf::from(path.trim()),
            }),
            _ => Err(DatasetError::config(format!(
                "expected annotator as name=path, got {:?}",
                s
            ))),
        }
    }
}

/// Configuration for an inter-annotator agreement run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgreementRunConfig {
    pub annotators: Vec<AnnotatorInput>,
    pub video_filter: Option<String>,
    pub scoring: AgreementConfig,
    /// JSON report destination; skipped when `None`
    pub output_path: Option<PathBuf>,
}

impl AgreementRunConfig {
    pub fn validate(&self) -> Result<()> {
        if self.annotators.len() < 2 {
            return Err(DatasetError::config(format!(
                "agreement needs at least two annotators, got {}",
                self.annotators.len()
            )));
        }
        let mut names: Vec<&str> = self.annotators.iter().map(|a| a.name.as_str()).collect();
        names.sort_unstable();
        if let Some(pair) = names.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(DatasetError::config(format!(
                "duplicate annotator name {:?}",
                pair[0]
            )));
        }
        if !(0.0..=1.0).contains(&self.scoring.min_iou_threshold) {
            return Err(DatasetError::config(format!(
                "min_iou_threshold must be in [0, 1], got {}",
                self.scoring.min_iou_threshold
            )));
        }
        Ok(())
    }
}

/// Result of an agreement run
#[derive(Debug, Clone, Default, Serialize)]
pub struct AgreementRun {
    pub pairwise: BTreeMap<String, AgreementReport>,
    pub problematic_samples: Vec<ReviewSample>,
}
