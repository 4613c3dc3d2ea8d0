//! CSV codecs for detection and annotation tables
//!
//! Detection rows: `video_name, frame_idx, x1, y1, x2, y2, action_label[, person_id]`.
//! Identity rows (tracker export): `video_name, frame_idx, x1, y1, x2, y2, person_id`.
//! Annotation rows: `video_name, timestamp, x1, y1, x2, y2, action_label, person_id`.
//!
//! A leading `video_name` cell marks a header row, which is skipped. Rows
//! that are too short or hold non-numeric fields are skipped with a warning;
//! only a missing file is an error.

use crate::error::{DatasetError, Result};
use avatrack::{AnnotationRecord, Bbox, Detection, UNRESOLVED_ID};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

pub const DETECTION_HEADER: [&str; 8] = [
    "video_name",
    "frame_idx",
    "x1",
    "y1",
    "x2",
    "y2",
    "action_label",
    "person_id",
];

pub const ANNOTATION_HEADER: [&str; 8] = [
    "video_name",
    "timestamp",
    "x1",
    "y1",
    "x2",
    "y2",
    "action_label",
    "person_id",
];

pub const IDENTITY_HEADER: [&str; 7] = [
    "video_name",
    "frame_idx",
    "x1",
    "y1",
    "x2",
    "y2",
    "person_id",
];

const DETECTION_MIN_COLUMNS: usize = 7;
const IDENTITY_MIN_COLUMNS: usize = 7;
const ANNOTATION_MIN_COLUMNS: usize = 8;

/// Why a single row was rejected
#[derive(Error, Debug)]
enum RowError {
    #[error("expected at least {expected} columns, found {found}")]
    TooShort { expected: usize, found: usize },

    #[error("invalid {field}: {value:?}")]
    InvalidField { field: &'static str, value: String },
}

type RowResult<T> = std::result::Result<T, RowError>;

/// Rows parsed from one CSV file
#[derive(Debug, Clone, Default)]
pub struct Loaded<T> {
    pub records: Vec<T>,
    /// Rows rejected as malformed
    pub skipped: usize,
    /// Whether the file started with a header row
    pub had_header: bool,
}

fn field<T: FromStr>(row: &StringRecord, index: usize, name: &'static str) -> RowResult<T> {
    let raw = row.get(index).unwrap_or_default();
    raw.trim().parse().map_err(|_| RowError::InvalidField {
        field: name,
        value: raw.to_string(),
    })
}

fn ensure_columns(row: &StringRecord, expected: usize) -> RowResult<()> {
    if row.len() < expected {
        return Err(RowError::TooShort {
            expected,
            found: row.len(),
        });
    }
    Ok(())
}

fn parse_bbox(row: &StringRecord) -> RowResult<Bbox> {
    Ok(Bbox::new(
        field(row, 2, "x1")?,
        field(row, 3, "y1")?,
        field(row, 4, "x2")?,
        field(row, 5, "y2")?,
    ))
}

fn parse_detection(row: &StringRecord) -> RowResult<Detection> {
    ensure_columns(row, DETECTION_MIN_COLUMNS)?;
    let person_id = match row.get(7) {
        Some(raw) if !raw.trim().is_empty() => field(row, 7, "person_id")?,
        _ => UNRESOLVED_ID,
    };
    Ok(Detection {
        video_name: row[0].to_string(),
        // Integer parse: zero-padded "0005" and "5" are the same frame
        frame_index: field(row, 1, "frame_idx")?,
        bbox: parse_bbox(row)?,
        action_label: field(row, 6, "action_label")?,
        person_id,
    })
}

/// Tracker rows carry the 1-based identity where detections carry the action
fn parse_identity_detection(row: &StringRecord) -> RowResult<Detection> {
    ensure_columns(row, IDENTITY_MIN_COLUMNS)?;
    Ok(Detection {
        video_name: row[0].to_string(),
        frame_index: field(row, 1, "frame_idx")?,
        bbox: parse_bbox(row)?,
        action_label: 0,
        person_id: field(row, 6, "person_id")?,
    })
}

fn parse_annotation(row: &StringRecord) -> RowResult<AnnotationRecord> {
    ensure_columns(row, ANNOTATION_MIN_COLUMNS)?;
    Ok(AnnotationRecord {
        video_name: row[0].to_string(),
        timestamp: field(row, 1, "timestamp")?,
        bbox: parse_bbox(row)?,
        action_label: field(row, 6, "action_label")?,
        person_id: field(row, 7, "person_id")?,
    })
}

fn read_rows<R, T, F>(reader: R, source: &str, parse: F) -> Result<Loaded<T>>
where
    R: Read,
    F: Fn(&StringRecord) -> RowResult<T>,
{
    let mut csv_reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut loaded = Loaded {
        records: Vec::new(),
        skipped: 0,
        had_header: false,
    };

    for (row_index, row) in csv_reader.records().enumerate() {
        let row = row?;
        if row.get(0).map(str::trim) == Some("video_name") {
            if row_index == 0 {
                loaded.had_header = true;
            }
            continue;
        }
        match parse(&row) {
            Ok(record) => loaded.records.push(record),
            Err(err) => {
                log::warn!("{}: skipping row {}: {}", source, row_index + 1, err);
                loaded.skipped += 1;
            }
        }
    }

    log::info!(
        "Loaded {} rows from {} ({} skipped)",
        loaded.records.len(),
        source,
        loaded.skipped
    );
    Ok(loaded)
}

fn open_input(path: &Path) -> Result<fs::File> {
    if !path.exists() {
        return Err(DatasetError::MissingInput(path.to_path_buf()));
    }
    Ok(fs::File::open(path)?)
}

/// Read detection rows from any reader
pub fn read_detections_from<R: Read>(reader: R, source: &str) -> Result<Loaded<Detection>> {
    read_rows(reader, source, parse_detection)
}

/// Read a detection CSV
pub fn read_detections(path: &Path) -> Result<Loaded<Detection>> {
    let file = open_input(path)?;
    read_detections_from(file, &path.display().to_string())
}

/// Read tracker identity rows from any reader
pub fn read_identity_detections_from<R: Read>(
    reader: R,
    source: &str,
) -> Result<Loaded<Detection>> {
    read_rows(reader, source, parse_identity_detection)
}

/// Read the tracker's identity export (`train_personID.csv`)
pub fn read_identity_detections(path: &Path) -> Result<Loaded<Detection>> {
    let file = open_input(path)?;
    read_identity_detections_from(file, &path.display().to_string())
}

/// Read annotation rows from any reader
pub fn read_annotations_from<R: Read>(
    reader: R,
    source: &str,
) -> Result<Loaded<AnnotationRecord>> {
    read_rows(reader, source, parse_annotation)
}

/// Read an annotator's CSV export
pub fn read_annotations(path: &Path) -> Result<Loaded<AnnotationRecord>> {
    let file = open_input(path)?;
    read_annotations_from(file, &path.display().to_string())
}

/// Write detection rows, including `person_id`, to any writer
pub fn write_detections_to<W: Write>(
    writer: W,
    records: &[Detection],
    with_header: bool,
) -> Result<()> {
    let mut csv_writer = WriterBuilder::new().has_headers(false).from_writer(writer);
    if with_header {
        csv_writer.write_record(DETECTION_HEADER)?;
    }
    for record in records {
        csv_writer.write_record([
            record.video_name.clone(),
            record.frame_index.to_string(),
            record.bbox.x1.to_string(),
            record.bbox.y1.to_string(),
            record.bbox.x2.to_string(),
            record.bbox.y2.to_string(),
            record.action_label.to_string(),
            record.person_id.to_string(),
        ])?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Write a detection CSV, creating parent directories as needed
pub fn write_detections(path: &Path, records: &[Detection], with_header: bool) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let file = fs::File::create(path)?;
    write_detections_to(file, records, with_header)?;
    log::info!("Wrote {} rows to {}", records.len(), path.display());
    Ok(())
}
