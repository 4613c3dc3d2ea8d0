/// Dataset preparation pipelines
///
/// Stitching runs in stages: load both detection tables, match identities
/// across them, write the intermediate table, sort and propagate
/// identities, then write the final annotation CSV (and optionally the
/// label map). Agreement runs load several annotator exports and score
/// every pair.
use crate::csv_io::{
    read_annotations, read_detections, read_identity_detections, write_detections,
};
use crate::error::Result;
use crate::label_map::{shift_action_labels_to_zero_based, LabelMap};
use crate::types::{
    AgreementRun, AgreementRunConfig, PipelineConfig, PipelineReport, PipelineTiming,
};
use avatrack::{
    problematic_samples, AgreementScorer, BoxMatcher, IdentityPropagator, MatchOutcome,
    PropagationStats,
};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

fn elapsed_ms(start: Instant) -> f32 {
    start.elapsed().as_secs_f32() * 1000.0
}

/// Match + propagate pipeline over two detection tables
pub struct StitchPipeline {
    config: PipelineConfig,
}

impl StitchPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run(&self) -> Result<PipelineReport> {
        self.config.validate()?;
        let start_total = Instant::now();
        let mut timing = PipelineTiming::default();

        // Stage 1: load
        let start = Instant::now();
        let with_identity = read_identity_detections(&self.config.with_identity_path)?;
        let without_identity = read_detections(&self.config.without_identity_path)?;
        timing.load_ms = elapsed_ms(start);

        // Stage 2: match identities across sources
        let start = Instant::now();
        let MatchOutcome {
            records: mut records,
            matched,
            unmatched,
        } = BoxMatcher::match_records(&with_identity.records, &without_identity.records);
        timing.match_ms = elapsed_ms(start);

        let start = Instant::now();
        if let Some(path) = &self.config.intermediate_path {
            write_detections(path, &records, true)?;
        }
        timing.write_ms = elapsed_ms(start);

        // Stage 3: sort, then propagate
        let start = Instant::now();
        let propagation = IdentityPropagator::sort_and_run(&mut records)?;
        timing.propagate_ms = elapsed_ms(start);

        // Stage 4: emit
        let start = Instant::now();
        write_detections(&self.config.output_path, &records, self.config.write_header)?;
        let label_count = match &self.config.label_map_path {
            Some(path) => {
                let label_map = LabelMap::from_records(&records)?;
                label_map.write(path)?;
                Some(label_map.len())
            }
            None => None,
        };
        timing.write_ms += elapsed_ms(start);
        timing.total_ms = elapsed_ms(start_total);

        log::info!(
            "Stitching complete in {:.1}ms: {} matched, {} unmatched, {} new identities",
            timing.total_ms,
            matched,
            unmatched,
            propagation.seeds
        );

        Ok(PipelineReport {
            with_identity_rows: with_identity.records.len(),
            without_identity_rows: without_identity.records.len(),
            skipped_rows: with_identity.skipped + without_identity.skipped,
            matched,
            unmatched,
            propagation,
            output_rows: records.len(),
            label_count,
            timing,
        })
    }
}

/// Match stage only: write matched records (with header) to `output`
pub fn match_files(
    with_identity_path: &Path,
    without_identity_path: &Path,
    output: &Path,
) -> Result<MatchOutcome> {
    let with_identity = read_identity_detections(with_identity_path)?;
    let without_identity = read_detections(without_identity_path)?;
    let outcome = BoxMatcher::match_records(&with_identity.records, &without_identity.records);
    write_detections(output, &outcome.records, true)?;
    Ok(outcome)
}

/// Propagation stage only: sort and resolve identities of a matched table
pub fn propagate_file(input: &Path, output: &Path, with_header: bool) -> Result<PropagationStats> {
    let mut records = read_detections(input)?.records;
    let stats = IdentityPropagator::sort_and_run(&mut records)?;
    write_detections(output, &records, with_header)?;
    Ok(stats)
}

/// Generate a label map from the action labels of a detection table
pub fn label_map_from_file(input: &Path, output: &Path, zero_based: bool) -> Result<LabelMap> {
    let records = read_detections(input)?.records;
    let mut label_map = LabelMap::from_records(&records)?;
    if zero_based {
        label_map = label_map.to_zero_based()?;
    }
    label_map.write(output)?;
    Ok(label_map)
}

/// `train.csv` -> `train_backup.csv`
pub fn backup_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}_backup.{}", stem, ext.to_string_lossy()),
        None => format!("{}_backup", stem),
    };
    path.with_file_name(name)
}

/// Rewrite detection tables and a label map with zero-based action ids
///
/// Each file is copied to its backup path before being rewritten. Header
/// presence of each CSV is preserved.
pub fn convert_to_zero_based(
    csv_paths: &[PathBuf],
    label_map_path: Option<&Path>,
) -> Result<()> {
    for path in csv_paths {
        let loaded = read_detections(path)?;
        let mut records = loaded.records;
        shift_action_labels_to_zero_based(&mut records)?;

        let backup = backup_path(path);
        fs::copy(path, &backup)?;
        log::info!("Backup created: {}", backup.display());
        write_detections(path, &records, loaded.had_header)?;
    }

    if let Some(path) = label_map_path {
        let zero_based = LabelMap::read(path)?.to_zero_based()?;
        let backup = backup_path(path);
        fs::copy(path, &backup)?;
        log::info!("Backup created: {}", backup.display());
        zero_based.write(path)?;
    }
    Ok(())
}

/// Score agreement between every pair of annotator exports
pub fn run_agreement(config: &AgreementRunConfig) -> Result<AgreementRun> {
    config.validate()?;

    let mut annotations = BTreeMap::new();
    for annotator in &config.annotators {
        let loaded = read_annotations(&annotator.path)?;
        annotations.insert(annotator.name.clone(), loaded.records);
    }

    let scorer = AgreementScorer::new(config.scoring);
    let pairwise =
        scorer.multi_annotator_agreement(&annotations, config.video_filter.as_deref());
    let run = AgreementRun {
        problematic_samples: problematic_samples(&pairwise),
        pairwise,
    };

    if let Some(path) = &config.output_path {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        serde_json::to_writer_pretty(fs::File::create(path)?, &run)?;
        log::info!("Agreement report saved to {}", path.display());
    }
    Ok(run)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csv_io::{ANNOTATION_HEADER, DETECTION_HEADER, IDENTITY_HEADER};
    use crate::error::DatasetError;
    use crate::types::AnnotatorInput;
    use approx::assert_abs_diff_eq;
    use avatrack::AgreementConfig;
    use tempfile::tempdir;

    // Tracker export: person id in the seventh column, numbered from 1
    const WITH_IDENTITY: &str = "v1,1,0.1,0.1,0.3,0.5,1\n\
                                 v1,1,0.6,0.1,0.8,0.5,2\n\
                                 v1,2,0.1,0.1,0.3,0.5,1\n";

    const WITHOUT_IDENTITY: &str = "v1,2,0.1,0.1,0.3,0.5,7\n\
                                    v1,1,0.1,0.1,0.3,0.5,1\n\
                                    v1,1,0.6,0.1,0.8,0.5,12\n\
                                    v1,3,0.4,0.4,0.5,0.6,1\n\
                                    v1,4,0.401,0.4,0.5,0.6,1\n\
                                    v2,1,0.1,0.1,0.2,0.2,1\n";

    fn stitch_config(dir: &Path) -> PipelineConfig {
        let with_identity_path = dir.join("train_personID.csv");
        let without_identity_path = dir.join("train_without_personID.csv");
        fs::write(&with_identity_path, WITH_IDENTITY).unwrap();
        fs::write(
            &without_identity_path,
            format!("{}\n{}", DETECTION_HEADER[..7].join(","), WITHOUT_IDENTITY),
        )
        .unwrap();

        PipelineConfig {
            with_identity_path,
            without_identity_path,
            intermediate_path: Some(dir.join("train_temp.csv")),
            output_path: dir.join("annotations").join("train.csv"),
            write_header: false,
            label_map_path: Some(dir.join("annotations").join("label_map.txt")),
        }
    }

    #[test]
    fn test_stitch_pipeline_end_to_end() {
        let dir = tempdir().unwrap();
        let config = stitch_config(dir.path());

        let report = StitchPipeline::new(config.clone()).run().unwrap();
        assert_eq!(report.with_identity_rows, 3);
        assert_eq!(report.without_identity_rows, 6);
        assert_eq!(report.skipped_rows, 0);
        assert_eq!(report.matched, 3);
        assert_eq!(report.unmatched, 3);
        assert_eq!(report.propagation.videos, 2);
        assert_eq!(report.propagation.seeds, 2);
        assert_eq!(report.propagation.propagated, 1);
        assert_eq!(report.propagation.already_resolved, 3);
        assert_eq!(report.output_rows, 6);
        assert_eq!(report.label_count, Some(3));

        // Intermediate table keeps input order and carries a header
        let intermediate = read_detections(config.intermediate_path.as_ref().unwrap()).unwrap();
        assert!(intermediate.had_header);
        let ids: Vec<i64> = intermediate.records.iter().map(|r| r.person_id).collect();
        assert_eq!(ids, vec![0, 0, 1, -1, -1, -1]);

        let output = read_detections(&config.output_path).unwrap();
        assert!(!output.had_header);
        let positions: Vec<(String, u32, i64)> = output
            .records
            .iter()
            .map(|r| (r.video_name.clone(), r.frame_index, r.person_id))
            .collect();
        assert_eq!(
            positions,
            vec![
                ("v1".to_string(), 1, 0),
                ("v1".to_string(), 1, 1),
                ("v1".to_string(), 2, 0),
                ("v1".to_string(), 3, 2),
                ("v1".to_string(), 4, 2),
                ("v2".to_string(), 1, 0),
            ]
        );

        let label_map = fs::read_to_string(config.label_map_path.as_ref().unwrap()).unwrap();
        assert_eq!(
            label_map,
            "1: normal_walk\n7: multiple_items\n12: slow_walk\n"
        );
    }

    #[test]
    fn test_stages_match_full_run() {
        let dir = tempdir().unwrap();
        let config = stitch_config(dir.path());
        let matched_path = dir.path().join("matched.csv");
        let final_path = dir.path().join("final.csv");

        let outcome = match_files(
            &config.with_identity_path,
            &config.without_identity_path,
            &matched_path,
        )
        .unwrap();
        assert_eq!(outcome.matched, 3);

        let stats = propagate_file(&matched_path, &final_path, true).unwrap();
        assert_eq!(stats.seeds, 2);

        StitchPipeline::new(config.clone()).run().unwrap();
        let staged = read_detections(&final_path).unwrap();
        let full = read_detections(&config.output_path).unwrap();
        assert!(staged.had_header);
        assert_eq!(staged.records, full.records);
    }

    #[test]
    fn test_tracker_export_yields_non_negative_ids() {
        let dir = tempdir().unwrap();
        let mut config = stitch_config(dir.path());
        fs::write(
            &config.with_identity_path,
            format!(
                "{}\nv1,1,0.1,0.1,0.3,0.5,1\nv1,1,0.6,0.1,0.8,0.5,2\nv1,2,0.1,0.1,0.3,0.5,-1\n",
                IDENTITY_HEADER.join(",")
            ),
        )
        .unwrap();
        fs::write(
            &config.without_identity_path,
            "v1,1,0.1,0.1,0.3,0.5,1\nv1,1,0.6,0.1,0.8,0.5,12\nv1,2,0.1,0.1,0.3,0.5,7\n",
        )
        .unwrap();
        config.label_map_path = None;

        let report = StitchPipeline::new(config.clone()).run().unwrap();
        assert_eq!(report.matched, 2);

        let output = read_detections(&config.output_path).unwrap();
        let ids: Vec<i64> = output.records.iter().map(|r| r.person_id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert!(ids.iter().all(|&id| id >= 0));
    }

    #[test]
    fn test_missing_input_is_reported() {
        let dir = tempdir().unwrap();
        let config = PipelineConfig {
            with_identity_path: dir.path().join("absent.csv"),
            output_path: dir.path().join("train.csv"),
            intermediate_path: None,
            ..Default::default()
        };

        let err = StitchPipeline::new(config).run().unwrap_err();
        assert!(matches!(err, DatasetError::MissingInput(path) if path.ends_with("absent.csv")));
        assert!(!dir.path().join("train.csv").exists());
    }

    #[test]
    fn test_agreement_run_writes_report() {
        let dir = tempdir().unwrap();
        let header = ANNOTATION_HEADER.join(",");
        let alice = dir.path().join("alice.csv");
        let bob = dir.path().join("bob.csv");
        fs::write(
            &alice,
            format!(
                "{}\nv,1.0,0.1,0.1,0.5,0.5,1,0\nv,2.0,0.1,0.1,0.5,0.5,1,0\n",
                header
            ),
        )
        .unwrap();
        fs::write(
            &bob,
            format!(
                "{}\nv,1.0,0.1,0.1,0.5,0.5,1,0\nv,2.0,0.3,0.1,0.7,0.5,7,0\n",
                header
            ),
        )
        .unwrap();
        let report_path = dir.path().join("reports").join("agreement.json");

        let run = run_agreement(&AgreementRunConfig {
            annotators: vec![
                AnnotatorInput {
                    name: "bob".to_string(),
                    path: bob,
                },
                AnnotatorInput {
                    name: "alice".to_string(),
                    path: alice,
                },
            ],
            video_filter: None,
            scoring: AgreementConfig::default(),
            output_path: Some(report_path.clone()),
        })
        .unwrap();

        let report = &run.pairwise["alice_vs_bob"];
        assert_eq!(report.total_matches, 2);
        assert_eq!(report.high_iou_matches, 1);
        assert_abs_diff_eq!(report.label_accuracy, 0.5, epsilon = 1e-9);
        assert_abs_diff_eq!(report.mean_spatial_iou, 2.0 / 3.0, epsilon = 1e-9);
        assert_eq!(run.problematic_samples.len(), 1);
        assert_eq!(run.problematic_samples[0].annotator_pair, "alice_vs_bob");

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&report_path).unwrap()).unwrap();
        assert_eq!(json["pairwise"]["alice_vs_bob"]["total_matches"], 2);
        assert_eq!(json["problematic_samples"][0]["needs_review"], true);
    }

    #[test]
    fn test_zero_based_conversion_keeps_backups() {
        let dir = tempdir().unwrap();
        let csv_path = dir.path().join("train.csv");
        let map_path = dir.path().join("label_map.txt");
        let original = format!(
            "{}\nv,1,0.1,0.1,0.3,0.5,1,0\nv,2,0.1,0.1,0.3,0.5,7,0\n",
            DETECTION_HEADER.join(",")
        );
        fs::write(&csv_path, &original).unwrap();
        fs::write(&map_path, "1: normal_walk\n7: multiple_items\n").unwrap();

        convert_to_zero_based(&[csv_path.clone()], Some(map_path.as_path())).unwrap();

        assert_eq!(
            fs::read_to_string(dir.path().join("train_backup.csv")).unwrap(),
            original
        );
        let converted = read_detections(&csv_path).unwrap();
        assert!(converted.had_header);
        let labels: Vec<u32> = converted.records.iter().map(|r| r.action_label).collect();
        assert_eq!(labels, vec![0, 6]);

        assert_eq!(
            fs::read_to_string(&map_path).unwrap(),
            "0: normal_walk\n6: multiple_items\n"
        );
        assert!(dir.path().join("label_map_backup.txt").exists());
    }

    #[test]
    fn test_zero_based_rejects_label_zero() {
        let dir = tempdir().unwrap();
        let csv_path = dir.path().join("train.csv");
        fs::write(&csv_path, "v,1,0.1,0.1,0.3,0.5,0,0\n").unwrap();

        assert!(convert_to_zero_based(&[csv_path.clone()], None).is_err());
        assert!(!dir.path().join("train_backup.csv").exists());
    }

    #[test]
    fn test_backup_path() {
        assert_eq!(
            backup_path(Path::new("annotations/train.csv")),
            PathBuf::from("annotations/train_backup.csv")
        );
        assert_eq!(
            backup_path(Path::new("label_map")),
            PathBuf::from("label_map_backup")
        );
    }
}
