/// AVA dataset stitching CLI
///
/// Usage:
///   ava-stitch stitch --config stitch.json
///   ava-stitch match --with-identity train_personID.csv --without-identity train_without_personID.csv --output train_temp.csv
///   ava-stitch propagate --input train_temp.csv --output annotations/train.csv
///   ava-stitch agreement --annotator alice=alice.csv --annotator bob=bob.csv --output report.json
///   ava-stitch label-map --input annotations/train.csv --output annotations/label_map.txt
///   ava-stitch zero-based --csv annotations/train.csv --label-map annotations/label_map.txt
///   ava-stitch validate --input annotations/train.csv
use ava_dataset::csv_io::read_detections;
use ava_dataset::pipeline::{
    convert_to_zero_based, label_map_from_file, match_files, propagate_file, run_agreement,
    StitchPipeline,
};
use ava_dataset::{summarize, AgreementRunConfig, AnnotatorInput, PipelineConfig};
use avatrack::AgreementConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "ava-stitch")]
#[command(version, about = "Person identity stitching for custom AVA datasets", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Match identities across sources, then propagate them (full run)
    Stitch {
        /// JSON configuration file; flags below override its fields
        #[arg(long)]
        config: Option<PathBuf>,

        /// Detections carrying tracker identities
        #[arg(long)]
        with_identity: Option<PathBuf>,

        /// Detections carrying action labels only
        #[arg(long)]
        without_identity: Option<PathBuf>,

        /// Intermediate matched table
        #[arg(long)]
        intermediate: Option<PathBuf>,

        /// Final annotation CSV
        #[arg(long)]
        output: Option<PathBuf>,

        /// Write a header row to the final CSV
        #[arg(long)]
        header: bool,

        /// Also write a label map here
        #[arg(long)]
        label_map: Option<PathBuf>,
    },

    /// Match identities across sources only
    #[command(arg_required_else_help = true)]
    Match {
        #[arg(long)]
        with_identity: PathBuf,

        #[arg(long)]
        without_identity: PathBuf,

        #[arg(long)]
        output: PathBuf,
    },

    /// Sort a matched table and propagate identities
    #[command(arg_required_else_help = true)]
    Propagate {
        #[arg(long)]
        input: PathBuf,

        #[arg(long)]
        output: PathBuf,

        /// Write a header row
        #[arg(long)]
        header: bool,
    },

    /// Inter-annotator agreement over two or more exports
    #[command(arg_required_else_help = true)]
    Agreement {
        /// Annotator export as name=path; repeat for each annotator
        #[arg(long = "annotator", required = true)]
        annotators: Vec<AnnotatorInput>,

        /// Only compare this video
        #[arg(long)]
        video: Option<String>,

        /// IoU below which a pair is flagged for review
        #[arg(long, default_value_t = avatrack::agreement::DEFAULT_MIN_IOU_THRESHOLD)]
        min_iou: f64,

        /// JSON report destination
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Generate label_map.txt from a detection table
    #[command(arg_required_else_help = true)]
    LabelMap {
        #[arg(long)]
        input: PathBuf,

        #[arg(long)]
        output: PathBuf,

        /// Shift ids to start at 0
        #[arg(long)]
        zero_based: bool,
    },

    /// Shift action ids of CSVs and a label map to start at 0 (backups are kept)
    #[command(arg_required_else_help = true)]
    ZeroBased {
        #[arg(long = "csv")]
        csvs: Vec<PathBuf>,

        #[arg(long)]
        label_map: Option<PathBuf>,
    },

    /// Summarize an annotation table
    #[command(arg_required_else_help = true)]
    Validate {
        #[arg(long)]
        input: PathBuf,

        /// JSON report destination
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Stitch {
            config,
            with_identity,
            without_identity,
            intermediate,
            output,
            header,
            label_map,
        } => {
            let mut pipeline_config = match config {
                Some(path) => PipelineConfig::from_json_file(&path)?,
                None => PipelineConfig::default(),
            };
            if let Some(path) = with_identity {
                pipeline_config.with_identity_path = path;
            }
            if let Some(path) = without_identity {
                pipeline_config.without_identity_path = path;
            }
            if intermediate.is_some() {
                pipeline_config.intermediate_path = intermediate;
            }
            if let Some(path) = output {
                pipeline_config.output_path = path;
            }
            if header {
                pipeline_config.write_header = true;
            }
            if label_map.is_some() {
                pipeline_config.label_map_path = label_map;
            }

            let report = StitchPipeline::new(pipeline_config).run()?;
            println!("Matched:     {}", report.matched);
            println!("Unmatched:   {}", report.unmatched);
            println!("Skipped:     {}", report.skipped_rows);
            println!("Identities:  {} new", report.propagation.seeds);
            println!("Extended:    {}", report.propagation.propagated);
            println!("Total:       {} rows", report.output_rows);
            println!("Time:        {:.1}ms", report.timing.total_ms);
        }
        Commands::Match {
            with_identity,
            without_identity,
            output,
        } => {
            let outcome = match_files(&with_identity, &without_identity, &output)?;
            println!("Matched:   {}", outcome.matched);
            println!("Unmatched: {}", outcome.unmatched);
            println!("Total:     {}", outcome.records.len());
            println!("Results saved to: {}", output.display());
        }
        Commands::Propagate {
            input,
            output,
            header,
        } => {
            let stats = propagate_file(&input, &output, header)?;
            println!(
                "Processing complete! Updated {} entries ({} new identities)",
                stats.seeds + stats.propagated,
                stats.seeds
            );
            println!("Results saved to: {}", output.display());
        }
        Commands::Agreement {
            annotators,
            video,
            min_iou,
            output,
        } => {
            let run = run_agreement(&AgreementRunConfig {
                annotators,
                video_filter: video,
                scoring: AgreementConfig {
                    min_iou_threshold: min_iou,
                },
                output_path: output,
            })?;
            for (pair, report) in &run.pairwise {
                println!(
                    "{}: {} matches, mean IoU {:.3}, label accuracy {:.3}, {} high-IoU",
                    pair,
                    report.total_matches,
                    report.mean_spatial_iou,
                    report.label_accuracy,
                    report.high_iou_matches
                );
            }
            println!("{} samples need review", run.problematic_samples.len());
        }
        Commands::LabelMap {
            input,
            output,
            zero_based,
        } => {
            let label_map = label_map_from_file(&input, &output, zero_based)?;
            print!("{}", label_map.to_text());
            println!("Label map saved to: {}", output.display());
        }
        Commands::ZeroBased { csvs, label_map } => {
            if csvs.is_empty() && label_map.is_none() {
                anyhow::bail!("nothing to convert: pass --csv and/or --label-map");
            }
            convert_to_zero_based(&csvs, label_map.as_deref())?;
            println!("Converted {} CSV files to 0-based action ids", csvs.len());
        }
        Commands::Validate { input, output } => {
            let loaded = read_detections(&input)?;
            let summary = summarize(&loaded.records);
            let json = serde_json::to_string_pretty(&summary)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)?;
                    println!("Report saved to: {}", path.display());
                }
                None => println!("{}", json),
            }
            println!(
                "Rows: {} ({} malformed rows skipped), clean: {}",
                summary.rows,
                loaded.skipped,
                summary.is_clean()
            );
        }
    }

    Ok(())
}
