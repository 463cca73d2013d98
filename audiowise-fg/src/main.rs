//! Feature generation job (audiowise-fg) - Main entry point
//!
//! Walks the dataset metadata, runs every clip through the shared feature
//! pipeline, writes one artifact per clip plus the manifest the training
//! stack consumes, and optionally persists the label catalog. A clip that
//! fails is logged and recorded with an empty spec_path; the job keeps
//! going so one broken file cannot sink a multi-hour run.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Deserialize;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use audiowise_common::artifact;
use audiowise_common::config::PipelineConfig;
use audiowise_common::manifest::{self, ManifestRecord};
use audiowise_common::pipeline::FeaturePipeline;
use audiowise_common::LabelCatalog;

/// Command-line arguments for audiowise-fg
#[derive(Parser, Debug)]
#[command(name = "audiowise-fg")]
#[command(about = "Generate training features for the AudioWise dataset")]
#[command(version)]
struct Args {
    /// Dataset metadata CSV with "Dataset File Name" and "Class Name" columns
    metadata: PathBuf,

    /// Directory containing the raw audio files
    #[arg(
        long,
        default_value = "data/raw/Audio Wise V1.0",
        env = "AUDIOWISE_AUDIO_DIR"
    )]
    audio_dir: PathBuf,

    /// Directory artifacts and the manifest are written to
    #[arg(long, default_value = "data/processed/specs", env = "AUDIOWISE_OUTPUT_DIR")]
    output_dir: PathBuf,

    /// Also persist the label catalog as JSON at this path
    #[arg(long, env = "AUDIOWISE_LABELS_OUT")]
    labels_out: Option<PathBuf>,
}

/// One input metadata row
#[derive(Debug, Deserialize)]
struct MetadataRow {
    #[serde(rename = "Dataset File Name")]
    file_name: String,
    #[serde(rename = "Class Name")]
    class_name: String,
}

/// Counters reported when the job finishes
#[derive(Debug, Default)]
struct JobSummary {
    total: usize,
    succeeded: usize,
    failed: usize,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "audiowise_fg=info,audiowise_common=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    run(&args)?;
    Ok(())
}

fn run(args: &Args) -> Result<JobSummary> {
    if args.metadata.extension().and_then(|e| e.to_str()) == Some("xlsx") {
        bail!(
            "Excel metadata is not supported; export {} to CSV first",
            args.metadata.display()
        );
    }

    let rows = read_metadata(&args.metadata)
        .with_context(|| format!("Failed to read metadata {}", args.metadata.display()))?;
    info!(
        rows = rows.len(),
        audio_dir = %args.audio_dir.display(),
        "feature generation starting"
    );

    std::fs::create_dir_all(&args.output_dir).with_context(|| {
        format!(
            "Failed to create output directory {}",
            args.output_dir.display()
        )
    })?;

    let pipeline = FeaturePipeline::new(&PipelineConfig::default());
    let started = Instant::now();
    let mut summary = JobSummary::default();
    let mut records = Vec::with_capacity(rows.len());

    for row in &rows {
        summary.total += 1;
        let spec_path = match process_clip(&pipeline, args, &row.file_name) {
            Ok(path) => {
                summary.succeeded += 1;
                debug!(file = %row.file_name, class = %row.class_name, "features written");
                path.to_string_lossy().into_owned()
            }
            Err(e) => {
                summary.failed += 1;
                warn!(file = %row.file_name, error = %e, "clip failed; continuing");
                String::new()
            }
        };
        records.push(ManifestRecord {
            file_name: row.file_name.clone(),
            class_name: row.class_name.clone(),
            spec_path,
        });
    }

    let manifest_path = args.output_dir.join("manifest.csv");
    manifest::write_manifest(&manifest_path, &records)
        .with_context(|| format!("Failed to write manifest {}", manifest_path.display()))?;

    if let Some(labels_out) = &args.labels_out {
        let catalog =
            LabelCatalog::from_manifest_classes(rows.iter().map(|r| r.class_name.clone()))
                .context("Failed to build label catalog")?;
        catalog
            .save(labels_out)
            .with_context(|| format!("Failed to write label catalog {}", labels_out.display()))?;
        info!(labels = catalog.len(), path = %labels_out.display(), "label catalog written");
    }

    info!(
        total = summary.total,
        succeeded = summary.succeeded,
        failed = summary.failed,
        elapsed_secs = started.elapsed().as_secs(),
        manifest = %manifest_path.display(),
        "feature generation complete"
    );
    Ok(summary)
}

fn read_metadata(path: &Path) -> Result<Vec<MetadataRow>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

/// Decode, extract and save one clip. Returns the artifact path the
/// manifest row should reference.
fn process_clip(pipeline: &FeaturePipeline, args: &Args, file_name: &str) -> Result<PathBuf> {
    let audio_path = args.audio_dir.join(file_name);
    let features = pipeline.features_from_file(&audio_path)?;
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);
    let artifact_path = args.output_dir.join(format!("{stem}.pickle"));
    artifact::save_features(&artifact_path, &features)?;
    Ok(artifact_path)
}
