//! Classify one audio clip from the command line.
//!
//! Uses the same model, catalog and pipeline wiring as the server, so a
//! clip classified here and one classified over HTTP always agree.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use audiowise_common::config::Config;
use audiowise_common::{FeaturePipeline, InferenceContext, OnnxClassifier};
use audiowise_cs::load_catalog;

/// Command-line arguments for classify
#[derive(Parser, Debug)]
#[command(name = "classify")]
#[command(about = "Classify a single audio clip")]
#[command(version)]
struct Args {
    /// Audio file to classify
    audio: PathBuf,

    /// Configuration file (TOML)
    #[arg(short, long, env = "AUDIOWISE_CONFIG")]
    config: Option<PathBuf>,

    /// ONNX checkpoint path (overrides configuration)
    #[arg(long, env = "AUDIOWISE_MODEL")]
    model: Option<PathBuf>,

    /// Label catalog JSON (overrides configuration)
    #[arg(long, env = "AUDIOWISE_LABELS")]
    labels: Option<PathBuf>,

    /// Training manifest used to derive labels when no catalog file exists
    #[arg(long, env = "AUDIOWISE_MANIFEST")]
    manifest: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "audiowise_common=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(model) = args.model {
        config.model.checkpoint = model;
    }
    if let Some(labels) = args.labels {
        config.model.labels = Some(labels);
    }
    if let Some(manifest) = args.manifest {
        config.model.manifest = manifest;
    }

    let catalog = load_catalog(&config).context("Failed to build label catalog")?;
    let classifier = OnnxClassifier::load(&config.model.checkpoint, &config.model.input_name)
        .context("Failed to load model checkpoint")?;
    let pipeline = Arc::new(FeaturePipeline::new(&config.pipeline));
    let context = InferenceContext::new(pipeline, catalog, Arc::new(classifier))
        .context("Model and label catalog disagree")?;

    let prediction = context
        .classify_file(args.audio.clone())
        .await
        .with_context(|| format!("Failed to classify {}", args.audio.display()))?;

    println!(
        "Predicted: {} ({:.1}% confidence)",
        prediction.label, prediction.confidence
    );
    Ok(())
}
