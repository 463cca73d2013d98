//! Classification server (audiowise-cs) - Main entry point
//!
//! Loads the model checkpoint and label catalog, wires them to the shared
//! feature pipeline, and serves upload classification over HTTP.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use audiowise_common::config::Config;
use audiowise_common::{Classify, FeaturePipeline, InferenceContext, OnnxClassifier};
use audiowise_cs::{build_router, load_catalog, AppState};

/// Command-line arguments for audiowise-cs
#[derive(Parser, Debug)]
#[command(name = "audiowise-cs")]
#[command(about = "Environmental sound classification server")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "AUDIOWISE_PORT")]
    port: Option<u16>,

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
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "audiowise_cs=debug,audiowise_common=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(model) = args.model {
        config.model.checkpoint = model;
    }
    if let Some(labels) = args.labels {
        config.model.labels = Some(labels);
    }
    if let Some(manifest) = args.manifest {
        config.model.manifest = manifest;
    }

    info!(
        "Starting AudioWise classification server on port {}",
        config.server.port
    );

    // Everything the pipeline depends on is validated here; a bad
    // deployment must fail before the socket is bound.
    let catalog = load_catalog(&config).context("Failed to build label catalog")?;
    info!(labels = catalog.len(), "Label catalog ready");

    let classifier = OnnxClassifier::load(&config.model.checkpoint, &config.model.input_name)
        .context("Failed to load model checkpoint")?;
    info!(
        checkpoint = %config.model.checkpoint.display(),
        classes = classifier.output_dim(),
        "Model loaded"
    );

    let pipeline = Arc::new(FeaturePipeline::new(&config.pipeline));
    let inference = InferenceContext::new(pipeline, catalog, Arc::new(classifier))
        .context("Model and label catalog disagree")?;

    std::fs::create_dir_all(&config.server.upload_dir).with_context(|| {
        format!(
            "Failed to create upload directory {}",
            config.server.upload_dir.display()
        )
    })?;

    let state = AppState::new(Arc::new(inference), config.server.upload_dir.clone());
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid bind address")?;

    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
