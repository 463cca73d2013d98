//! Configuration loading
//!
//! Settings resolve in priority order:
//! 1. Command-line argument (highest)
//! 2. Environment variable (handled by clap's `env` feature in the binaries)
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! The binaries parse CLI/env through clap, load the TOML layer with
//! [`Config::load`], then overlay any explicitly provided values.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file looked up next to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "audiowise.toml";

/// Top-level configuration for all AudioWise binaries
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub pipeline: PipelineConfig,
    pub model: ModelConfig,
}

/// HTTP server settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Directory where uploads are staged before classification
    pub upload_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5750,
            upload_dir: PathBuf::from("uploads"),
        }
    }
}

/// Per-stage time limits for one pipeline invocation.
///
/// The spectral parameters themselves (sample rate, window, hop, mel bins)
/// are fixed constants in `features`; making them configurable would let
/// serving drift from training.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Decode + resample time limit, seconds
    pub decode_timeout_secs: u64,
    /// Spectrogram + normalization time limit, seconds
    pub feature_timeout_secs: u64,
    /// Network evaluation time limit, seconds
    pub inference_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            decode_timeout_secs: 30,
            feature_timeout_secs: 10,
            inference_timeout_secs: 30,
        }
    }
}

impl PipelineConfig {
    pub fn decode_timeout(&self) -> Duration {
        Duration::from_secs(self.decode_timeout_secs)
    }

    pub fn feature_timeout(&self) -> Duration {
        Duration::from_secs(self.feature_timeout_secs)
    }

    pub fn inference_timeout(&self) -> Duration {
        Duration::from_secs(self.inference_timeout_secs)
    }
}

/// Model and label-catalog locations
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// ONNX checkpoint path
    pub checkpoint: PathBuf,
    /// Manifest used to build the label catalog (mode A)
    pub manifest: PathBuf,
    /// Persisted label catalog; when set it is loaded verbatim instead of
    /// rebuilding from the manifest (mode B)
    pub labels: Option<PathBuf>,
    /// Input tensor name expected by the ONNX graph
    pub input_name: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            checkpoint: PathBuf::from("experiments/audiowise.onnx"),
            manifest: PathBuf::from("data/processed/specs/manifest.csv"),
            labels: None,
            input_name: "spectrogram".to_string(),
        }
    }
}

impl Config {
    /// Load the TOML layer.
    ///
    /// An explicitly given path must exist and parse; a missing default file
    /// just falls back to compiled defaults.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };

        if !path.exists() {
            if required {
                return Err(Error::Configuration(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            return Ok(Config::default());
        }

        let raw = std::fs::read_to_string(&path)?;
        toml::from_str(&raw).map_err(|e| {
            Error::Configuration(format!("invalid config file {}: {}", path.display(), e))
        })
    }
}
