//! Common error types for AudioWise

use thiserror::Error;

/// Common result type for AudioWise operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by the serving and batch paths.
///
/// `Configuration` is fatal at startup; everything else is recovered at the
/// request boundary and reported as a structured response.
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or empty upload / invalid request input
    #[error("{0}")]
    Validation(String),

    /// Unsupported or corrupt audio container/codec
    #[error("Audio conversion failed: {0}")]
    Conversion(String),

    /// Degenerate audio that cannot be turned into features
    #[error("Feature extraction failed: {0}")]
    FeatureExtraction(String),

    /// Catalog / model mismatch or invalid configuration (refuse to start)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Runtime failure invoking the network
    #[error("Inference failed: {0}")]
    Inference(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Manifest read/write error (wraps csv::Error)
    #[error("Manifest error: {0}")]
    Manifest(#[from] csv::Error),
}

impl Error {
    /// Pipeline stage the error belongs to, for structured request logs.
    pub fn stage(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation",
            Error::Conversion(_) => "conversion",
            Error::FeatureExtraction(_) => "features",
            Error::Configuration(_) => "configuration",
            Error::Inference(_) => "inference",
            Error::Io(_) => "io",
            Error::Manifest(_) => "manifest",
        }
    }
}
