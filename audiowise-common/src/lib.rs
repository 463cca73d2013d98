//! Shared pipeline for environmental sound classification.
//!
//! Everything that must behave identically in the batch feature job and
//! the classification server lives here: audio decoding and resampling,
//! the log-mel feature transform, the label catalog, manifest and
//! artifact I/O, and the inference wiring. The binaries in the sibling
//! crates are thin shells over this one.

pub mod artifact;
pub mod audio;
pub mod catalog;
pub mod config;
pub mod error;
pub mod features;
pub mod manifest;
pub mod model;
pub mod pipeline;

pub use catalog::LabelCatalog;
pub use config::Config;
pub use error::{Error, Result};
pub use model::{Classify, OnnxClassifier};
pub use pipeline::{FeaturePipeline, InferenceContext, Prediction};
