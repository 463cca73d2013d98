//! Classification backends
//!
//! [`Classify`] is the seam between the pipeline and the network: it takes
//! a normalized feature matrix and returns one raw score per catalog
//! label. The production backend runs an ONNX checkpoint through ort;
//! tests substitute a canned implementation.

use std::path::Path;
use std::sync::Mutex;

use ndarray::Array2;
use ort::session::Session;
use ort::value::Tensor;

use crate::error::{Error, Result};
use crate::features::{N_FRAMES, N_MELS};

/// A backend producing raw (pre-softmax) scores for a feature matrix.
pub trait Classify: Send + Sync {
    /// Score a normalized log-mel matrix. The returned vector has
    /// [`Classify::output_dim`] entries, one per catalog label.
    fn scores(&self, features: &Array2<f32>) -> Result<Vec<f32>>;

    /// Width of the score vector this backend produces.
    fn output_dim(&self) -> usize;
}

/// ONNX Runtime backend.
///
/// `run` needs `&mut Session`, so the session sits behind a mutex and at
/// most one inference is in flight at a time. Concurrent requests queue.
#[derive(Debug)]
pub struct OnnxClassifier {
    session: Mutex<Session>,
    input_name: String,
    output_dim: usize,
}

impl OnnxClassifier {
    /// Load a checkpoint and probe it once with a zero spectrogram.
    ///
    /// The probe serves two purposes: it learns the score-vector width
    /// from the network itself rather than trusting configuration, and it
    /// proves at startup that the model accepts the canonical
    /// `(1, 1, N_MELS, N_FRAMES)` input instead of failing on the first
    /// real request.
    pub fn load(checkpoint: &Path, input_name: &str) -> Result<Self> {
        let session = Session::builder()
            .and_then(|b| Ok(b.with_intra_threads(1)?))
            .and_then(|mut b| b.commit_from_file(checkpoint))
            .map_err(|e| {
                Error::Configuration(format!(
                    "failed to load model {}: {e}",
                    checkpoint.display()
                ))
            })?;
        let mut classifier = Self {
            session: Mutex::new(session),
            input_name: input_name.to_string(),
            output_dim: 0,
        };
        let probe = classifier.run_network(&Array2::zeros((N_MELS, N_FRAMES)))?;
        if probe.is_empty() {
            return Err(Error::Configuration(
                "model produced an empty score vector".into(),
            ));
        }
        classifier.output_dim = probe.len();
        Ok(classifier)
    }

    fn run_network(&self, features: &Array2<f32>) -> Result<Vec<f32>> {
        let (rows, cols) = features.dim();
        let input = features
            .to_owned()
            .into_shape_with_order((1, 1, rows, cols))
            .map_err(|e| Error::Inference(format!("bad feature shape: {e}")))?;
        let tensor =
            Tensor::from_array(input).map_err(|e| Error::Inference(e.to_string()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| Error::Inference("model session lock poisoned".into()))?;
        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => tensor])
            .map_err(|e| Error::Inference(e.to_string()))?;

        let (_, value) = outputs
            .iter()
            .next()
            .ok_or_else(|| Error::Inference("model produced no outputs".into()))?;
        let (_shape, data) = value
            .try_extract_tensor::<f32>()
            .map_err(|e| Error::Inference(e.to_string()))?;
        Ok(data.to_vec())
    }
}

impl Classify for OnnxClassifier {
    fn scores(&self, features: &Array2<f32>) -> Result<Vec<f32>> {
        self.run_network(features)
    }

    fn output_dim(&self) -> usize {
        self.output_dim
    }
}
