//! Classification pipeline orchestration
//!
//! [`FeaturePipeline`] owns the deterministic waveform-to-feature
//! transform. The batch feature job calls the synchronous entry points;
//! the server wraps the same functions in blocking tasks with a per-stage
//! deadline. Both paths run byte-identical feature code.
//!
//! [`InferenceContext`] bundles the pipeline with a label catalog and a
//! classification backend, checked for agreement at construction so a
//! mismatched deployment dies at startup instead of mislabeling clips.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use ndarray::Array2;
use tokio::task;
use tracing::debug;

use crate::audio;
use crate::catalog::LabelCatalog;
use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::features::{fix_length, zscore, SpectralExtractor, SAMPLE_RATE, TARGET_LEN};
use crate::model::Classify;

/// Deterministic audio-to-feature transform with per-stage deadlines.
pub struct FeaturePipeline {
    extractor: SpectralExtractor,
    decode_timeout: Duration,
    feature_timeout: Duration,
    inference_timeout: Duration,
}

impl FeaturePipeline {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            extractor: SpectralExtractor::new(),
            decode_timeout: config.decode_timeout(),
            feature_timeout: config.feature_timeout(),
            inference_timeout: config.inference_timeout(),
        }
    }

    pub fn inference_timeout(&self) -> Duration {
        self.inference_timeout
    }

    /// Normalized log-mel features for a decoded waveform.
    ///
    /// An empty waveform means decoding produced no audio and is rejected
    /// here, before padding would silently turn it into five seconds of
    /// silence. A full-length all-zero clip is legitimate input.
    pub fn features_from_waveform(&self, samples: Vec<f32>) -> Result<Array2<f32>> {
        if samples.is_empty() {
            return Err(Error::FeatureExtraction(
                "decoded waveform contains no samples".into(),
            ));
        }
        let fixed = fix_length(samples, TARGET_LEN);
        let spec = self.extractor.extract(&fixed)?;
        Ok(zscore(spec))
    }

    /// File to normalized features, synchronous. Batch-job entry point.
    pub fn features_from_file(&self, path: &Path) -> Result<Array2<f32>> {
        let waveform = audio::ingest_file(path, SAMPLE_RATE)?;
        self.features_from_waveform(waveform)
    }

    /// File to normalized features with per-stage deadlines. Server entry
    /// point; decoding and extraction each run on the blocking pool.
    pub async fn features_from_file_staged(self: &Arc<Self>, path: PathBuf) -> Result<Array2<f32>> {
        let waveform = run_stage(self.decode_timeout, "audio decode", Error::Conversion, move || {
            audio::ingest_file(&path, SAMPLE_RATE)
        })
        .await?;
        debug!(samples = waveform.len(), "decode stage complete");

        let pipeline = Arc::clone(self);
        let features = run_stage(
            self.feature_timeout,
            "feature extraction",
            Error::FeatureExtraction,
            move || pipeline.features_from_waveform(waveform),
        )
        .await?;
        debug!(shape = ?features.dim(), "feature stage complete");
        Ok(features)
    }
}

/// Everything one classification needs, wired once at startup and then
/// read-only.
pub struct InferenceContext {
    pipeline: Arc<FeaturePipeline>,
    catalog: LabelCatalog,
    classifier: Arc<dyn Classify>,
}

impl std::fmt::Debug for InferenceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceContext").finish_non_exhaustive()
    }
}

impl InferenceContext {
    /// Fails when the catalog size and the network's score width disagree.
    /// That mismatch means the deployment pairs a model with the wrong
    /// label set, so it must abort startup rather than surface per
    /// request.
    pub fn new(
        pipeline: Arc<FeaturePipeline>,
        catalog: LabelCatalog,
        classifier: Arc<dyn Classify>,
    ) -> Result<Self> {
        if catalog.len() != classifier.output_dim() {
            return Err(Error::Configuration(format!(
                "label catalog has {} labels but the model scores {} classes",
                catalog.len(),
                classifier.output_dim()
            )));
        }
        Ok(Self {
            pipeline,
            catalog,
            classifier,
        })
    }

    pub fn catalog(&self) -> &LabelCatalog {
        &self.catalog
    }

    /// Decode, extract and score one file. Each stage is bounded by its
    /// configured deadline.
    pub async fn classify_file(&self, path: PathBuf) -> Result<Prediction> {
        let features = self.pipeline.features_from_file_staged(path).await?;
        let classifier = Arc::clone(&self.classifier);
        let scores = run_stage(
            self.pipeline.inference_timeout(),
            "inference",
            Error::Inference,
            move || classifier.scores(&features),
        )
        .await?;
        Prediction::from_scores(&scores, &self.catalog)
    }
}

/// Top-1 classification result.
#[derive(Debug, Clone)]
pub struct Prediction {
    pub label: String,
    /// Percent in 0..=100
    pub confidence: f32,
    /// Softmax distribution over all labels, catalog order
    pub probabilities: Vec<f32>,
}

impl Prediction {
    /// Softmax the raw scores and take the most probable label. Ties go to
    /// the lowest index, so equal scores still give a stable answer.
    pub fn from_scores(scores: &[f32], catalog: &LabelCatalog) -> Result<Self> {
        if scores.len() != catalog.len() {
            return Err(Error::Inference(format!(
                "model returned {} scores for a catalog of {} labels",
                scores.len(),
                catalog.len()
            )));
        }
        let probabilities = softmax(scores);
        let mut best = 0;
        for (i, &p) in probabilities.iter().enumerate() {
            if p > probabilities[best] {
                best = i;
            }
        }
        let label = catalog
            .label(best)
            .ok_or_else(|| Error::Inference("empty score vector".into()))?
            .to_string();
        Ok(Self {
            label,
            confidence: probabilities[best] * 100.0,
            probabilities,
        })
    }

    /// Confidence formatted the way responses and logs print it.
    pub fn confidence_display(&self) -> String {
        format!("{:.2}%", self.confidence)
    }
}

/// Max-subtracted softmax; stable for arbitrarily large scores.
fn softmax(scores: &[f32]) -> Vec<f32> {
    let max = scores.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|&s| (s - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Run a closure on the blocking pool, bounded by `limit`. On timeout the
/// worker keeps running detached; only the caller gives up.
async fn run_stage<T, F>(
    limit: Duration,
    stage: &'static str,
    err: fn(String) -> Error,
    work: F,
) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::time::timeout(limit, task::spawn_blocking(work)).await {
        Ok(Ok(result)) => result,
        Ok(Err(join)) => Err(err(format!("{stage} worker failed: {join}"))),
        Err(_) => Err(err(format!(
            "{stage} timed out after {}s",
            limit.as_secs()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{N_FRAMES, N_MELS};
    use std::f32::consts::PI;
    use tempfile::tempdir;

    fn pipeline() -> Arc<FeaturePipeline> {
        Arc::new(FeaturePipeline::new(&PipelineConfig::default()))
    }

    fn catalog(names: &[&str]) -> LabelCatalog {
        LabelCatalog::from_names(names.iter().map(|s| s.to_string()).collect()).unwrap()
    }

    struct Fixed(Vec<f32>);

    impl Classify for Fixed {
        fn scores(&self, _features: &Array2<f32>) -> Result<Vec<f32>> {
            Ok(self.0.clone())
        }

        fn output_dim(&self) -> usize {
            self.0.len()
        }
    }

    struct Stalled(Vec<f32>);

    impl Classify for Stalled {
        fn scores(&self, _features: &Array2<f32>) -> Result<Vec<f32>> {
            std::thread::sleep(Duration::from_millis(200));
            Ok(self.0.clone())
        }

        fn output_dim(&self) -> usize {
            self.0.len()
        }
    }

    fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample((s * i16::MAX as f32) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn empty_waveform_is_rejected_before_padding() {
        let err = pipeline().features_from_waveform(Vec::new()).unwrap_err();
        assert!(matches!(err, Error::FeatureExtraction(_)));
    }

    #[test]
    fn short_waveform_yields_the_canonical_shape() {
        let tone: Vec<f32> = (0..8000)
            .map(|i| (2.0 * PI * 440.0 * i as f32 / SAMPLE_RATE as f32).sin())
            .collect();
        let features = pipeline().features_from_waveform(tone).unwrap();
        assert_eq!(features.shape(), &[N_MELS, N_FRAMES]);
        assert!(features.iter().all(|v| v.is_finite()));
        // z-scored output
        assert!(features.mean().unwrap().abs() < 1e-3);
        assert!((features.std(0.0) - 1.0).abs() < 1e-2);
    }

    #[test]
    fn full_length_silence_is_valid_and_all_zero() {
        let features = pipeline()
            .features_from_waveform(vec![0.0; TARGET_LEN])
            .unwrap();
        assert!(features.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn same_waveform_always_gives_identical_features() {
        let tone: Vec<f32> = (0..TARGET_LEN)
            .map(|i| (2.0 * PI * 700.0 * i as f32 / SAMPLE_RATE as f32).sin())
            .collect();
        let p = pipeline();
        let a = p.features_from_waveform(tone.clone()).unwrap();
        let b = p.features_from_waveform(tone).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn context_rejects_catalog_and_model_of_different_widths() {
        let err = InferenceContext::new(
            pipeline(),
            catalog(&["axe", "rain", "birds"]),
            Arc::new(Fixed(vec![0.0, 1.0])),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[tokio::test]
    async fn classifies_a_wav_end_to_end() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clip.wav");
        let tone: Vec<f32> = (0..SAMPLE_RATE as usize)
            .map(|i| 0.4 * (2.0 * PI * 950.0 * i as f32 / SAMPLE_RATE as f32).sin())
            .collect();
        write_wav(&path, &tone, SAMPLE_RATE);

        let context = InferenceContext::new(
            pipeline(),
            catalog(&["axe", "rain", "birds"]),
            Arc::new(Fixed(vec![0.1, 2.5, 0.4])),
        )
        .unwrap();
        let prediction = context.classify_file(path).await.unwrap();
        assert_eq!(prediction.label, "rain");
        assert!(prediction.confidence > 70.0 && prediction.confidence <= 100.0);
        assert_eq!(prediction.probabilities.len(), 3);
        let total: f32 = prediction.probabilities.iter().sum();
        assert!((total - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn short_silent_clip_yields_a_full_probability_vector() {
        // Three seconds of silence pads to five and must still classify
        let dir = tempdir().unwrap();
        let path = dir.path().join("silent.wav");
        write_wav(&path, &vec![0.0; SAMPLE_RATE as usize * 3], SAMPLE_RATE);

        let context = InferenceContext::new(
            pipeline(),
            catalog(&["axe", "rain", "birds"]),
            Arc::new(Fixed(vec![0.2, 0.5, 0.3])),
        )
        .unwrap();
        let prediction = context.classify_file(path).await.unwrap();
        assert_eq!(prediction.probabilities.len(), 3);
        let total: f32 = prediction.probabilities.iter().sum();
        assert!((total - 1.0).abs() < 1e-5);
        assert!(prediction.probabilities.iter().all(|p| p.is_finite()));
    }

    #[tokio::test]
    async fn repeated_classification_of_one_file_is_identical() {
        // A seven-second clip truncates to five the same way every time
        let dir = tempdir().unwrap();
        let path = dir.path().join("long.wav");
        let tone: Vec<f32> = (0..SAMPLE_RATE as usize * 7)
            .map(|i| 0.3 * (2.0 * PI * 620.0 * i as f32 / SAMPLE_RATE as f32).sin())
            .collect();
        write_wav(&path, &tone, SAMPLE_RATE);

        let context = InferenceContext::new(
            pipeline(),
            catalog(&["axe", "rain"]),
            Arc::new(Fixed(vec![0.9, 0.4])),
        )
        .unwrap();
        let first = context.classify_file(path.clone()).await.unwrap();
        let second = context.classify_file(path).await.unwrap();
        assert_eq!(first.label, second.label);
        assert_eq!(first.confidence, second.confidence);
        assert_eq!(first.probabilities, second.probabilities);
    }

    #[tokio::test]
    async fn missing_file_surfaces_from_the_decode_stage() {
        let context = InferenceContext::new(
            pipeline(),
            catalog(&["axe", "rain"]),
            Arc::new(Fixed(vec![0.0, 1.0])),
        )
        .unwrap();
        let err = context
            .classify_file(PathBuf::from("/nonexistent/clip.wav"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[tokio::test]
    async fn slow_inference_hits_its_deadline() {
        let mut config = PipelineConfig::default();
        config.inference_timeout_secs = 0;
        let pipeline = Arc::new(FeaturePipeline::new(&config));

        let dir = tempdir().unwrap();
        let path = dir.path().join("clip.wav");
        write_wav(&path, &vec![0.1; 4000], SAMPLE_RATE);

        let context = InferenceContext::new(
            pipeline,
            catalog(&["axe", "rain"]),
            Arc::new(Stalled(vec![0.0, 1.0])),
        )
        .unwrap();
        let err = context.classify_file(path).await.unwrap_err();
        match err {
            Error::Inference(msg) => assert!(msg.contains("timed out"), "{msg}"),
            other => panic!("expected inference timeout, got {other}"),
        }
    }

    #[test]
    fn tied_scores_pick_the_lowest_index() {
        let prediction =
            Prediction::from_scores(&[1.0, 1.0, 1.0], &catalog(&["axe", "birds", "rain"])).unwrap();
        assert_eq!(prediction.label, "axe");
    }

    #[test]
    fn score_count_must_match_the_catalog() {
        let err = Prediction::from_scores(&[1.0, 2.0], &catalog(&["axe", "birds", "rain"]))
            .unwrap_err();
        assert!(matches!(err, Error::Inference(_)));
    }

    #[test]
    fn softmax_survives_large_scores() {
        let probs = softmax(&[1000.0, 1000.0]);
        assert!((probs[0] - 0.5).abs() < 1e-6);
        assert!((probs[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn confidence_is_formatted_as_a_percentage() {
        let prediction =
            Prediction::from_scores(&[0.0, 5.0], &catalog(&["axe", "rain"])).unwrap();
        let shown = prediction.confidence_display();
        assert!(shown.ends_with('%'), "{shown}");
        assert_eq!(prediction.label, "rain");
    }
}
