//! Per-clip z-score normalization

use ndarray::Array2;

/// Added to the standard deviation so constant matrices divide cleanly.
const EPSILON: f32 = 1e-6;

/// Standardize a spectrogram to zero mean and unit variance over the whole
/// matrix (not per band). The epsilon is always added, so a perfectly flat
/// matrix comes out as all zeros instead of NaN.
pub fn zscore(mut spec: Array2<f32>) -> Array2<f32> {
    let mean = spec.mean().unwrap_or(0.0);
    let std = spec.std(0.0);
    spec.mapv_inplace(|x| (x - mean) / (std + EPSILON));
    spec
}
