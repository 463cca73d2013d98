//! Sample-rate conversion for mono waveforms
//!
//! Sinc interpolation with a BlackmanHarris2 window, 256-tap filter and 0.95
//! cutoff, processed in a single pass sized to the input.

use crate::{Error, Result};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

/// Resample a mono waveform from `source_rate` to `target_rate`.
///
/// Returns the input unchanged when rates already match or the input is
/// empty.
pub fn resample_mono(samples: Vec<f32>, source_rate: u32, target_rate: u32) -> Result<Vec<f32>> {
    if source_rate == target_rate || samples.is_empty() {
        return Ok(samples);
    }

    let num_frames = samples.len();
    let resample_ratio = target_rate as f64 / source_rate as f64;

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    // Chunk size equal to input length for single-pass processing
    let mut resampler = SincFixedIn::<f32>::new(resample_ratio, 2.0, params, num_frames, 1)
        .map_err(|e| Error::Conversion(format!("failed to create resampler: {e}")))?;

    let mut output = resampler
        .process(&[samples], None)
        .map_err(|e| Error::Conversion(format!("resampling failed: {e}")))?;

    let resampled = output.remove(0);

    tracing::debug!(
        source_rate = source_rate,
        target_rate = target_rate,
        input_frames = num_frames,
        output_frames = resampled.len(),
        "resampled waveform"
    );

    Ok(resampled)
}
