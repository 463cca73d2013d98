//! Audio ingest: decode, downmix, resample
//!
//! Turns an arbitrary input file into the canonical mono waveform every
//! downstream stage expects. Pure with respect to process state; the only
//! side effect is reading the file.

pub mod decoder;
pub mod resampler;

pub use decoder::{decode_audio_file, DecodedAudio};
pub use resampler::resample_mono;

use crate::Result;
use std::path::Path;

/// Decode `path` and deliver mono f32 samples at `target_rate`.
///
/// The returned waveform may be empty when the container holds a valid but
/// empty stream; callers decide whether that is an error.
pub fn ingest_file(path: &Path, target_rate: u32) -> Result<Vec<f32>> {
    let decoded = decode_audio_file(path)?;
    resample_mono(decoded.samples, decoded.sample_rate, target_rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ingest_resamples_to_target_rate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for i in 0..44100 {
            let t = i as f32 / 44100.0;
            let s = ((t * 220.0 * 2.0 * std::f32::consts::PI).sin() * 8192.0) as i16;
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();

        let samples = ingest_file(&path, 16000).unwrap();

        // 1 second in, ~16000 samples out
        let tolerance = 160;
        assert!(
            samples.len() >= 16000 - tolerance && samples.len() <= 16000 + tolerance,
            "expected ~16000 samples, got {}",
            samples.len()
        );
    }
}
