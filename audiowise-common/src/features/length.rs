//! Fixed-duration length normalization

use std::cmp::Ordering;

/// Force a waveform to exactly `target_len` samples.
///
/// Longer clips keep their leading samples, shorter clips are right-padded
/// with zeros. No random cropping: the same file always yields the same
/// window of audio.
pub fn fix_length(mut samples: Vec<f32>, target_len: usize) -> Vec<f32> {
    match samples.len().cmp(&target_len) {
        Ordering::Greater => samples.truncate(target_len),
        Ordering::Less => samples.resize(target_len, 0.0),
        Ordering::Equal => {}
    }
    samples
}
