//! Log-mel spectrogram extraction
//!
//! Reproduces the exact spectral recipe the network was trained on:
//! periodic Hann window, centered STFT over zero-padded edges, power
//! spectrum, Slaney-scale mel filterbank with area normalization, and dB
//! conversion referenced to the per-clip maximum. A numerical deviation
//! here degrades predictions without raising any error, so the formulas
//! are pinned down by tests rather than left to a dependency's defaults.

use std::f32::consts::PI;
use std::sync::Arc;

use ndarray::{Array1, Array2};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::error::{Error, Result};
use crate::features::{HOP_LENGTH, N_FFT, N_MELS, SAMPLE_RATE};

/// Power floor before taking log10
const AMIN: f32 = 1e-10;
/// Dynamic range kept below the per-clip maximum, dB
const TOP_DB: f32 = 80.0;

/// Computes log-mel spectrograms from mono waveforms.
///
/// The window, the filterbank and the FFT plan are built once at
/// construction; `extract` itself allocates only per-clip buffers and can
/// be shared behind an `Arc` across callers.
pub struct SpectralExtractor {
    /// Triangular filterbank, shape (N_MELS, N_FFT / 2 + 1)
    mel_filters: Array2<f32>,
    /// Periodic Hann window of N_FFT samples
    window: Array1<f32>,
    fft: Arc<dyn Fft<f32>>,
}

impl SpectralExtractor {
    pub fn new() -> Self {
        let mel_filters = mel_filterbank(N_MELS, N_FFT, SAMPLE_RATE as f32);
        let window = hann_window(N_FFT);
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(N_FFT);
        Self {
            mel_filters,
            window,
            fft,
        }
    }

    /// Compute the log-mel spectrogram of a mono waveform.
    ///
    /// Centered framing zero-pads N_FFT / 2 samples on each side, so the
    /// output shape is `(N_MELS, 1 + len / HOP_LENGTH)`. Values are in dB
    /// relative to the loudest cell of this clip, floored 80 dB below it.
    pub fn extract(&self, samples: &[f32]) -> Result<Array2<f32>> {
        if samples.is_empty() {
            return Err(Error::FeatureExtraction(
                "cannot extract features from an empty waveform".into(),
            ));
        }
        let power = self.power_spectrogram(samples);
        let mel = self.mel_filters.dot(&power);
        Ok(power_to_db_max_ref(mel))
    }

    /// Windowed power spectrum, shape (N_FFT / 2 + 1, frames).
    fn power_spectrogram(&self, samples: &[f32]) -> Array2<f32> {
        let pad = N_FFT / 2;
        let mut padded = vec![0.0f32; samples.len() + 2 * pad];
        padded[pad..pad + samples.len()].copy_from_slice(samples);

        let n_frames = (padded.len() - N_FFT) / HOP_LENGTH + 1;
        let n_freqs = N_FFT / 2 + 1;
        let mut power = Array2::<f32>::zeros((n_freqs, n_frames));
        let mut scratch =
            vec![Complex::new(0.0f32, 0.0); self.fft.get_inplace_scratch_len()];
        let mut buffer = vec![Complex::new(0.0f32, 0.0); N_FFT];

        for frame in 0..n_frames {
            let start = frame * HOP_LENGTH;
            for (slot, (&w, &s)) in buffer
                .iter_mut()
                .zip(self.window.iter().zip(&padded[start..start + N_FFT]))
            {
                *slot = Complex::new(w * s, 0.0);
            }
            self.fft.process_with_scratch(&mut buffer, &mut scratch);
            for (k, c) in buffer.iter().take(n_freqs).enumerate() {
                power[[k, frame]] = c.re * c.re + c.im * c.im;
            }
        }
        power
    }
}

impl Default for SpectralExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Periodic Hann window (`fftbins=true` in scipy terms).
fn hann_window(n: usize) -> Array1<f32> {
    Array1::from_iter((0..n).map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / n as f32).cos())))
}

/// Hz to mel on the Slaney scale: linear below 1 kHz, logarithmic above.
fn hz_to_mel(hz: f32) -> f32 {
    const F_SP: f32 = 200.0 / 3.0;
    const MIN_LOG_HZ: f32 = 1000.0;
    const MIN_LOG_MEL: f32 = MIN_LOG_HZ / F_SP;
    if hz >= MIN_LOG_HZ {
        let logstep = 6.4f32.ln() / 27.0;
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / logstep
    } else {
        hz / F_SP
    }
}

/// Inverse of [`hz_to_mel`].
fn mel_to_hz(mel: f32) -> f32 {
    const F_SP: f32 = 200.0 / 3.0;
    const MIN_LOG_HZ: f32 = 1000.0;
    const MIN_LOG_MEL: f32 = MIN_LOG_HZ / F_SP;
    if mel >= MIN_LOG_MEL {
        let logstep = 6.4f32.ln() / 27.0;
        MIN_LOG_HZ * (logstep * (mel - MIN_LOG_MEL)).exp()
    } else {
        F_SP * mel
    }
}

/// Triangular mel filterbank over continuous FFT bin center frequencies,
/// covering 0 Hz to Nyquist, with Slaney area normalization so each row
/// integrates to roughly constant energy.
fn mel_filterbank(n_mels: usize, n_fft: usize, sr: f32) -> Array2<f32> {
    let n_freqs = n_fft / 2 + 1;
    let fft_freqs: Vec<f32> = (0..n_freqs).map(|k| k as f32 * sr / n_fft as f32).collect();

    // n_mels + 2 anchor points equally spaced on the mel axis
    let mel_max = hz_to_mel(sr / 2.0);
    let hz_pts: Vec<f32> = (0..n_mels + 2)
        .map(|i| mel_to_hz(mel_max * i as f32 / (n_mels + 1) as f32))
        .collect();

    let mut filters = Array2::<f32>::zeros((n_mels, n_freqs));
    for m in 0..n_mels {
        let (lower, center, upper) = (hz_pts[m], hz_pts[m + 1], hz_pts[m + 2]);
        let enorm = 2.0 / (upper - lower);
        for (k, &f) in fft_freqs.iter().enumerate() {
            let rising = (f - lower) / (center - lower);
            let falling = (upper - f) / (upper - center);
            let weight = rising.min(falling).max(0.0);
            filters[[m, k]] = weight * enorm;
        }
    }
    filters
}

/// `10 * log10(max(S, amin))` relative to the matrix maximum, floored at
/// `max - TOP_DB`. The reference is this clip's own maximum, never a
/// global constant, so quiet clips keep their internal contrast.
fn power_to_db_max_ref(power: Array2<f32>) -> Array2<f32> {
    let ref_power = power.iter().cloned().fold(0.0f32, f32::max).max(AMIN);
    let ref_db = 10.0 * ref_power.log10();
    let mut db = power.mapv(|x| 10.0 * x.max(AMIN).log10() - ref_db);
    let peak = db.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    db.mapv_inplace(|x| x.max(peak - TOP_DB));
    db
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{N_FRAMES, TARGET_LEN};

    fn sine(freq: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f32 / SAMPLE_RATE as f32).sin())
            .collect()
    }

    #[test]
    fn mel_scale_is_linear_then_log() {
        assert!(hz_to_mel(0.0).abs() < 1e-6);
        assert!((hz_to_mel(200.0) - 3.0).abs() < 1e-4);
        assert!((hz_to_mel(1000.0) - 15.0).abs() < 1e-4);
        // Above the corner every octave spans the same number of mels
        let upper = hz_to_mel(8000.0) - hz_to_mel(4000.0);
        let lower = hz_to_mel(4000.0) - hz_to_mel(2000.0);
        assert!((upper - lower).abs() < 1e-3);
    }

    #[test]
    fn mel_scale_round_trips() {
        for hz in [0.0, 60.0, 440.0, 999.0, 1000.0, 1001.0, 4000.0, 8000.0] {
            let back = mel_to_hz(hz_to_mel(hz));
            assert!(
                (back - hz).abs() < 0.5,
                "{hz} Hz round-tripped to {back} Hz"
            );
        }
    }

    #[test]
    fn window_is_periodic_hann() {
        let w = hann_window(N_FFT);
        assert_eq!(w.len(), N_FFT);
        assert!(w[0].abs() < 1e-7);
        // Periodic form peaks at exactly n/2 and does not end at zero
        assert!((w[N_FFT / 2] - 1.0).abs() < 1e-6);
        assert!(w[N_FFT - 1] > 0.0);
        assert!((w[N_FFT / 4] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn filterbank_shape_and_coverage() {
        let fb = mel_filterbank(N_MELS, N_FFT, SAMPLE_RATE as f32);
        assert_eq!(fb.shape(), &[N_MELS, N_FFT / 2 + 1]);
        assert!(fb.iter().all(|&w| w >= 0.0));
        for (m, row) in fb.outer_iter().enumerate() {
            assert!(row.sum() > 0.0, "filter {m} has no support");
        }
    }

    #[test]
    fn five_second_clip_yields_fixed_shape() {
        let extractor = SpectralExtractor::new();
        let spec = extractor.extract(&sine(440.0, TARGET_LEN)).unwrap();
        assert_eq!(spec.shape(), &[N_MELS, N_FRAMES]);
    }

    #[test]
    fn empty_waveform_is_rejected() {
        let extractor = SpectralExtractor::new();
        let err = extractor.extract(&[]).unwrap_err();
        assert!(matches!(err, Error::FeatureExtraction(_)));
    }

    #[test]
    fn values_are_db_relative_to_clip_maximum() {
        let extractor = SpectralExtractor::new();
        let spec = extractor.extract(&sine(1000.0, TARGET_LEN)).unwrap();
        let max = spec.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let min = spec.iter().cloned().fold(f32::INFINITY, f32::min);
        assert!(max.abs() < 1e-3, "per-clip reference should put the peak at 0 dB");
        assert!(min >= -TOP_DB - 1e-3, "floor should sit 80 dB below the peak");
    }

    #[test]
    fn silence_maps_to_all_zeros() {
        // With the reference clamped to the power floor, a silent clip is
        // uniformly 0 dB, which later z-scoring turns into all zeros.
        let extractor = SpectralExtractor::new();
        let spec = extractor.extract(&vec![0.0; TARGET_LEN]).unwrap();
        assert!(spec.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn pure_tone_peaks_at_its_mel_band() {
        let extractor = SpectralExtractor::new();
        let spec = extractor.extract(&sine(1000.0, TARGET_LEN)).unwrap();
        let mean_per_band: Vec<f32> = spec
            .outer_iter()
            .map(|row| row.sum() / row.len() as f32)
            .collect();
        let argmax = mean_per_band
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        // 1 kHz sits at mel 15.0, i.e. around band 42 of 128
        assert!(
            (39..=45).contains(&argmax),
            "1 kHz tone peaked at band {argmax}"
        );
    }

    #[test]
    fn short_input_still_frames_correctly() {
        let extractor = SpectralExtractor::new();
        let spec = extractor.extract(&sine(440.0, HOP_LENGTH * 10)).unwrap();
        assert_eq!(spec.shape(), &[N_MELS, 11]);
    }
}
