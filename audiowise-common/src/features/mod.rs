//! Deterministic feature stages
//!
//! Everything in this module is a pure function of its input; the batch
//! feature job and the online server call the exact same code so that
//! training-time and serving-time features can never drift apart.
//!
//! The constants below are the train/serve contract. Changing any of them
//! invalidates every trained checkpoint.

pub mod length;
pub mod mel;
pub mod normalize;

pub use length::fix_length;
pub use mel::SpectralExtractor;
pub use normalize::zscore;

/// Canonical sample rate, Hz
pub const SAMPLE_RATE: u32 = 16_000;
/// Fixed clip duration, seconds
pub const CLIP_SECONDS: usize = 5;
/// Samples per clip after length normalization
pub const TARGET_LEN: usize = SAMPLE_RATE as usize * CLIP_SECONDS;
/// Analysis window and FFT size, samples (25 ms)
pub const N_FFT: usize = 400;
/// Hop between frames, samples (10 ms)
pub const HOP_LENGTH: usize = 160;
/// Mel filterbank size
pub const N_MELS: usize = 128;
/// Time frames for a TARGET_LEN clip under centered framing
pub const N_FRAMES: usize = TARGET_LEN / HOP_LENGTH + 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_geometry() {
        assert_eq!(TARGET_LEN, 80_000);
        assert_eq!(N_FRAMES, 501);
    }
}
