//! Audio decoding
//!
//! Decodes any container/codec symphonia understands (WAV, MP3, FLAC, OGG,
//! AAC, WebM/Opus, ...) into mono f32 PCM at the file's native sample rate.
//! Multi-channel input is downmixed by averaging channels.

use crate::{Error, Result};
use std::path::Path;
use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::conv::FromSample;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;

/// Decoded audio result
#[derive(Debug)]
pub struct DecodedAudio {
    /// Mono samples (f32, nominal range [-1.0, 1.0])
    pub samples: Vec<f32>,
    /// Native sample rate in Hz
    pub sample_rate: u32,
    /// Original channel count
    pub channels: usize,
    /// Duration in seconds
    pub duration_seconds: f64,
}

/// Decode an audio file to mono f32 PCM samples.
///
/// 1. Probe the container format (extension used as a hint only)
/// 2. Find the default audio track and create a decoder for its codec
/// 3. Decode every packet, averaging channels to mono
///
/// # Errors
/// * `Error::Io` if the file cannot be opened
/// * `Error::Conversion` for unsupported formats or corrupt audio data
pub fn decode_audio_file(file_path: &Path) -> Result<DecodedAudio> {
    tracing::debug!(path = %file_path.display(), "decoding audio file");

    let file = std::fs::File::open(file_path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = file_path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| Error::Conversion(format!("unrecognized audio format: {e}")))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| Error::Conversion("no audio track found in file".to_string()))?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| Error::Conversion("sample rate unknown".to_string()))?;
    let channels = track
        .codec_params
        .channels
        .ok_or_else(|| Error::Conversion("channel layout unknown".to_string()))?
        .count();

    tracing::debug!(
        path = %file_path.display(),
        sample_rate = sample_rate,
        channels = channels,
        "audio track info"
    );

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| Error::Conversion(format!("no decoder for codec: {e}")))?;

    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                // End of stream
                break;
            }
            Err(e) => {
                return Err(Error::Conversion(format!("error reading packet: {e}")));
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = decoder
            .decode(&packet)
            .map_err(|e| Error::Conversion(format!("failed to decode packet: {e}")))?;

        append_mono(&decoded, &mut samples);
    }

    let duration_seconds = samples.len() as f64 / sample_rate as f64;

    tracing::debug!(
        path = %file_path.display(),
        total_samples = samples.len(),
        duration_seconds = format!("{:.2}", duration_seconds),
        "audio decoding complete"
    );

    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels,
        duration_seconds,
    })
}

/// Downmix one decoded buffer to mono and append to `out`.
fn append_mono(decoded: &AudioBufferRef, out: &mut Vec<f32>) {
    match decoded {
        AudioBufferRef::U8(buf) => mix_channels(buf, out),
        AudioBufferRef::U16(buf) => mix_channels(buf, out),
        AudioBufferRef::U24(buf) => mix_channels(buf, out),
        AudioBufferRef::U32(buf) => mix_channels(buf, out),
        AudioBufferRef::S8(buf) => mix_channels(buf, out),
        AudioBufferRef::S16(buf) => mix_channels(buf, out),
        AudioBufferRef::S24(buf) => mix_channels(buf, out),
        AudioBufferRef::S32(buf) => mix_channels(buf, out),
        AudioBufferRef::F32(buf) => mix_channels(buf, out),
        AudioBufferRef::F64(buf) => mix_channels(buf, out),
    }
}

/// Average all channels of a planar buffer into mono f32 frames.
fn mix_channels<S>(buf: &AudioBuffer<S>, out: &mut Vec<f32>)
where
    S: Sample,
    f32: FromSample<S>,
{
    let num_channels = buf.spec().channels.count();
    let num_frames = buf.frames();
    out.reserve(num_frames);

    for frame_idx in 0..num_frames {
        let mut sum = 0.0f32;
        for ch in 0..num_channels {
            sum += f32::from_sample(buf.chan(ch)[frame_idx]);
        }
        out.push(sum / num_channels as f32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, channels: u16, sample_rate: u32, frames: &[Vec<i16>]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for frame in frames {
            for &s in frame {
                writer.write_sample(s).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn decode_missing_file_is_io_error() {
        let result = decode_audio_file(Path::new("/nonexistent/clip.mp3"));
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn decode_garbage_is_conversion_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.mp3");
        std::fs::write(&path, b"this is not audio data at all").unwrap();

        let result = decode_audio_file(&path);
        assert!(matches!(result, Err(Error::Conversion(_))));
    }

    #[test]
    fn decode_mono_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let frames: Vec<Vec<i16>> = (0..8000)
            .map(|i| {
                let t = i as f32 / 16000.0;
                vec![((t * 440.0 * 2.0 * std::f32::consts::PI).sin() * 16384.0) as i16]
            })
            .collect();
        write_wav(&path, 1, 16000, &frames);

        let decoded = decode_audio_file(&path).unwrap();
        assert_eq!(decoded.sample_rate, 16000);
        assert_eq!(decoded.channels, 1);
        assert_eq!(decoded.samples.len(), 8000);
        assert!((decoded.duration_seconds - 0.5).abs() < 0.001);
    }

    #[test]
    fn decode_stereo_averages_channels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        // Left and right cancel, so the mono mix should be near zero
        let frames: Vec<Vec<i16>> = (0..1000).map(|_| vec![12000, -12000]).collect();
        write_wav(&path, 2, 16000, &frames);

        let decoded = decode_audio_file(&path).unwrap();
        assert_eq!(decoded.channels, 2);
        assert_eq!(decoded.samples.len(), 1000);
        for &s in &decoded.samples {
            assert!(s.abs() < 1e-3, "stereo mix should cancel, got {}", s);
        }
    }
}
