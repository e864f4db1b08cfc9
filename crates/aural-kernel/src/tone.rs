//! PCM WAV synthesis.
//!
//! Writes 16-bit PCM WAV data for test tones and silence. The demo binary
//! uses it to generate its sample assets and tests use it to get real
//! decodable files without shipping binaries.

use std::f32::consts::TAU;
use std::fs;
use std::io;
use std::path::Path;

const BITS_PER_SAMPLE: u16 = 16;

/// Description of a generated tone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneSpec {
    /// Frequency in Hz. Zero produces silence.
    pub frequency: f32,
    /// Length in seconds.
    pub duration_secs: f32,
    /// Peak amplitude (0.0-1.0).
    pub amplitude: f32,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Interleaved channel count.
    pub channels: u16,
}

impl Default for ToneSpec {
    fn default() -> Self {
        Self {
            frequency: 440.0,
            duration_secs: 1.0,
            amplitude: 0.5,
            sample_rate: 44_100,
            channels: 1,
        }
    }
}

impl ToneSpec {
    /// A sine tone of the given frequency and length.
    #[must_use]
    pub fn sine(frequency: f32, duration_secs: f32) -> Self {
        Self {
            frequency,
            duration_secs,
            ..Self::default()
        }
    }

    /// Silence of the given length.
    #[must_use]
    pub fn silence(duration_secs: f32) -> Self {
        Self {
            frequency: 0.0,
            amplitude: 0.0,
            duration_secs,
            ..Self::default()
        }
    }

    /// Set the channel count.
    #[must_use]
    pub const fn with_channels(mut self, channels: u16) -> Self {
        self.channels = channels;
        self
    }

    /// Number of frames the tone spans.
    #[must_use]
    pub fn frame_count(&self) -> u32 {
        (self.sample_rate as f32 * self.duration_secs.max(0.0)) as u32
    }
}

/// Encodes a tone as a complete WAV file in memory.
#[must_use]
pub fn encode_wav(spec: &ToneSpec) -> Vec<u8> {
    let channels = spec.channels.max(1);
    let frames = spec.frame_count();
    let bytes_per_sample = u32::from(BITS_PER_SAMPLE / 8);
    let data_size = frames * u32::from(channels) * bytes_per_sample;

    let mut wav = Vec::with_capacity(44 + data_size as usize);

    // RIFF header
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_size).to_le_bytes());
    wav.extend_from_slice(b"WAVE");

    // fmt chunk
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&channels.to_le_bytes());
    wav.extend_from_slice(&spec.sample_rate.to_le_bytes());
    let byte_rate = spec.sample_rate * u32::from(channels) * bytes_per_sample;
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    let block_align = channels * (BITS_PER_SAMPLE / 8);
    wav.extend_from_slice(&block_align.to_le_bytes());
    wav.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());

    // data chunk
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_size.to_le_bytes());

    let amplitude = spec.amplitude.clamp(0.0, 1.0) * f32::from(i16::MAX);
    for frame in 0..frames {
        let t = frame as f32 / spec.sample_rate as f32;
        let value = (amplitude * (TAU * spec.frequency * t).sin()) as i16;
        for _ in 0..channels {
            wav.extend_from_slice(&value.to_le_bytes());
        }
    }

    wav
}

/// Writes a tone to `path` as a WAV file, creating parent directories.
pub fn write_wav(path: impl AsRef<Path>, spec: &ToneSpec) -> io::Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, encode_wav(spec))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let wav = encode_wav(&ToneSpec::sine(440.0, 0.5));
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[12..16], b"fmt ");
        assert_eq!(&wav[36..40], b"data");
    }

    #[test]
    fn test_data_size_matches_frames() {
        let spec = ToneSpec::sine(220.0, 0.25).with_channels(2);
        let wav = encode_wav(&spec);
        let expected = spec.frame_count() as usize * 2 * 2;
        assert_eq!(wav.len(), 44 + expected);
    }

    #[test]
    fn test_silence_is_zero() {
        let wav = encode_wav(&ToneSpec::silence(0.1));
        assert!(wav[44..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_write_creates_parents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested/dir/tone.wav");
        write_wav(&path, &ToneSpec::sine(440.0, 0.1)).expect("write");
        assert!(path.exists());
    }
}
