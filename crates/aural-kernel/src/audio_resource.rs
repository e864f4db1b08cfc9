//! Audio Resource Management
//!
//! Provides the resource types the mixer hands out and tracks:
//! - `SoundHandle`: Identifier for a created sound resource
//! - `ChannelHandle`: Generation-checked identifier for a playback channel
//! - `SoundMode`: Creation flags (looping, streaming, positional)
//! - `SoundResource`: Decoded samples or a streaming source
//! - `ConeSettings`: Directional attenuation parameters
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────┐      ┌───────────────┐      ┌───────────────┐
//! │ SoundResource │──────│ ChannelState  │──────│ ChannelHandle │
//! │ (sound table) │      │ (slot table)  │      │ (index + gen) │
//! └───────────────┘      └───────────────┘      └───────────────┘
//! ```
//!
//! Sounds created in memory are decoded once into a `SampleData` buffer.
//! Streaming sounds keep only their path and re-open the file per channel.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use aural_common::clamp_f32;

/// Largest logical channel count the mixer accepts.
pub const MAX_CHANNEL_COUNT: u32 = 4093;

/// Default 3D minimum distance of a fresh channel.
pub const DEFAULT_MIN_DISTANCE: f32 = 1.0;

/// Default 3D maximum distance of a fresh channel.
pub const DEFAULT_MAX_DISTANCE: f32 = 10_000.0;

/// Identifier of a sound resource in the mixer's sound table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SoundHandle(u64);

impl SoundHandle {
    /// Create a handle from a raw ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw ID.
    #[must_use]
    pub const fn raw(&self) -> u64 {
        self.0
    }
}

/// Identifier of a playback channel.
///
/// The index is stable for the lifetime of the channel and is what the
/// index-based API accepts. The generation detects a handle that outlived
/// its channel after the slot was reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelHandle {
    index: u32,
    generation: u32,
}

impl ChannelHandle {
    /// Create a new handle with the given slot index and generation.
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Get the slot index.
    #[must_use]
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Get the generation (for detecting stale handles).
    #[must_use]
    pub const fn generation(&self) -> u32 {
        self.generation
    }
}

/// Flags a sound is created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SoundMode {
    /// Restart from the beginning when the end is reached.
    pub looping: bool,
    /// Stream from storage instead of decoding into memory.
    pub streaming: bool,
    /// Spatialize with 3D linear rolloff relative to the listener.
    pub positional: bool,
}

impl SoundMode {
    /// Non-positional sound decoded into memory.
    #[must_use]
    pub const fn sound(looping: bool) -> Self {
        Self {
            looping,
            streaming: false,
            positional: false,
        }
    }

    /// Non-positional sound streamed from storage.
    #[must_use]
    pub const fn stream(looping: bool) -> Self {
        Self {
            looping,
            streaming: true,
            positional: false,
        }
    }

    /// Create with the positional flag.
    #[must_use]
    pub const fn with_positional(mut self, positional: bool) -> Self {
        self.positional = positional;
        self
    }
}

/// Decoded audio samples held in memory.
#[derive(Debug, Clone)]
pub struct SampleData {
    /// Interleaved f32 samples.
    pub samples: Arc<Vec<f32>>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Number of interleaved channels.
    pub channels: u16,
}

impl SampleData {
    /// Wrap decoded samples.
    #[must_use]
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples: Arc::new(samples),
            sample_rate,
            channels: channels.max(1),
        }
    }

    /// Playback length of the buffer.
    #[must_use]
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        let frames = self.samples.len() / self.channels as usize;
        Duration::from_secs_f64(frames as f64 / f64::from(self.sample_rate))
    }

    /// Size of the sample data in bytes.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.samples.len() * std::mem::size_of::<f32>()
    }
}

/// Where a sound's samples come from.
#[derive(Debug, Clone)]
pub enum SoundSource {
    /// Fully decoded into memory.
    Buffered(SampleData),
    /// Re-opened from storage for every channel that plays it.
    Stream {
        /// Path to the audio file.
        path: PathBuf,
        /// Length reported by the decoder, when known.
        duration: Option<Duration>,
    },
}

impl SoundSource {
    /// Playback length, when known.
    #[must_use]
    pub fn duration(&self) -> Option<Duration> {
        match self {
            Self::Buffered(data) => Some(data.duration()),
            Self::Stream { duration, .. } => *duration,
        }
    }
}

/// A created sound: the file it came from, its mode and its samples.
#[derive(Debug, Clone)]
pub struct SoundResource {
    /// File the sound was created from.
    pub path: PathBuf,
    /// Creation flags.
    pub mode: SoundMode,
    /// Sample source.
    pub source: SoundSource,
}

impl SoundResource {
    /// Create a sound resource.
    #[must_use]
    pub fn new(path: impl AsRef<Path>, mode: SoundMode, source: SoundSource) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            mode,
            source,
        }
    }
}

/// Directional attenuation cone.
///
/// Inside the inside angle the sound plays at full volume, outside the
/// outside angle at `outside_volume`, with linear interpolation between.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConeSettings {
    /// Full-volume cone angle in degrees (0-360).
    pub inside_angle: f32,
    /// Attenuated cone angle in degrees (0-360).
    pub outside_angle: f32,
    /// Volume outside the outside angle (0.0-1.0).
    pub outside_volume: f32,
}

impl Default for ConeSettings {
    fn default() -> Self {
        Self {
            inside_angle: 360.0,
            outside_angle: 360.0,
            outside_volume: 1.0,
        }
    }
}

impl ConeSettings {
    /// Create cone settings, clamping each value into its range.
    #[must_use]
    pub fn new(inside_angle: f32, outside_angle: f32, outside_volume: f32) -> Self {
        Self {
            inside_angle: clamp_f32(inside_angle, 0.0, 360.0),
            outside_angle: clamp_f32(outside_angle, 0.0, 360.0),
            outside_volume: clamp_f32(outside_volume, 0.0, 1.0),
        }
    }

    /// Whether the cone attenuates at all.
    #[must_use]
    pub fn is_omnidirectional(&self) -> bool {
        self.inside_angle >= 360.0 && self.outside_angle >= 360.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_handle_parts() {
        let handle = ChannelHandle::new(3, 9);
        assert_eq!(handle.index(), 3);
        assert_eq!(handle.generation(), 9);
        assert_ne!(handle, ChannelHandle::new(3, 10));
    }

    #[test]
    fn test_sound_mode_constructors() {
        let mode = SoundMode::sound(true).with_positional(true);
        assert!(mode.looping);
        assert!(!mode.streaming);
        assert!(mode.positional);
        assert!(SoundMode::stream(false).streaming);
    }

    #[test]
    fn test_sample_data_duration() {
        let data = SampleData::new(vec![0.0; 44_100 * 2], 44_100, 2);
        assert!((data.duration().as_secs_f32() - 1.0).abs() < 1e-4);
        assert_eq!(data.size_bytes(), 44_100 * 2 * 4);
    }

    #[test]
    fn test_cone_settings_clamp() {
        let cone = ConeSettings::new(400.0, -5.0, 2.0);
        assert_eq!(cone.inside_angle, 360.0);
        assert_eq!(cone.outside_angle, 0.0);
        assert_eq!(cone.outside_volume, 1.0);
        assert!(ConeSettings::default().is_omnidirectional());
    }
}
