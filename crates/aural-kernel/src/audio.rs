//! Audio Engine
//!
//! The process-scoped audio capability every other subsystem talks to. It
//! wraps a [`Mixer`] behind a lifecycle guard and turns every mixer error
//! into a logged sentinel, so callers never see a `Result`:
//!
//! | Return type        | Sentinel on failure |
//! |--------------------|---------------------|
//! | `bool` (success)   | `false`             |
//! | channel index      | `-1`                |
//! | handle / tuple     | `None`              |
//! | queried value      | its default         |
//!
//! Channels are reachable two ways: by stable index (the non-positional
//! API used by scripts) and by [`ChannelHandle`] (the positional API used
//! by providers).
//!
//! # Quick Start
//!
//! ```ignore
//! use aural_kernel::audio::{AudioEngine, BackendKind};
//!
//! let engine = AudioEngine::new(BackendKind::Rodio);
//! if engine.initialize(64) {
//!     if let Some(sound) = engine.create_sound("assets/sfx/click.wav", false) {
//!         let index = engine.play(sound, 0.8);
//!         engine.set_pan(index, -0.5);
//!     }
//!     engine.update();
//!     engine.shutdown();
//! }
//! ```

use std::fmt;
use std::path::Path;

use glam::{Vec2, Vec3};
use parking_lot::Mutex;
use tracing::{error, info, warn};

use crate::audio_backend::{
    AudioError, AudioResult, HeadlessBackend, HeadlessClock, RodioBackend, VoiceBackend,
};
use crate::audio_resource::{
    ChannelHandle, ConeSettings, SoundHandle, SoundMode, MAX_CHANNEL_COUNT,
};
use crate::audio_spatial::{cone_vector_from_degrees, degrees_from_cone_vector};
use crate::mixer::{Mixer, MixerConfig, DEFAULT_REAL_VOICES};

/// Lifecycle of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Created, not yet initialized.
    Uninitialized,
    /// Initialized and accepting operations.
    Running,
    /// Shut down after running.
    Shutdown,
}

/// Which voice backend `initialize` opens.
#[derive(Debug, Clone)]
pub enum BackendKind {
    /// The default output device through rodio.
    Rodio,
    /// No device; voices advance with the given clock.
    Headless(HeadlessClock),
}

impl BackendKind {
    fn open(&self) -> AudioResult<Box<dyn VoiceBackend>> {
        Ok(match self {
            Self::Rodio => Box::new(RodioBackend::new()?),
            Self::Headless(clock) => Box::new(HeadlessBackend::new(clock.clone())),
        })
    }
}

struct EngineInner {
    state: EngineState,
    mixer: Option<Mixer>,
}

/// Process-scoped audio engine handle.
///
/// Shared as `Arc<AudioEngine>`; every method takes `&self` and serializes
/// on an internal lock, so initialization and shutdown never race channel
/// operations.
pub struct AudioEngine {
    backend: BackendKind,
    max_real_voices: usize,
    inner: Mutex<EngineInner>,
}

impl fmt::Debug for AudioEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioEngine")
            .field("backend", &self.backend)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl AudioEngine {
    /// Create an uninitialized engine that will open `backend`.
    #[must_use]
    pub fn new(backend: BackendKind) -> Self {
        Self {
            backend,
            max_real_voices: DEFAULT_REAL_VOICES,
            inner: Mutex::new(EngineInner {
                state: EngineState::Uninitialized,
                mixer: None,
            }),
        }
    }

    /// Create an uninitialized headless engine driven by `clock`.
    #[must_use]
    pub fn headless(clock: HeadlessClock) -> Self {
        Self::new(BackendKind::Headless(clock))
    }

    /// Set how many channels are mixed to the output at once.
    #[must_use]
    pub fn with_max_real_voices(mut self, max_real_voices: usize) -> Self {
        self.max_real_voices = max_real_voices;
        self
    }

    // ============================================
    // Lifecycle
    // ============================================

    /// Open the backend and create a mixer with `max_channels` logical
    /// channels (1-4093). Returns `false` and logs on failure.
    pub fn initialize(&self, max_channels: u32) -> bool {
        if max_channels == 0 || max_channels > MAX_CHANNEL_COUNT {
            error!(
                "AudioEngine::initialize - max_channels must be between 1 and {}, got {}",
                MAX_CHANNEL_COUNT, max_channels
            );
            return false;
        }

        let mut inner = self.inner.lock();
        if inner.state == EngineState::Running {
            warn!("AudioEngine::initialize - already initialized");
            return false;
        }

        let config = MixerConfig::default()
            .with_max_channels(max_channels)
            .with_max_real_voices(self.max_real_voices);

        let mixer = match self.backend.open().and_then(|b| Mixer::new(b, config)) {
            Ok(mut mixer) => {
                mixer.set_listener_attributes(Vec3::ZERO, Vec3::ZERO);
                mixer
            },
            Err(e) => {
                error!("AudioEngine::initialize - {}", e);
                return false;
            },
        };

        info!(
            "Audio engine initialized: {} backend, {} channels",
            mixer.backend_name(),
            max_channels
        );
        inner.mixer = Some(mixer);
        inner.state = EngineState::Running;
        true
    }

    /// Release the mixer and backend.
    pub fn shutdown(&self) {
        let mut inner = self.inner.lock();
        if inner.state != EngineState::Running {
            warn!("AudioEngine::shutdown - engine is not running");
            return;
        }
        inner.mixer = None;
        inner.state = EngineState::Shutdown;
        info!("Audio engine shut down");
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> EngineState {
        self.inner.lock().state
    }

    /// Whether the engine is running.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.state() == EngineState::Running
    }

    /// Run `f` on the mixer, logging and returning `None` if the engine is
    /// not running or `f` fails.
    fn with_mixer<R>(&self, op: &str, f: impl FnOnce(&mut Mixer) -> AudioResult<R>) -> Option<R> {
        let mut inner = self.inner.lock();
        let Some(mixer) = inner.mixer.as_mut() else {
            warn!("AudioEngine::{} - {}", op, AudioError::NotInitialized);
            return None;
        };
        match f(mixer) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("AudioEngine::{} - {}", op, e);
                None
            },
        }
    }

    fn with_channel<R>(
        &self,
        op: &str,
        index: i32,
        f: impl FnOnce(&mut Mixer, ChannelHandle) -> AudioResult<R>,
    ) -> Option<R> {
        self.with_mixer(op, |mixer| {
            let handle = mixer.channel_handle(index)?;
            f(mixer, handle)
        })
    }

    /// Engine update pass: reaps ended channels, refreshes spatialization
    /// and real/virtual voice assignment.
    pub fn update(&self) {
        self.with_mixer("update", |mixer| {
            mixer.update();
            Ok(())
        });
    }

    // ============================================
    // Sounds
    // ============================================

    fn create(&self, op: &str, file: &Path, mode: SoundMode) -> Option<SoundHandle> {
        self.with_mixer(op, |mixer| mixer.create_sound(file, mode))
    }

    /// Create a non-positional sound decoded into memory.
    pub fn create_sound(&self, file: impl AsRef<Path>, looping: bool) -> Option<SoundHandle> {
        self.create("create_sound", file.as_ref(), SoundMode::sound(looping))
    }

    /// Create a non-positional sound streamed from storage.
    pub fn create_stream(&self, file: impl AsRef<Path>, looping: bool) -> Option<SoundHandle> {
        self.create("create_stream", file.as_ref(), SoundMode::stream(looping))
    }

    /// Create a positional sound decoded into memory.
    pub fn create_positional_sound(
        &self,
        file: impl AsRef<Path>,
        looping: bool,
    ) -> Option<SoundHandle> {
        self.create(
            "create_positional_sound",
            file.as_ref(),
            SoundMode::sound(looping).with_positional(true),
        )
    }

    /// Create a positional sound streamed from storage.
    pub fn create_positional_stream(
        &self,
        file: impl AsRef<Path>,
        looping: bool,
    ) -> Option<SoundHandle> {
        self.create(
            "create_positional_stream",
            file.as_ref(),
            SoundMode::stream(looping).with_positional(true),
        )
    }

    /// Release a sound, stopping any channel still playing it.
    pub fn release_sound(&self, sound: SoundHandle) -> bool {
        self.with_mixer("release_sound", |mixer| mixer.release_sound(sound))
            .is_some()
    }

    /// Release a sound as soon as no channel is playing it.
    pub fn release_sound_when_idle(&self, sound: SoundHandle) -> bool {
        self.with_mixer("release_sound_when_idle", |mixer| {
            mixer.release_sound_when_idle(sound)
        })
        .is_some()
    }

    // ============================================
    // Channels by index
    // ============================================

    /// Play a non-positional sound at `volume`. Returns the channel index
    /// or -1.
    pub fn play(&self, sound: SoundHandle, volume: f32) -> i32 {
        self.with_mixer("play", |mixer| {
            let handle = mixer.play_sound(sound, true)?;
            let started = mixer
                .set_volume(handle, volume)
                .and_then(|()| mixer.set_paused(handle, false));
            if let Err(e) = started {
                // Never leave a half-started channel holding a slot.
                let _ = mixer.stop(handle);
                return Err(e);
            }
            mixer.update();
            Ok(handle.index() as i32)
        })
        .unwrap_or(-1)
    }

    /// Handle of the channel at `index`.
    pub fn channel_at(&self, index: i32) -> Option<ChannelHandle> {
        self.with_mixer("channel_at", |mixer| mixer.channel_handle(index))
    }

    /// Stop the channel at `index`.
    pub fn stop(&self, index: i32) {
        self.with_channel("stop", index, Mixer::stop);
    }

    /// Stop every channel.
    pub fn stop_all(&self) {
        self.with_mixer("stop_all", |mixer| {
            mixer.stop_all();
            Ok(())
        });
    }

    /// Pause or resume the channel at `index`.
    pub fn set_paused(&self, index: i32, paused: bool) {
        self.with_channel("set_paused", index, |m, h| m.set_paused(h, paused));
    }

    /// Whether the channel at `index` is paused.
    pub fn paused(&self, index: i32) -> bool {
        self.with_channel("paused", index, |m, h| m.paused(h))
            .unwrap_or(false)
    }

    /// Whether the channel at `index` is still playing.
    pub fn is_playing(&self, index: i32) -> bool {
        self.with_channel("is_playing", index, |m, h| m.is_playing(h))
            .unwrap_or(false)
    }

    /// Set the volume of the channel at `index`.
    pub fn set_volume(&self, index: i32, volume: f32) {
        self.with_channel("set_volume", index, |m, h| m.set_volume(h, volume));
    }

    /// Volume of the channel at `index`.
    pub fn volume(&self, index: i32) -> f32 {
        self.with_channel("volume", index, |m, h| m.volume(h))
            .unwrap_or(0.0)
    }

    /// Mute or unmute the channel at `index`.
    pub fn set_mute(&self, index: i32, mute: bool) {
        self.with_channel("set_mute", index, |m, h| m.set_mute(h, mute));
    }

    /// Whether the channel at `index` is muted.
    pub fn mute(&self, index: i32) -> bool {
        self.with_channel("mute", index, |m, h| m.mute(h))
            .unwrap_or(false)
    }

    /// Set the pan of the channel at `index`, clamped to [-1, 1].
    pub fn set_pan(&self, index: i32, pan: f32) {
        self.with_channel("set_pan", index, |m, h| m.set_pan(h, pan));
    }

    /// Pan of the channel at `index`.
    pub fn pan(&self, index: i32) -> f32 {
        self.with_channel("pan", index, |m, h| m.pan(h))
            .unwrap_or(0.0)
    }

    // ============================================
    // Channels by handle
    // ============================================

    /// Allocate a paused channel for a positional sound.
    pub fn create_positional_channel(&self, sound: SoundHandle) -> Option<ChannelHandle> {
        self.with_mixer("create_positional_channel", |mixer| {
            mixer.play_sound(sound, true)
        })
    }

    /// Stable index of a channel, or -1.
    pub fn channel_index(&self, channel: ChannelHandle) -> i32 {
        self.with_mixer("channel_index", |mixer| {
            mixer.is_playing(channel)?;
            Ok(channel.index() as i32)
        })
        .unwrap_or(-1)
    }

    /// Stop a channel.
    pub fn stop_channel(&self, channel: ChannelHandle) {
        self.with_mixer("stop_channel", |m| m.stop(channel));
    }

    /// Pause or resume a channel.
    pub fn set_channel_paused(&self, channel: ChannelHandle, paused: bool) -> bool {
        self.with_mixer("set_channel_paused", |m| m.set_paused(channel, paused))
            .is_some()
    }

    /// Whether a channel is paused.
    pub fn channel_paused(&self, channel: ChannelHandle) -> bool {
        self.with_mixer("channel_paused", |m| m.paused(channel))
            .unwrap_or(false)
    }

    /// Whether a channel is still playing.
    pub fn channel_playing(&self, channel: ChannelHandle) -> bool {
        self.with_mixer("channel_playing", |m| m.is_playing(channel))
            .unwrap_or(false)
    }

    /// Whether a channel is virtual.
    pub fn channel_virtual(&self, channel: ChannelHandle) -> bool {
        self.with_mixer("channel_virtual", |m| m.is_virtual(channel))
            .unwrap_or(false)
    }

    /// Set the volume of a channel.
    pub fn set_channel_volume(&self, channel: ChannelHandle, volume: f32) -> bool {
        self.with_mixer("set_channel_volume", |m| m.set_volume(channel, volume))
            .is_some()
    }

    /// Volume of a channel.
    pub fn channel_volume(&self, channel: ChannelHandle) -> f32 {
        self.with_mixer("channel_volume", |m| m.volume(channel))
            .unwrap_or(0.0)
    }

    /// Mute or unmute a channel.
    pub fn set_channel_mute(&self, channel: ChannelHandle, mute: bool) -> bool {
        self.with_mixer("set_channel_mute", |m| m.set_mute(channel, mute))
            .is_some()
    }

    /// Whether a channel is muted.
    pub fn channel_mute(&self, channel: ChannelHandle) -> bool {
        self.with_mixer("channel_mute", |m| m.mute(channel))
            .unwrap_or(false)
    }

    /// Set the pan of a channel, clamped to [-1, 1].
    pub fn set_channel_pan(&self, channel: ChannelHandle, pan: f32) -> bool {
        self.with_mixer("set_channel_pan", |m| m.set_pan(channel, pan))
            .is_some()
    }

    /// Pan of a channel.
    pub fn channel_pan(&self, channel: ChannelHandle) -> f32 {
        self.with_mixer("channel_pan", |m| m.pan(channel))
            .unwrap_or(0.0)
    }

    /// Volume a channel is heard at.
    pub fn channel_audibility(&self, channel: ChannelHandle) -> f32 {
        self.with_mixer("channel_audibility", |m| m.audibility(channel))
            .unwrap_or(0.0)
    }

    /// Set 3D position and velocity of a channel.
    pub fn set_channel_3d_attributes(
        &self,
        channel: ChannelHandle,
        position: Vec3,
        velocity: Vec3,
    ) -> bool {
        self.with_mixer("set_channel_3d_attributes", |m| {
            m.set_3d_attributes(channel, position, velocity)
        })
        .is_some()
    }

    /// 3D position and velocity of a channel.
    pub fn channel_3d_attributes(&self, channel: ChannelHandle) -> Option<(Vec3, Vec3)> {
        self.with_mixer("channel_3d_attributes", |m| m.attributes_3d(channel))
    }

    /// Set the rolloff distances of a channel.
    pub fn set_channel_3d_min_max_distance(
        &self,
        channel: ChannelHandle,
        min: f32,
        max: f32,
    ) -> bool {
        self.with_mixer("set_channel_3d_min_max_distance", |m| {
            m.set_3d_min_max_distance(channel, min, max)
        })
        .is_some()
    }

    /// Rolloff distances of a channel.
    pub fn channel_3d_min_max_distance(&self, channel: ChannelHandle) -> Option<(f32, f32)> {
        self.with_mixer("channel_3d_min_max_distance", |m| {
            m.min_max_distance_3d(channel)
        })
    }

    /// Point a channel's cone at `degrees` in the X/Y plane.
    pub fn set_channel_cone_orientation(&self, channel: ChannelHandle, degrees: f32) -> bool {
        let orientation = cone_vector_from_degrees(degrees);
        self.with_mixer("set_channel_cone_orientation", |m| {
            m.set_cone_orientation(channel, orientation)
        })
        .is_some()
    }

    /// Heading of a channel's cone in degrees.
    pub fn channel_cone_orientation(&self, channel: ChannelHandle) -> Option<f32> {
        self.with_mixer("channel_cone_orientation", |m| m.cone_orientation(channel))
            .map(degrees_from_cone_vector)
    }

    /// Set a channel's cone angles and outside volume.
    pub fn set_channel_cone_settings(&self, channel: ChannelHandle, cone: ConeSettings) -> bool {
        self.with_mixer("set_channel_cone_settings", |m| {
            m.set_cone_settings(channel, cone)
        })
        .is_some()
    }

    /// A channel's cone angles and outside volume.
    pub fn channel_cone_settings(&self, channel: ChannelHandle) -> Option<ConeSettings> {
        self.with_mixer("channel_cone_settings", |m| m.cone_settings(channel))
    }

    // ============================================
    // Listener
    // ============================================

    /// Move the listener in the X/Y plane.
    pub fn set_listener_position(&self, position: Vec2) {
        self.with_mixer("set_listener_position", |m| {
            m.set_listener_attributes(position.extend(0.0), Vec3::ZERO);
            Ok(())
        });
    }

    /// Listener position in the X/Y plane.
    pub fn listener_position(&self) -> Vec2 {
        self.with_mixer("listener_position", |m| Ok(m.listener_position().truncate()))
            .unwrap_or(Vec2::ZERO)
    }

    /// Number of listeners. The engine always has exactly one while running.
    pub fn listener_count(&self) -> i32 {
        self.with_mixer("listener_count", |_| Ok(1))
            .unwrap_or(0)
    }

    /// Number of channels that have not ended.
    pub fn playing_count(&self) -> usize {
        self.with_mixer("playing_count", |m| Ok(m.playing_count()))
            .unwrap_or(0)
    }
}
