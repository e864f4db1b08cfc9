//! Channel Mixer
//!
//! Owns the sound table, the logical channel table and the listener, and
//! drives voices on a [`VoiceBackend`].
//!
//! Every played sound occupies a logical channel. A channel is *real* while
//! it is audible and among the `max_real_voices` loudest channels, and
//! *virtual* otherwise. Virtual channels keep their playback position and
//! parameters but output silence; they become real again as soon as they
//! are loud enough.
//!
//! A channel *ends* when it is stopped or when a non-looping sound runs out
//! of samples. Ended channels keep answering queries until their slot is
//! reused by a later play.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use glam::Vec3;
use tracing::{debug, trace};

use crate::audio_backend::{
    decode_file, probe_stream, AudioError, AudioResult, StereoGains, VoiceBackend, VoiceId,
};
use crate::audio_resource::{
    ChannelHandle, ConeSettings, SoundHandle, SoundMode, SoundResource, SoundSource,
    DEFAULT_MAX_DISTANCE, DEFAULT_MIN_DISTANCE, MAX_CHANNEL_COUNT,
};
use crate::audio_spatial::{
    pan_gains, SpatialAudioProcessor, SpatialParams, SpatialSource, MIN_AUDIBLE_VOLUME,
};

/// Default number of channels mixed to the output at once.
pub const DEFAULT_REAL_VOICES: usize = 32;

/// Mixer configuration.
#[derive(Debug, Clone, Copy)]
pub struct MixerConfig {
    /// Number of logical channels (1-4093).
    pub max_channels: u32,
    /// Number of channels audible at once; the rest go virtual.
    pub max_real_voices: usize,
    /// Whether positional channels get a Doppler pitch shift.
    pub doppler_enabled: bool,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            max_channels: 512,
            max_real_voices: DEFAULT_REAL_VOICES,
            doppler_enabled: true,
        }
    }
}

impl MixerConfig {
    /// Create with the given logical channel count.
    #[must_use]
    pub fn with_max_channels(mut self, max_channels: u32) -> Self {
        self.max_channels = max_channels;
        self
    }

    /// Create with the given real voice budget.
    #[must_use]
    pub fn with_max_real_voices(mut self, max_real_voices: usize) -> Self {
        self.max_real_voices = max_real_voices;
        self
    }

    /// Check the configuration.
    pub fn validate(&self) -> AudioResult<()> {
        if self.max_channels == 0 || self.max_channels > MAX_CHANNEL_COUNT {
            return Err(AudioError::InvalidParameter(format!(
                "max_channels must be between 1 and {MAX_CHANNEL_COUNT}, got {}",
                self.max_channels
            )));
        }
        Ok(())
    }
}

/// State of one logical channel.
#[derive(Debug)]
struct ChannelState {
    sound: Arc<SoundResource>,
    voice: VoiceId,
    positional: bool,
    paused: bool,
    muted: bool,
    volume: f32,
    pan: f32,
    ended: bool,
    is_virtual: bool,
    position: Vec3,
    velocity: Vec3,
    min_distance: f32,
    max_distance: f32,
    cone_orientation: Vec3,
    cone: ConeSettings,
    spatial: SpatialParams,
}

impl ChannelState {
    fn new(sound: Arc<SoundResource>, voice: VoiceId, paused: bool) -> Self {
        let positional = sound.mode.positional;
        Self {
            sound,
            voice,
            positional,
            paused,
            muted: false,
            volume: 1.0,
            pan: 0.0,
            ended: false,
            is_virtual: false,
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            min_distance: DEFAULT_MIN_DISTANCE,
            max_distance: DEFAULT_MAX_DISTANCE,
            cone_orientation: Vec3::Z,
            cone: ConeSettings::default(),
            spatial: SpatialParams::silent(),
        }
    }

    fn refresh_spatial(&mut self, processor: &SpatialAudioProcessor) {
        self.spatial = if self.positional {
            processor.calculate(&SpatialSource {
                position: self.position,
                velocity: self.velocity,
                volume: self.volume,
                min_distance: self.min_distance,
                max_distance: self.max_distance,
                cone: self.cone,
                cone_orientation: self.cone_orientation,
            })
        } else {
            let (left, right) = pan_gains(self.pan);
            SpatialParams {
                left_volume: self.volume * left,
                right_volume: self.volume * right,
                pan: self.pan,
                mono_volume: self.volume,
                audible: self.volume >= MIN_AUDIBLE_VOLUME,
                ..SpatialParams::silent()
            }
        };
    }

    fn audibility(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.spatial.mono_volume
        }
    }

    fn output_gains(&self) -> StereoGains {
        if self.muted || self.is_virtual {
            StereoGains::SILENT
        } else {
            StereoGains {
                left: self.spatial.left_volume,
                right: self.spatial.right_volume,
            }
        }
    }
}

#[derive(Debug, Default)]
struct ChannelSlot {
    generation: u32,
    channel: Option<ChannelState>,
}

impl ChannelSlot {
    fn is_free(&self) -> bool {
        self.channel.as_ref().map_or(true, |c| c.ended)
    }
}

/// Sound table, channel table and listener on top of a voice backend.
#[derive(Debug)]
pub struct Mixer {
    backend: Box<dyn VoiceBackend>,
    config: MixerConfig,
    sounds: HashMap<SoundHandle, Arc<SoundResource>>,
    release_when_idle: HashSet<SoundHandle>,
    next_sound: u64,
    slots: Vec<ChannelSlot>,
    spatial: SpatialAudioProcessor,
}

impl Mixer {
    /// Create a mixer over `backend`.
    pub fn new(backend: Box<dyn VoiceBackend>, config: MixerConfig) -> AudioResult<Self> {
        config.validate()?;

        let mut spatial = SpatialAudioProcessor::new();
        spatial.set_doppler_enabled(config.doppler_enabled);

        let slots = (0..config.max_channels).map(|_| ChannelSlot::default()).collect();

        debug!(
            "Created mixer on {} backend: {} channels, {} real voices",
            backend.name(),
            config.max_channels,
            config.max_real_voices
        );

        Ok(Self {
            backend,
            config,
            sounds: HashMap::new(),
            release_when_idle: HashSet::new(),
            next_sound: 1,
            slots,
            spatial,
        })
    }

    /// Backend name.
    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Mixer configuration.
    #[must_use]
    pub const fn config(&self) -> &MixerConfig {
        &self.config
    }

    // ============================================
    // Sounds
    // ============================================

    /// Create a sound from a file.
    ///
    /// In-memory sounds are decoded here; streams are checked for
    /// decodability and re-opened per channel.
    pub fn create_sound(&mut self, path: impl AsRef<Path>, mode: SoundMode) -> AudioResult<SoundHandle> {
        let path = path.as_ref();
        let source = if mode.streaming {
            SoundSource::Stream {
                path: path.to_path_buf(),
                duration: probe_stream(path)?,
            }
        } else {
            SoundSource::Buffered(decode_file(path)?)
        };

        let handle = SoundHandle::new(self.next_sound);
        self.next_sound += 1;
        self.sounds
            .insert(handle, Arc::new(SoundResource::new(path, mode, source)));

        debug!("Created sound {:?} from {:?} ({:?})", handle, path, mode);
        Ok(handle)
    }

    /// Release a sound. Channels playing it are stopped.
    pub fn release_sound(&mut self, sound: SoundHandle) -> AudioResult<()> {
        let resource = self.sounds.remove(&sound).ok_or(AudioError::InvalidSound)?;

        for slot in &mut self.slots {
            if let Some(channel) = slot.channel.as_mut() {
                if !channel.ended && Arc::ptr_eq(&channel.sound, &resource) {
                    self.backend.stop_voice(channel.voice);
                    channel.ended = true;
                    channel.is_virtual = false;
                }
            }
        }

        self.release_when_idle.remove(&sound);
        debug!("Released sound {:?}", sound);
        Ok(())
    }

    /// Release a sound once no channel is playing it. Checked on every
    /// [`Mixer::update`].
    pub fn release_sound_when_idle(&mut self, sound: SoundHandle) -> AudioResult<()> {
        if !self.sounds.contains_key(&sound) {
            return Err(AudioError::InvalidSound);
        }
        self.release_when_idle.insert(sound);
        Ok(())
    }

    fn sound_in_use(&self, sound: SoundHandle) -> bool {
        let Some(resource) = self.sounds.get(&sound) else {
            return false;
        };
        self.slots
            .iter()
            .filter_map(|slot| slot.channel.as_ref())
            .any(|channel| !channel.ended && Arc::ptr_eq(&channel.sound, resource))
    }

    fn release_idle_sounds(&mut self) {
        let idle: Vec<SoundHandle> = self
            .release_when_idle
            .iter()
            .copied()
            .filter(|sound| !self.sound_in_use(*sound))
            .collect();
        for sound in idle {
            self.release_when_idle.remove(&sound);
            if self.sounds.remove(&sound).is_some() {
                debug!("Released idle sound {:?}", sound);
            }
        }
    }

    /// Number of live sounds.
    #[must_use]
    pub fn sound_count(&self) -> usize {
        self.sounds.len()
    }

    // ============================================
    // Channels
    // ============================================

    /// Play a sound on a free channel, optionally starting paused.
    pub fn play_sound(&mut self, sound: SoundHandle, paused: bool) -> AudioResult<ChannelHandle> {
        let resource = Arc::clone(self.sounds.get(&sound).ok_or(AudioError::InvalidSound)?);

        let index = self
            .slots
            .iter()
            .position(ChannelSlot::is_free)
            .ok_or(AudioError::NoFreeChannels {
                max: self.config.max_channels,
            })?;

        let mut channel = ChannelState::new(Arc::clone(&resource), 0, paused);
        channel.refresh_spatial(&self.spatial);
        channel.is_virtual = channel.audibility() < MIN_AUDIBLE_VOLUME;

        channel.voice = self.backend.start_voice(&resource, channel.output_gains())?;
        if !paused {
            self.backend.set_paused(channel.voice, false);
        }

        let slot = &mut self.slots[index];
        slot.generation = slot.generation.wrapping_add(1);
        slot.channel = Some(channel);

        let handle = ChannelHandle::new(index as u32, slot.generation);
        trace!("Playing {:?} on channel {}", sound, index);
        Ok(handle)
    }

    /// Handle of the channel currently occupying `index`.
    pub fn channel_handle(&self, index: i32) -> AudioResult<ChannelHandle> {
        let slot = usize::try_from(index)
            .ok()
            .and_then(|i| self.slots.get(i))
            .filter(|slot| slot.channel.is_some())
            .ok_or(AudioError::InvalidChannelIndex(index))?;
        Ok(ChannelHandle::new(index as u32, slot.generation))
    }

    fn channel(&self, handle: ChannelHandle) -> AudioResult<&ChannelState> {
        self.slots
            .get(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.channel.as_ref())
            .ok_or(AudioError::InvalidHandle)
    }

    fn channel_mut(&mut self, handle: ChannelHandle) -> AudioResult<&mut ChannelState> {
        self.slots
            .get_mut(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.channel.as_mut())
            .ok_or(AudioError::InvalidHandle)
    }

    /// Apply `edit` to a channel and push its new output gains.
    fn edit_channel(
        &mut self,
        handle: ChannelHandle,
        edit: impl FnOnce(&mut ChannelState),
    ) -> AudioResult<()> {
        let slot = self
            .slots
            .get_mut(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
            .ok_or(AudioError::InvalidHandle)?;
        let channel = slot.channel.as_mut().ok_or(AudioError::InvalidHandle)?;

        edit(channel);
        if !channel.ended {
            channel.refresh_spatial(&self.spatial);
            self.backend.set_gains(channel.voice, channel.output_gains());
        }
        Ok(())
    }

    /// Stop a channel. Stopping an ended channel does nothing.
    pub fn stop(&mut self, handle: ChannelHandle) -> AudioResult<()> {
        let channel = self
            .slots
            .get_mut(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.channel.as_mut())
            .ok_or(AudioError::InvalidHandle)?;
        if !channel.ended {
            self.backend.stop_voice(channel.voice);
            channel.ended = true;
            channel.is_virtual = false;
        }
        Ok(())
    }

    /// Stop every channel.
    pub fn stop_all(&mut self) {
        self.backend.stop_all();
        for channel in self.slots.iter_mut().filter_map(|s| s.channel.as_mut()) {
            channel.ended = true;
            channel.is_virtual = false;
        }
    }

    /// Pause or resume a channel.
    pub fn set_paused(&mut self, handle: ChannelHandle, paused: bool) -> AudioResult<()> {
        let channel = self.channel_mut(handle)?;
        channel.paused = paused;
        if !channel.ended {
            let voice = channel.voice;
            self.backend.set_paused(voice, paused);
        }
        Ok(())
    }

    /// Whether a channel is paused.
    pub fn paused(&self, handle: ChannelHandle) -> AudioResult<bool> {
        Ok(self.channel(handle)?.paused)
    }

    /// Whether a channel is still playing (paused channels count).
    pub fn is_playing(&self, handle: ChannelHandle) -> AudioResult<bool> {
        Ok(!self.channel(handle)?.ended)
    }

    /// Whether a channel is currently virtual.
    pub fn is_virtual(&self, handle: ChannelHandle) -> AudioResult<bool> {
        Ok(self.channel(handle)?.is_virtual)
    }

    /// Set channel volume. Negative values are treated as silence.
    pub fn set_volume(&mut self, handle: ChannelHandle, volume: f32) -> AudioResult<()> {
        if volume.is_nan() {
            return Err(AudioError::InvalidParameter("volume is NaN".to_string()));
        }
        self.edit_channel(handle, |c| c.volume = volume.max(0.0))
    }

    /// Channel volume.
    pub fn volume(&self, handle: ChannelHandle) -> AudioResult<f32> {
        Ok(self.channel(handle)?.volume)
    }

    /// Mute or unmute a channel.
    pub fn set_mute(&mut self, handle: ChannelHandle, mute: bool) -> AudioResult<()> {
        self.edit_channel(handle, |c| c.muted = mute)
    }

    /// Whether a channel is muted.
    pub fn mute(&self, handle: ChannelHandle) -> AudioResult<bool> {
        Ok(self.channel(handle)?.muted)
    }

    /// Set stereo pan of a non-positional channel (-1.0 to 1.0).
    pub fn set_pan(&mut self, handle: ChannelHandle, pan: f32) -> AudioResult<()> {
        if pan.is_nan() {
            return Err(AudioError::InvalidParameter("pan is NaN".to_string()));
        }
        self.edit_channel(handle, |c| c.pan = pan.clamp(-1.0, 1.0))
    }

    /// Channel pan.
    pub fn pan(&self, handle: ChannelHandle) -> AudioResult<f32> {
        Ok(self.channel(handle)?.pan)
    }

    /// Volume the channel is heard at after mute, rolloff and cone.
    pub fn audibility(&self, handle: ChannelHandle) -> AudioResult<f32> {
        let channel = self.channel(handle)?;
        Ok(if channel.ended { 0.0 } else { channel.audibility() })
    }

    /// Set 3D position and velocity of a channel.
    pub fn set_3d_attributes(
        &mut self,
        handle: ChannelHandle,
        position: Vec3,
        velocity: Vec3,
    ) -> AudioResult<()> {
        if !position.is_finite() || !velocity.is_finite() {
            return Err(AudioError::InvalidParameter(
                "3D attributes must be finite".to_string(),
            ));
        }
        self.edit_channel(handle, |c| {
            c.position = position;
            c.velocity = velocity;
        })
    }

    /// 3D position and velocity of a channel.
    pub fn attributes_3d(&self, handle: ChannelHandle) -> AudioResult<(Vec3, Vec3)> {
        let channel = self.channel(handle)?;
        Ok((channel.position, channel.velocity))
    }

    /// Set the rolloff distances of a channel. The order of the two is not
    /// enforced; a maximum below the minimum cuts off at the minimum.
    pub fn set_3d_min_max_distance(
        &mut self,
        handle: ChannelHandle,
        min_distance: f32,
        max_distance: f32,
    ) -> AudioResult<()> {
        if !(min_distance >= 0.0 && max_distance >= 0.0) {
            return Err(AudioError::InvalidParameter(format!(
                "distances must be non-negative, got ({min_distance}, {max_distance})"
            )));
        }
        self.edit_channel(handle, |c| {
            c.min_distance = min_distance;
            c.max_distance = max_distance;
        })
    }

    /// Rolloff distances of a channel.
    pub fn min_max_distance_3d(&self, handle: ChannelHandle) -> AudioResult<(f32, f32)> {
        let channel = self.channel(handle)?;
        Ok((channel.min_distance, channel.max_distance))
    }

    /// Set the direction the channel's cone points in.
    pub fn set_cone_orientation(&mut self, handle: ChannelHandle, orientation: Vec3) -> AudioResult<()> {
        if !orientation.is_finite() {
            return Err(AudioError::InvalidParameter(
                "cone orientation must be finite".to_string(),
            ));
        }
        self.edit_channel(handle, |c| c.cone_orientation = orientation)
    }

    /// Direction the channel's cone points in.
    pub fn cone_orientation(&self, handle: ChannelHandle) -> AudioResult<Vec3> {
        Ok(self.channel(handle)?.cone_orientation)
    }

    /// Set the channel's cone angles and outside volume.
    pub fn set_cone_settings(&mut self, handle: ChannelHandle, cone: ConeSettings) -> AudioResult<()> {
        let cone = ConeSettings::new(cone.inside_angle, cone.outside_angle, cone.outside_volume);
        self.edit_channel(handle, |c| c.cone = cone)
    }

    /// The channel's cone angles and outside volume.
    pub fn cone_settings(&self, handle: ChannelHandle) -> AudioResult<ConeSettings> {
        Ok(self.channel(handle)?.cone)
    }

    /// Number of channels that have not ended.
    #[must_use]
    pub fn playing_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.channel.as_ref().is_some_and(|c| !c.ended))
            .count()
    }

    // ============================================
    // Listener
    // ============================================

    /// Set the listener position and velocity.
    pub fn set_listener_attributes(&mut self, position: Vec3, velocity: Vec3) {
        self.spatial.set_listener_attributes(position, velocity);
    }

    /// Listener position.
    #[must_use]
    pub fn listener_position(&self) -> Vec3 {
        self.spatial.listener().position
    }

    // ============================================
    // Update
    // ============================================

    /// Reap finished channels, recompute spatial parameters and assign
    /// real voices to the loudest channels.
    pub fn update(&mut self) {
        self.backend.update();

        let mut ranking: Vec<(usize, f32)> = Vec::new();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let Some(channel) = slot.channel.as_mut() else {
                continue;
            };
            if channel.ended {
                continue;
            }
            if self.backend.is_finished(channel.voice) {
                self.backend.stop_voice(channel.voice);
                channel.ended = true;
                channel.is_virtual = false;
                trace!("Channel {} finished", index);
                continue;
            }
            channel.refresh_spatial(&self.spatial);
            ranking.push((index, channel.audibility()));
        }

        // Loudest first; ties keep channel order.
        ranking.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

        for (rank, (index, audibility)) in ranking.into_iter().enumerate() {
            let Some(channel) = self.slots[index].channel.as_mut() else {
                continue;
            };
            let was_virtual = channel.is_virtual;
            channel.is_virtual =
                audibility < MIN_AUDIBLE_VOLUME || rank >= self.config.max_real_voices;
            if was_virtual != channel.is_virtual {
                trace!("Channel {} virtual: {}", index, channel.is_virtual);
            }
            self.backend.set_gains(channel.voice, channel.output_gains());
            self.backend.set_speed(channel.voice, channel.spatial.pitch);
        }

        self.release_idle_sounds();
    }
}

impl Drop for Mixer {
    fn drop(&mut self) {
        self.backend.stop_all();
    }
}
