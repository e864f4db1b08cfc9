//! Audio provider.
//!
//! Binds one audio asset to at most one live positional channel and keeps
//! them in sync:
//!
//! ```text
//! Empty ──allocate/set_audio──▶ Bound ──sound created──▶ Ready
//!                                                        │ play_audio
//!                                                        ▼
//!              Finished ◀──natural end / stop_audio── Playing ⇄ Paused
//! ```
//!
//! Asset edits and hot reloads reach the provider through a registered
//! observer. The observer only raises a flag; the provider restarts its
//! channel on the next [`AudioProvider::update`], so the asset never calls
//! back into a provider that is in the middle of an operation.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use aural_assets::{AssetDatabase, AssetObserver, AssetPtr, AudioAsset};
use aural_common::{clamp_unit, AssetId};
use aural_kernel::{AudioEngine, ChannelHandle, ConeSettings, SoundHandle};
use glam::{Vec2, Vec3};
use tracing::{debug, trace, warn};

use crate::source::AudioSource;

/// Called once when playback ends on its own.
pub type AudioEndCallback = Box<dyn FnMut() + Send>;

/// Where a provider is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderState {
    /// No asset bound.
    Empty,
    /// Asset bound, no sound created.
    Bound,
    /// Sound created, never played.
    Ready,
    /// Channel playing.
    Playing,
    /// Channel paused.
    Paused,
    /// Playback ended or stopped.
    Finished,
}

#[derive(Debug, Default)]
struct RefreshFlag(AtomicBool);

impl RefreshFlag {
    fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

impl AssetObserver for RefreshFlag {
    fn on_asset_refreshed(&self, _asset: &AudioAsset) {
        self.0.store(true, Ordering::Release);
    }
}

/// Plays one audio asset on one positional channel.
pub struct AudioProvider {
    engine: Arc<AudioEngine>,
    asset: AssetPtr,
    sound: Option<SoundHandle>,
    channel: Option<ChannelHandle>,
    playing: bool,
    paused: bool,
    finished: bool,
    is_virtual: bool,
    self_tick: bool,
    processing_ticks: bool,
    audio_position: Vec2,
    cone_orientation: Option<f32>,
    refresh: Arc<RefreshFlag>,
    observer: Option<Arc<dyn AssetObserver>>,
    refresh_count: u64,
    on_audio_end: Option<AudioEndCallback>,
}

impl fmt::Debug for AudioProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioProvider")
            .field("asset", &self.asset.asset_id())
            .field("state", &self.state())
            .field("sound", &self.sound)
            .field("channel", &self.channel)
            .field("virtual", &self.is_virtual)
            .field("processing_ticks", &self.processing_ticks)
            .field("audio_position", &self.audio_position)
            .finish_non_exhaustive()
    }
}

impl AudioProvider {
    /// Create an empty provider playing through `engine`.
    #[must_use]
    pub fn new(engine: Arc<AudioEngine>) -> Self {
        Self {
            engine,
            asset: AssetPtr::new(),
            sound: None,
            channel: None,
            playing: false,
            paused: false,
            finished: true,
            is_virtual: false,
            self_tick: true,
            processing_ticks: false,
            audio_position: Vec2::ZERO,
            cone_orientation: None,
            refresh: Arc::new(RefreshFlag::default()),
            observer: None,
            refresh_count: 0,
            on_audio_end: None,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ProviderState {
        if self.asset.is_null() {
            ProviderState::Empty
        } else if self.sound.is_none() {
            ProviderState::Bound
        } else if self.channel.is_none() {
            ProviderState::Ready
        } else if self.finished {
            ProviderState::Finished
        } else if self.paused {
            ProviderState::Paused
        } else {
            ProviderState::Playing
        }
    }

    // ============================================
    // Binding
    // ============================================

    /// Bind an already resolved asset. Only valid on an empty provider.
    pub fn allocate(&mut self, asset: AssetPtr) {
        debug_assert!(
            self.asset.is_null(),
            "AudioProvider::allocate called on a provider that already has an asset"
        );

        self.detach_observer();
        self.release_sound();
        self.reset_playback();
        self.asset = asset;
        self.attach_observer();
    }

    /// Bind the asset registered under `id` and create its sound.
    ///
    /// Returns `false` when the id does not resolve or the sound cannot be
    /// created; the provider is then left without a sound.
    pub fn set_audio(&mut self, database: &AssetDatabase, id: &AssetId) -> bool {
        self.detach_observer();

        if !self.asset.set_asset_id(database, id) {
            warn!("AudioProvider::set_audio - could not resolve asset '{}'", id);
            self.release_sound();
            return false;
        }

        self.attach_observer();
        self.create_sound()
    }

    /// Id of the bound asset.
    #[must_use]
    pub fn asset_id(&self) -> Option<&AssetId> {
        self.asset.asset_id()
    }

    /// The bound asset.
    #[must_use]
    pub fn asset(&self) -> Option<&Arc<AudioAsset>> {
        self.asset.get()
    }

    /// Stop ticking, drop the observer and release the asset. Safe to call
    /// any number of times.
    pub fn clear_assets(&mut self) {
        self.processing_ticks = false;
        self.detach_observer();
        self.asset.clear();
    }

    fn attach_observer(&mut self) {
        self.refresh.take();
        if let Some(asset) = self.asset.get() {
            let observer: Arc<dyn AssetObserver> = self.refresh.clone();
            asset.register_observer(&observer);
            self.observer = Some(observer);
        }
    }

    fn detach_observer(&mut self) {
        if let Some(observer) = self.observer.take() {
            if let Some(asset) = self.asset.get() {
                asset.unregister_observer(&observer);
            }
        }
        self.refresh.take();
    }

    fn reset_playback(&mut self) {
        self.channel = None;
        self.playing = false;
        self.paused = false;
        self.finished = true;
        self.is_virtual = false;
        self.processing_ticks = false;
    }

    // ============================================
    // Sound
    // ============================================

    /// Create a positional sound (or stream) from the bound asset, releasing
    /// the previous one.
    fn create_sound(&mut self) -> bool {
        self.release_sound();

        let Some(asset) = self.asset.get() else {
            return false;
        };
        let file = asset.audio_file();
        let looping = asset.looping();

        self.sound = if asset.streaming() {
            self.engine.create_positional_stream(&file, looping)
        } else {
            self.engine.create_positional_sound(&file, looping)
        };

        match self.sound {
            Some(sound) => {
                debug!("Created {:?} for '{}'", sound, asset.name());
                true
            },
            None => {
                warn!("AudioProvider - failed to create sound for '{}'", asset.name());
                false
            },
        }
    }

    fn release_sound(&mut self) {
        if let Some(sound) = self.sound.take() {
            self.engine.release_sound(sound);
        }
    }

    /// Handle of the current sound.
    #[must_use]
    pub fn sound(&self) -> Option<SoundHandle> {
        self.sound
    }

    // ============================================
    // Playback
    // ============================================

    /// Start the sound on a new channel at `position`. Returns the channel
    /// index, or -1 without a sound.
    pub fn play_audio(&mut self, position: Vec2) -> i32 {
        let Some(sound) = self.sound else {
            warn!("AudioProvider::play_audio - no sound created");
            return -1;
        };
        let Some(asset) = self.asset.get().cloned() else {
            warn!("AudioProvider::play_audio - no asset bound");
            return -1;
        };
        let Some(channel) = self.engine.create_positional_channel(sound) else {
            return -1;
        };

        let engine = &self.engine;
        let configured = engine.set_channel_3d_attributes(channel, position.extend(0.0), Vec3::ZERO)
            && engine.set_channel_volume(channel, asset.volume())
            && engine.set_channel_3d_min_max_distance(
                channel,
                asset.min_distance(),
                asset.max_distance(),
            )
            && engine.set_channel_cone_settings(
                channel,
                ConeSettings::new(
                    asset.inside_angle(),
                    asset.outside_angle(),
                    asset.outside_volume(),
                ),
            )
            && self
                .cone_orientation
                .map_or(true, |degrees| engine.set_channel_cone_orientation(channel, degrees))
            && engine.set_channel_paused(channel, false);
        if !configured {
            warn!("AudioProvider::play_audio - could not configure channel for '{}'", asset.name());
            engine.stop_channel(channel);
            return -1;
        }
        engine.update();

        self.channel = Some(channel);
        self.audio_position = position;
        self.playing = true;
        self.paused = false;
        self.finished = false;
        self.is_virtual = engine.channel_virtual(channel);
        self.processing_ticks = self.self_tick;

        let index = engine.channel_index(channel);
        debug!("Playing '{}' on channel {} at {}", asset.name(), index, position);
        index
    }

    /// Pause or resume the channel.
    pub fn pause_audio(&mut self, paused: bool) {
        match self.channel {
            Some(channel) if !self.finished => {
                self.engine.set_channel_paused(channel, paused);
                self.paused = paused;
            },
            _ => trace!("AudioProvider::pause_audio - nothing playing"),
        }
    }

    /// Stop the channel. Always leaves the provider finished and unpaused.
    pub fn stop_audio(&mut self) {
        if let Some(channel) = self.channel {
            if !self.finished {
                self.engine.stop_channel(channel);
            }
        }
        self.finished = true;
        self.paused = false;
        self.playing = false;
        self.is_virtual = false;
        self.processing_ticks = false;
    }

    /// Per-tick update. Applies a pending asset refresh, then detects the
    /// natural end of playback. Returns `true` on the tick playback ended.
    pub fn update(&mut self) -> bool {
        if self.refresh.take() && self.on_asset_refreshed() {
            return true;
        }

        if self.finished || self.paused {
            return false;
        }
        let Some(channel) = self.channel else {
            return false;
        };

        self.is_virtual = self.engine.channel_virtual(channel);
        self.playing = self.engine.channel_playing(channel);
        self.paused = self.engine.channel_paused(channel);

        if !playback_ended(self.playing, self.paused, self.is_virtual) {
            return false;
        }

        trace!("Channel {} ended", channel.index());
        self.end_playback();
        true
    }

    fn end_playback(&mut self) {
        self.finished = true;
        self.processing_ticks = false;
        if let Some(callback) = self.on_audio_end.as_mut() {
            callback();
        }
    }

    /// Scheduler entry point: [`AudioProvider::update`] while ticking.
    pub fn process_tick(&mut self) -> bool {
        self.processing_ticks && self.update()
    }

    /// Restart playback from the edited asset. Does nothing once finished.
    ///
    /// Returns `true` when the restart failed: playback is then over and the
    /// end callback has fired.
    pub fn on_asset_refreshed(&mut self) -> bool {
        self.refresh.take();
        if self.finished {
            trace!("AudioProvider - asset refreshed while finished");
            return false;
        }

        if let Some(channel) = self.channel.take() {
            self.engine.stop_channel(channel);
        }
        self.refresh_count += 1;

        if self.create_sound() && self.play_audio(self.audio_position) >= 0 {
            return false;
        }
        warn!("AudioProvider - restart after asset refresh failed");
        self.reset_playback();
        self.end_playback();
        true
    }

    /// Register the end-of-playback callback.
    pub fn set_on_audio_end(&mut self, callback: impl FnMut() + Send + 'static) {
        self.on_audio_end = Some(Box::new(callback));
    }

    // ============================================
    // Status
    // ============================================

    /// Whether playback has ended or was stopped.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Whether the channel is paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        match self.channel {
            Some(channel) if !self.finished => self.engine.channel_paused(channel),
            _ => self.paused,
        }
    }

    /// Whether the channel is playing.
    #[must_use]
    pub fn is_playing(&self) -> bool {
        match self.channel {
            Some(channel) if !self.finished => self.engine.channel_playing(channel),
            _ => false,
        }
    }

    /// Whether the channel is virtual.
    #[must_use]
    pub fn is_virtual(&self) -> bool {
        match self.channel {
            Some(channel) if !self.finished => self.engine.channel_virtual(channel),
            _ => false,
        }
    }

    /// Whether the scheduler should tick this provider.
    #[must_use]
    pub fn processing_ticks(&self) -> bool {
        self.processing_ticks
    }

    /// Whether playback enables scheduler ticks.
    #[must_use]
    pub fn self_tick(&self) -> bool {
        self.self_tick
    }

    /// Opt in or out of scheduler ticks.
    pub fn set_self_tick(&mut self, self_tick: bool) {
        self.self_tick = self_tick;
        if !self_tick {
            self.processing_ticks = false;
        }
    }

    /// Channel handle.
    #[must_use]
    pub fn channel(&self) -> Option<ChannelHandle> {
        self.channel
    }

    /// Channel index, or -1.
    #[must_use]
    pub fn channel_index(&self) -> i32 {
        self.channel
            .map_or(-1, |channel| self.engine.channel_index(channel))
    }

    /// Number of restarts caused by asset refreshes.
    #[must_use]
    pub fn refresh_count(&self) -> u64 {
        self.refresh_count
    }

    // ============================================
    // Channel parameters
    // ============================================

    /// Volume the channel is heard at.
    #[must_use]
    pub fn audibility(&self) -> f32 {
        self.channel
            .map_or(0.0, |channel| self.engine.channel_audibility(channel))
    }

    /// Mute or unmute the channel.
    pub fn set_mute(&mut self, mute: bool) {
        if let Some(channel) = self.channel {
            self.engine.set_channel_mute(channel, mute);
        }
    }

    /// Whether the channel is muted.
    #[must_use]
    pub fn mute(&self) -> bool {
        self.channel
            .is_some_and(|channel| self.engine.channel_mute(channel))
    }

    /// Set the channel volume, clamped to [0, 1]. The asset is not touched.
    pub fn set_volume(&mut self, volume: f32) {
        if let Some(channel) = self.channel {
            self.engine.set_channel_volume(channel, clamp_unit(volume));
        }
    }

    /// Channel volume.
    #[must_use]
    pub fn volume(&self) -> f32 {
        self.channel
            .map_or(0.0, |channel| self.engine.channel_volume(channel))
    }

    /// Set the channel's rolloff distances.
    pub fn set_min_max_distance(&mut self, min: f32, max: f32) {
        if let Some(channel) = self.channel {
            self.engine.set_channel_3d_min_max_distance(channel, min, max);
        }
    }

    /// Rolloff distances of the channel, or of the asset before playback.
    #[must_use]
    pub fn min_max_distance(&self) -> (f32, f32) {
        self.channel
            .and_then(|channel| self.engine.channel_3d_min_max_distance(channel))
            .or_else(|| {
                self.asset
                    .get()
                    .map(|asset| (asset.min_distance(), asset.max_distance()))
            })
            .unwrap_or((0.0, 0.0))
    }

    /// Move the channel. The position is remembered for the next play.
    pub fn set_audio_position(&mut self, position: Vec2) {
        self.audio_position = position;
        if let Some(channel) = self.channel {
            if !self.finished {
                self.engine
                    .set_channel_3d_attributes(channel, position.extend(0.0), Vec3::ZERO);
            }
        }
    }

    /// Position the channel is spatialized at.
    #[must_use]
    pub fn audio_position(&self) -> Vec2 {
        self.channel
            .and_then(|channel| self.engine.channel_3d_attributes(channel))
            .map_or(self.audio_position, |(position, _)| position.truncate())
    }

    /// Point the channel's cone at `degrees`. Remembered for the next play.
    pub fn set_cone_orientation(&mut self, degrees: f32) {
        self.cone_orientation = Some(degrees);
        if let Some(channel) = self.channel {
            if !self.finished {
                self.engine.set_channel_cone_orientation(channel, degrees);
            }
        }
    }

    /// Cone heading in degrees.
    #[must_use]
    pub fn cone_orientation(&self) -> Option<f32> {
        self.channel
            .and_then(|channel| self.engine.channel_cone_orientation(channel))
            .or(self.cone_orientation)
    }

    /// Set the channel's cone angles and outside volume.
    pub fn set_cone_settings(&mut self, cone: ConeSettings) {
        if let Some(channel) = self.channel {
            self.engine.set_channel_cone_settings(channel, cone);
        }
    }

    /// The channel's cone angles and outside volume.
    #[must_use]
    pub fn cone_settings(&self) -> Option<ConeSettings> {
        self.channel
            .and_then(|channel| self.engine.channel_cone_settings(channel))
    }

    /// Copy settings to another provider.
    pub fn copy_to(&self, other: &mut AudioProvider) {
        other.set_self_tick(self.self_tick);
    }
}

impl AudioSource for AudioProvider {
    fn bind(&mut self, database: &AssetDatabase, id: &AssetId) -> bool {
        self.set_audio(database, id)
    }

    fn play(&mut self, position: Vec2) -> i32 {
        self.play_audio(position)
    }

    fn stop(&mut self) {
        self.stop_audio();
    }

    fn pause(&mut self, paused: bool) {
        self.pause_audio(paused);
    }

    fn tick(&mut self) -> bool {
        self.process_tick()
    }

    fn on_asset_changed(&mut self) -> bool {
        self.on_asset_refreshed()
    }
}

/// A channel has ended once it is neither playing, paused nor virtual.
/// Virtual channels are still logically playing.
fn playback_ended(playing: bool, paused: bool, is_virtual: bool) -> bool {
    !(playing || paused || is_virtual)
}

impl Drop for AudioProvider {
    fn drop(&mut self) {
        self.detach_observer();
        self.release_sound();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aural_kernel::{write_wav, HeadlessClock, ToneSpec};
    use proptest::prelude::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        clock: HeadlessClock,
        engine: Arc<AudioEngine>,
        database: AssetDatabase,
        id: AssetId,
        asset: Arc<AudioAsset>,
    }

    fn fixture(looping: bool) -> Fixture {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("fire.wav");
        write_wav(&path, &ToneSpec::sine(440.0, 0.5)).expect("write tone");

        let clock = HeadlessClock::new();
        let engine = Arc::new(AudioEngine::headless(clock.clone()));
        assert!(engine.initialize(32));

        let database = AssetDatabase::new();
        let id = AssetId::new("ToyAssets:FireAudio");
        let asset = AudioAsset::new("FireAudio");
        asset.set_audio_file(&path);
        asset.set_looping(looping);
        let asset = database.declare_asset(id.clone(), asset).expect("declare");

        Fixture {
            dir,
            clock,
            engine,
            database,
            id,
            asset,
        }
    }

    fn bound(f: &Fixture) -> AudioProvider {
        let mut provider = AudioProvider::new(Arc::clone(&f.engine));
        assert!(provider.set_audio(&f.database, &f.id));
        provider
    }

    #[test]
    fn test_new_provider_is_empty() {
        let f = fixture(false);
        let provider = AudioProvider::new(Arc::clone(&f.engine));
        assert_eq!(provider.state(), ProviderState::Empty);
        assert!(provider.is_finished());
        assert!(provider.self_tick());
        assert!(!provider.processing_ticks());
    }

    #[test]
    fn test_set_audio_unknown_id() {
        let f = fixture(false);
        let mut provider = AudioProvider::new(Arc::clone(&f.engine));
        assert!(!provider.set_audio(&f.database, &AssetId::new("ToyAssets:Missing")));
        assert!(provider.sound().is_none());
        assert_eq!(provider.play_audio(Vec2::ZERO), -1);
    }

    #[test]
    fn test_set_audio_creates_sound() {
        let f = fixture(false);
        let provider = bound(&f);
        assert_eq!(provider.state(), ProviderState::Ready);
        assert_eq!(provider.asset_id(), Some(&f.id));
        assert_eq!(f.database.reference_count(&f.id), 1);
        assert_eq!(f.asset.observer_count(), 1);
    }

    #[test]
    fn test_allocate_binds_without_sound() {
        let f = fixture(false);
        let mut ptr = AssetPtr::new();
        ptr.set_asset_id(&f.database, &f.id);

        let mut provider = AudioProvider::new(Arc::clone(&f.engine));
        provider.allocate(ptr);
        assert_eq!(provider.state(), ProviderState::Bound);
        assert_eq!(provider.play_audio(Vec2::ZERO), -1);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "already has an asset")]
    fn test_double_allocate_panics() {
        let f = fixture(false);
        let mut provider = bound(&f);
        provider.allocate(AssetPtr::new());
    }

    #[test]
    fn test_play_applies_asset_settings() {
        let f = fixture(true);
        f.asset.set_volume(0.8);
        f.asset.set_inside_angle(90.0);
        f.asset.set_outside_angle(180.0);
        let mut provider = bound(&f);

        let index = provider.play_audio(Vec2::new(10.0, 0.0));
        assert!(index >= 0);
        assert_eq!(provider.state(), ProviderState::Playing);
        assert!(!provider.is_finished());
        assert!(provider.processing_ticks());

        let channel = provider.channel().expect("channel");
        assert_eq!(f.engine.channel_3d_min_max_distance(channel), Some((0.5, 1.0)));
        assert_eq!(
            f.engine.channel_3d_attributes(channel),
            Some((Vec3::new(10.0, 0.0, 0.0), Vec3::ZERO))
        );
        assert_eq!(f.engine.channel_volume(channel), 0.8);
        let cone = f.engine.channel_cone_settings(channel).expect("cone");
        assert_eq!(cone.inside_angle, 90.0);
        assert_eq!(cone.outside_angle, 180.0);
        assert_eq!(provider.channel_index(), index);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let f = fixture(true);
        let mut provider = bound(&f);
        provider.play_audio(Vec2::ZERO);
        provider.pause_audio(true);

        provider.stop_audio();
        assert!(provider.is_finished());
        assert!(!provider.is_paused());
        provider.stop_audio();
        assert!(provider.is_finished());
        assert!(!provider.is_paused());
        assert_eq!(provider.state(), ProviderState::Finished);
        assert!(!provider.processing_ticks());
    }

    #[test]
    fn test_stop_without_channel() {
        let f = fixture(false);
        let mut provider = AudioProvider::new(Arc::clone(&f.engine));
        provider.stop_audio();
        assert!(provider.is_finished());
    }

    #[test]
    fn test_natural_end_fires_callback_once() {
        let f = fixture(false);
        let mut provider = bound(&f);
        let ended = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ended);
        provider.set_on_audio_end(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        provider.play_audio(Vec2::new(0.25, 0.0));
        assert!(!provider.process_tick());

        f.clock.advance(Duration::from_secs(1));
        f.engine.update();
        assert!(provider.process_tick());
        assert!(provider.is_finished());
        assert!(!provider.processing_ticks());

        assert!(!provider.process_tick());
        assert!(!provider.update());
        assert_eq!(ended.load(Ordering::SeqCst), 1);

        provider.play_audio(Vec2::ZERO);
        assert!(!provider.is_finished());
        assert!(provider.processing_ticks());
    }

    #[test]
    fn test_virtual_channel_is_not_finished() {
        let f = fixture(true);
        let mut provider = bound(&f);
        provider.play_audio(Vec2::new(10.0, 0.0));
        assert!(provider.is_virtual());

        f.clock.advance(Duration::from_secs(2));
        f.engine.update();
        assert!(!provider.process_tick());
        assert!(!provider.is_finished());
        assert!(provider.is_virtual());
    }

    #[test]
    fn test_playback_ended_truth_table() {
        for playing in [false, true] {
            for paused in [false, true] {
                for is_virtual in [false, true] {
                    let ended = playback_ended(playing, paused, is_virtual);
                    assert_eq!(ended, !playing && !paused && !is_virtual);
                }
            }
        }
        assert!(!playback_ended(false, false, true));
    }

    #[test]
    fn test_failed_play_releases_channel() {
        let f = fixture(false);
        let mut provider = bound(&f);

        assert_eq!(provider.play_audio(Vec2::new(f32::NAN, 0.0)), -1);
        assert_eq!(f.engine.playing_count(), 0);
        assert_eq!(provider.state(), ProviderState::Ready);
        assert!(!provider.processing_ticks());

        assert!(provider.play_audio(Vec2::ZERO) >= 0);
        assert_eq!(f.engine.playing_count(), 1);
    }

    #[test]
    fn test_failed_refresh_reports_end() {
        let f = fixture(true);
        let mut provider = bound(&f);
        let ended = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ended);
        provider.set_on_audio_end(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        provider.play_audio(Vec2::ZERO);

        f.asset.set_audio_file(f.dir.path().join("missing.wav"));
        assert!(provider.process_tick());
        assert!(provider.is_finished());
        assert!(!provider.processing_ticks());
        assert_eq!(ended.load(Ordering::SeqCst), 1);
        assert_eq!(f.engine.playing_count(), 0);

        assert!(!provider.update());
        assert_eq!(ended.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_paused_provider_skips_end_detection() {
        let f = fixture(false);
        let mut provider = bound(&f);
        provider.play_audio(Vec2::ZERO);
        provider.pause_audio(true);
        assert_eq!(provider.state(), ProviderState::Paused);

        f.clock.advance(Duration::from_secs(2));
        f.engine.update();
        assert!(!provider.process_tick());
        assert!(!provider.is_finished());

        provider.pause_audio(false);
        f.clock.advance(Duration::from_secs(2));
        f.engine.update();
        assert!(provider.process_tick());
    }

    #[test]
    fn test_refresh_restarts_at_last_position() {
        let f = fixture(true);
        let mut provider = bound(&f);
        provider.play_audio(Vec2::new(3.0, 4.0));
        let first_sound = provider.sound();

        f.asset.set_volume(0.25);
        provider.update();

        assert_eq!(provider.refresh_count(), 1);
        assert_ne!(provider.sound(), first_sound);
        assert!(!provider.is_finished());
        let channel = provider.channel().expect("channel");
        assert_eq!(f.engine.channel_volume(channel), 0.25);
        assert_eq!(provider.audio_position(), Vec2::new(3.0, 4.0));
        assert_eq!(f.engine.playing_count(), 1);

        provider.update();
        assert_eq!(provider.refresh_count(), 1);
    }

    #[test]
    fn test_refresh_ignored_when_finished() {
        let f = fixture(true);
        let mut provider = bound(&f);
        provider.play_audio(Vec2::ZERO);
        provider.stop_audio();
        let sound = provider.sound();

        f.asset.set_volume(0.5);
        provider.update();
        assert_eq!(provider.refresh_count(), 0);
        assert_eq!(provider.sound(), sound);
        assert!(provider.is_finished());
    }

    #[test]
    fn test_clamped_no_op_edit_does_not_refresh() {
        let f = fixture(true);
        let mut provider = bound(&f);
        provider.play_audio(Vec2::ZERO);
        let revision = f.asset.revision();

        f.asset.set_inside_angle(400.0);
        assert_eq!(f.asset.inside_angle(), 360.0);
        provider.update();
        assert_eq!(f.asset.revision(), revision);
        assert_eq!(provider.refresh_count(), 0);
    }

    #[test]
    fn test_volume_is_clamped_and_does_not_refresh() {
        let f = fixture(true);
        let mut provider = bound(&f);
        provider.play_audio(Vec2::ZERO);

        provider.set_volume(1.5);
        assert_eq!(provider.volume(), 1.0);
        provider.set_volume(-0.5);
        assert_eq!(provider.volume(), 0.0);
        provider.update();
        assert_eq!(provider.refresh_count(), 0);
    }

    #[test]
    fn test_position_and_cone_pass_through() {
        let f = fixture(true);
        let mut provider = bound(&f);
        provider.set_cone_orientation(90.0);
        provider.play_audio(Vec2::ZERO);

        provider.set_audio_position(Vec2::new(-2.0, 1.5));
        assert_eq!(provider.audio_position(), Vec2::new(-2.0, 1.5));
        let degrees = provider.cone_orientation().expect("cone");
        assert!((degrees - 90.0).abs() < 1e-3);

        provider.set_min_max_distance(2.0, 20.0);
        assert_eq!(provider.min_max_distance(), (2.0, 20.0));

        provider.set_mute(true);
        assert!(provider.mute());
        assert_eq!(provider.audibility(), 0.0);
    }

    #[test]
    fn test_min_max_distance_before_play_reads_asset() {
        let f = fixture(false);
        let provider = bound(&f);
        assert_eq!(provider.min_max_distance(), (0.5, 1.0));
    }

    #[test]
    fn test_clear_assets_is_idempotent() {
        let f = fixture(false);
        let mut provider = bound(&f);
        provider.clear_assets();
        provider.clear_assets();
        assert_eq!(provider.state(), ProviderState::Empty);
        assert_eq!(f.asset.observer_count(), 0);
        assert_eq!(f.database.reference_count(&f.id), 0);
    }

    #[test]
    fn test_drop_releases_asset() {
        let f = fixture(true);
        {
            let mut provider = bound(&f);
            provider.play_audio(Vec2::ZERO);
        }
        assert_eq!(f.database.reference_count(&f.id), 0);
        assert_eq!(f.asset.observer_count(), 0);
        assert_eq!(f.engine.playing_count(), 0);
    }

    #[test]
    fn test_copy_to() {
        let f = fixture(false);
        let mut source = AudioProvider::new(Arc::clone(&f.engine));
        source.set_self_tick(false);
        let mut target = AudioProvider::new(Arc::clone(&f.engine));
        source.copy_to(&mut target);
        assert!(!target.self_tick());
    }

    #[test]
    fn test_self_tick_off_skips_scheduler() {
        let f = fixture(false);
        let mut provider = bound(&f);
        provider.set_self_tick(false);
        provider.play_audio(Vec2::ZERO);
        assert!(!provider.processing_ticks());

        f.clock.advance(Duration::from_secs(1));
        f.engine.update();
        assert!(!provider.process_tick());
        assert!(provider.update());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn volume_reads_back_clamped(volume in -2.0f32..3.0) {
            let f = fixture(true);
            let mut provider = bound(&f);
            provider.play_audio(Vec2::ZERO);
            provider.set_volume(volume);
            prop_assert_eq!(provider.volume(), volume.clamp(0.0, 1.0));
            prop_assert_eq!(provider.refresh_count(), 0);
        }
    }
}
