//! Global audio functions.
//!
//! Fire-and-forget playback by asset id and index-based channel control,
//! the surface scripts use when no emitter is involved.

use std::sync::Arc;

use aural_assets::AssetDatabase;
use aural_common::{clamp_f32, clamp_unit, AssetId};
use aural_kernel::AudioEngine;
use glam::Vec2;
use tracing::warn;

/// Script-facing audio functions over an engine and an asset database.
#[derive(Debug, Clone)]
pub struct AudioFunctions {
    engine: Arc<AudioEngine>,
    database: AssetDatabase,
}

impl AudioFunctions {
    /// Bundle an engine and a database.
    #[must_use]
    pub fn new(engine: Arc<AudioEngine>, database: AssetDatabase) -> Self {
        Self { engine, database }
    }

    /// The engine.
    #[must_use]
    pub fn engine(&self) -> &Arc<AudioEngine> {
        &self.engine
    }

    /// The asset database.
    #[must_use]
    pub fn database(&self) -> &AssetDatabase {
        &self.database
    }

    /// Initialize the engine with `max_channels` channels.
    pub fn initialize(&self, max_channels: u32) -> bool {
        self.engine.initialize(max_channels)
    }

    /// Shut the engine down.
    pub fn shutdown(&self) {
        self.engine.shutdown();
    }

    /// Play an asset non-positionally at its volume. The sound is released
    /// once its channel ends. Returns the channel index or -1.
    pub fn play(&self, id: &AssetId) -> i32 {
        let Some(asset) = self.database.acquire_asset(id) else {
            warn!("AudioFunctions::play - unknown audio asset '{}'", id);
            return -1;
        };

        let file = asset.audio_file();
        let sound = if asset.streaming() {
            self.engine.create_stream(&file, asset.looping())
        } else {
            self.engine.create_sound(&file, asset.looping())
        };
        let volume = asset.volume();
        drop(asset);
        self.database.release_asset(id);

        let Some(sound) = sound else {
            return -1;
        };
        let index = self.engine.play(sound, volume);
        self.engine.release_sound_when_idle(sound);
        index
    }

    /// Stop a channel.
    pub fn stop(&self, index: i32) {
        self.engine.stop(index);
    }

    /// Stop every channel.
    pub fn stop_all(&self) {
        self.engine.stop_all();
    }

    /// Pause or resume a channel.
    pub fn set_paused(&self, index: i32, paused: bool) {
        self.engine.set_paused(index, paused);
    }

    /// Whether a channel is playing.
    #[must_use]
    pub fn get_is_playing(&self, index: i32) -> bool {
        self.engine.is_playing(index)
    }

    /// Set a channel's volume, clamped to [0, 1].
    pub fn set_volume(&self, index: i32, volume: f32) {
        self.engine.set_volume(index, clamp_unit(volume));
    }

    /// A channel's volume.
    #[must_use]
    pub fn get_volume(&self, index: i32) -> f32 {
        self.engine.volume(index)
    }

    /// Mute or unmute a channel.
    pub fn set_mute(&self, index: i32, mute: bool) {
        self.engine.set_mute(index, mute);
    }

    /// Whether a channel is muted.
    #[must_use]
    pub fn get_mute(&self, index: i32) -> bool {
        self.engine.mute(index)
    }

    /// Set a channel's pan, clamped to [-1, 1].
    pub fn set_pan(&self, index: i32, pan: f32) {
        self.engine.set_pan(index, clamp_f32(pan, -1.0, 1.0));
    }

    /// Number of listeners.
    #[must_use]
    pub fn get_listener_count(&self) -> i32 {
        self.engine.listener_count()
    }

    /// Listener position.
    #[must_use]
    pub fn get_listener_position(&self) -> Vec2 {
        self.engine.listener_position()
    }

    /// Move the listener.
    pub fn set_listener_position(&self, position: Vec2) {
        self.engine.set_listener_position(position);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aural_assets::AudioAsset;
    use aural_kernel::{write_wav, HeadlessClock, ToneSpec};
    use std::time::Duration;
    use tempfile::TempDir;

    fn setup() -> (TempDir, HeadlessClock, AudioFunctions, AssetId) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("click.wav");
        write_wav(&path, &ToneSpec::sine(880.0, 0.25)).expect("write tone");

        let clock = HeadlessClock::new();
        let engine = Arc::new(AudioEngine::headless(clock.clone()));
        let database = AssetDatabase::new();
        let id = AssetId::new("Ui:Click");
        let asset = AudioAsset::new("Click");
        asset.set_audio_file(&path);
        asset.set_volume(0.75);
        database.declare_asset(id.clone(), asset).expect("declare");

        let functions = AudioFunctions::new(engine, database);
        assert!(functions.initialize(8));
        (dir, clock, functions, id)
    }

    #[test]
    fn test_initialize_rejects_zero_channels() {
        let engine = Arc::new(AudioEngine::headless(HeadlessClock::new()));
        let functions = AudioFunctions::new(engine, AssetDatabase::new());
        assert!(!functions.initialize(0));
        assert_eq!(functions.get_listener_count(), 0);
    }

    #[test]
    fn test_play_by_asset_id() {
        let (_dir, clock, functions, id) = setup();
        let index = functions.play(&id);
        assert!(index >= 0);
        assert!(functions.get_is_playing(index));
        assert_eq!(functions.get_volume(index), 0.75);
        assert_eq!(functions.database().reference_count(&id), 0);

        clock.advance(Duration::from_secs(1));
        functions.engine().update();
        assert!(!functions.get_is_playing(index));
    }

    #[test]
    fn test_play_unknown_asset() {
        let (_dir, _clock, functions, _id) = setup();
        assert_eq!(functions.play(&AssetId::new("Ui:Missing")), -1);
    }

    #[test]
    fn test_channel_controls() {
        let (_dir, _clock, functions, id) = setup();
        let index = functions.play(&id);

        functions.set_volume(index, 4.0);
        assert_eq!(functions.get_volume(index), 1.0);
        functions.set_mute(index, true);
        assert!(functions.get_mute(index));
        functions.set_pan(index, -3.0);
        assert_eq!(functions.engine().pan(index), -1.0);
        functions.set_paused(index, true);
        assert!(functions.engine().paused(index));

        functions.stop(index);
        assert!(!functions.get_is_playing(index));
    }

    #[test]
    fn test_stop_all() {
        let (_dir, _clock, functions, id) = setup();
        let a = functions.play(&id);
        let b = functions.play(&id);
        assert_ne!(a, b);
        functions.stop_all();
        assert!(!functions.get_is_playing(a));
        assert!(!functions.get_is_playing(b));
    }

    #[test]
    fn test_listener() {
        let (_dir, _clock, functions, _id) = setup();
        assert_eq!(functions.get_listener_count(), 1);
        functions.set_listener_position(Vec2::new(5.0, 6.0));
        assert_eq!(functions.get_listener_position(), Vec2::new(5.0, 6.0));

        functions.shutdown();
        assert_eq!(functions.get_listener_count(), 0);
    }
}
