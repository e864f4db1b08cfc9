//! Audio emitter scene object.
//!
//! An emitter owns one [`AudioProvider`] and feeds it the emitter's
//! position and heading whenever they change.

use std::fmt;
use std::sync::Arc;

use aural_assets::AssetDatabase;
use aural_common::{AssetId, EmitterId};
use aural_kernel::AudioEngine;
use glam::Vec2;

use crate::provider::AudioProvider;
use crate::source::AudioSource;

/// Snapshot for debug overlays.
#[derive(Debug, Clone, PartialEq)]
pub struct EmitterDebugInfo {
    /// Emitter name.
    pub name: String,
    /// Position the emitter is drawn at.
    pub render_position: Vec2,
    /// Position the channel is spatialized at.
    pub audio_position: Vec2,
    /// Rolloff start.
    pub min_distance: f32,
    /// Rolloff end.
    pub max_distance: f32,
    /// Heading in degrees.
    pub angle: f32,
    /// Distance between render and audio positions.
    pub drift: f32,
}

impl fmt::Display for EmitterDebugInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at {} (audio {}, drift {:.3}) range {:.2}..{:.2} heading {:.1}",
            self.name,
            self.render_position,
            self.audio_position,
            self.drift,
            self.min_distance,
            self.max_distance,
            self.angle
        )
    }
}

/// Scene object that plays an audio asset at its position.
#[derive(Debug)]
pub struct AudioEmitter {
    id: EmitterId,
    name: String,
    provider: AudioProvider,
    position: Vec2,
    angle: f32,
    spatial_dirty: bool,
    enabled: bool,
}

impl AudioEmitter {
    /// Create an enabled emitter at the origin.
    #[must_use]
    pub fn new(name: impl Into<String>, engine: Arc<AudioEngine>) -> Self {
        Self {
            id: EmitterId::new(),
            name: name.into(),
            provider: AudioProvider::new(engine),
            position: Vec2::ZERO,
            angle: 0.0,
            spatial_dirty: false,
            enabled: true,
        }
    }

    /// Set the starting position.
    #[must_use]
    pub fn with_position(mut self, position: Vec2) -> Self {
        self.set_position(position);
        self
    }

    /// Emitter id.
    #[must_use]
    pub fn id(&self) -> EmitterId {
        self.id
    }

    /// Emitter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// World position.
    #[must_use]
    pub fn position(&self) -> Vec2 {
        self.position
    }

    /// Move the emitter.
    pub fn set_position(&mut self, position: Vec2) {
        if self.position != position {
            self.position = position;
            self.spatial_dirty = true;
        }
    }

    /// Heading in degrees.
    #[must_use]
    pub fn angle(&self) -> f32 {
        self.angle
    }

    /// Turn the emitter.
    pub fn set_angle(&mut self, degrees: f32) {
        if self.angle != degrees {
            self.angle = degrees;
            self.spatial_dirty = true;
        }
    }

    /// Whether position or heading changed since the last integration.
    #[must_use]
    pub fn spatial_dirty(&self) -> bool {
        self.spatial_dirty
    }

    /// Whether the emitter integrates and plays.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enable or disable the emitter. Disabling stops playback.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.provider.stop();
        }
    }

    /// The provider.
    #[must_use]
    pub fn provider(&self) -> &AudioProvider {
        &self.provider
    }

    /// The provider, mutably.
    pub fn provider_mut(&mut self) -> &mut AudioProvider {
        &mut self.provider
    }

    /// Push position and heading to the provider if they changed.
    pub fn integrate_object(&mut self) {
        if !self.spatial_dirty || !self.enabled {
            return;
        }
        self.provider.set_audio_position(self.position);
        self.provider.set_cone_orientation(self.angle);
        self.spatial_dirty = false;
    }

    // ============================================
    // Script operations
    // ============================================

    /// Bind the asset registered under `id`.
    pub fn set_audio(&mut self, database: &AssetDatabase, id: &AssetId) -> bool {
        self.provider.bind(database, id)
    }

    /// Bound asset id, or the null id.
    #[must_use]
    pub fn get_audio(&self) -> AssetId {
        self.provider.asset_id().cloned().unwrap_or_default()
    }

    /// Play at the emitter's position. Returns the channel index or -1.
    pub fn play(&mut self) -> i32 {
        if !self.enabled {
            return -1;
        }
        self.provider.set_cone_orientation(self.angle);
        self.spatial_dirty = false;
        self.provider.play(self.position)
    }

    /// Stop playback.
    pub fn stop(&mut self) {
        self.provider.stop();
    }

    /// Pause or resume playback.
    pub fn set_paused(&mut self, paused: bool) {
        self.provider.pause(paused);
    }

    /// Whether playback is paused.
    #[must_use]
    pub fn get_paused(&self) -> bool {
        self.provider.is_paused()
    }

    /// Whether the channel is virtual.
    #[must_use]
    pub fn get_virtual(&self) -> bool {
        self.provider.is_virtual()
    }

    /// Volume the channel is heard at.
    #[must_use]
    pub fn get_audibility(&self) -> f32 {
        self.provider.audibility()
    }

    /// Mute or unmute.
    pub fn set_mute(&mut self, mute: bool) {
        self.provider.set_mute(mute);
    }

    /// Whether the channel is muted.
    #[must_use]
    pub fn get_mute(&self) -> bool {
        self.provider.mute()
    }

    /// Set the channel volume, clamped to [0, 1].
    pub fn set_volume(&mut self, volume: f32) {
        self.provider.set_volume(volume);
    }

    /// Channel volume.
    #[must_use]
    pub fn get_volume(&self) -> f32 {
        self.provider.volume()
    }

    /// Rolloff distances.
    #[must_use]
    pub fn get_min_max_distance(&self) -> (f32, f32) {
        self.provider.min_max_distance()
    }

    /// Position the channel is spatialized at.
    #[must_use]
    pub fn get_audio_position(&self) -> Vec2 {
        self.provider.audio_position()
    }

    /// Debug overlay snapshot.
    #[must_use]
    pub fn debug_overlay(&self) -> EmitterDebugInfo {
        let (min_distance, max_distance) = self.get_min_max_distance();
        let audio_position = self.get_audio_position();
        EmitterDebugInfo {
            name: self.name.clone(),
            render_position: self.position,
            audio_position,
            min_distance,
            max_distance,
            angle: self.angle,
            drift: self.position.distance(audio_position),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aural_assets::AudioAsset;
    use aural_kernel::{write_wav, HeadlessClock, ToneSpec};
    use tempfile::TempDir;

    fn setup() -> (TempDir, Arc<AudioEngine>, AssetDatabase, AssetId) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bee.wav");
        write_wav(&path, &ToneSpec::sine(220.0, 0.5)).expect("write tone");

        let engine = Arc::new(AudioEngine::headless(HeadlessClock::new()));
        assert!(engine.initialize(16));

        let database = AssetDatabase::new();
        let id = AssetId::new("ToyAssets:BeeAudio");
        let asset = AudioAsset::new("BeeAudio");
        asset.set_audio_file(&path);
        asset.set_looping(true);
        asset.set_max_distance(50.0);
        database.declare_asset(id.clone(), asset).expect("declare");
        (dir, engine, database, id)
    }

    #[test]
    fn test_dirty_tracking() {
        let (_dir, engine, _db, _id) = setup();
        let mut emitter = AudioEmitter::new("Bee", engine);
        assert!(!emitter.spatial_dirty());
        emitter.set_position(Vec2::new(1.0, 2.0));
        assert!(emitter.spatial_dirty());
        emitter.integrate_object();
        assert!(!emitter.spatial_dirty());
        emitter.set_position(Vec2::new(1.0, 2.0));
        assert!(!emitter.spatial_dirty());
    }

    #[test]
    fn test_play_at_own_position() {
        let (_dir, engine, db, id) = setup();
        let mut emitter = AudioEmitter::new("Bee", engine).with_position(Vec2::new(4.0, -1.0));
        assert!(emitter.set_audio(&db, &id));
        assert_eq!(emitter.get_audio(), id);

        assert!(emitter.play() >= 0);
        assert_eq!(emitter.get_audio_position(), Vec2::new(4.0, -1.0));
        assert_eq!(emitter.get_min_max_distance(), (0.5, 50.0));
        assert!(!emitter.get_paused());
    }

    #[test]
    fn test_integration_moves_channel() {
        let (_dir, engine, db, id) = setup();
        let mut emitter = AudioEmitter::new("Bee", engine);
        emitter.set_audio(&db, &id);
        emitter.play();

        emitter.set_position(Vec2::new(7.0, 3.0));
        emitter.set_angle(45.0);
        assert_eq!(emitter.get_audio_position(), Vec2::ZERO);
        emitter.integrate_object();
        assert_eq!(emitter.get_audio_position(), Vec2::new(7.0, 3.0));

        let info = emitter.debug_overlay();
        assert_eq!(info.drift, 0.0);
        assert_eq!(info.angle, 45.0);
        assert!(info.to_string().starts_with("Bee at"));
    }

    #[test]
    fn test_debug_overlay_reports_drift() {
        let (_dir, engine, db, id) = setup();
        let mut emitter = AudioEmitter::new("Bee", engine);
        emitter.set_audio(&db, &id);
        emitter.play();
        emitter.set_position(Vec2::new(3.0, 4.0));

        assert_eq!(emitter.debug_overlay().drift, 5.0);
    }

    #[test]
    fn test_script_operations() {
        let (_dir, engine, db, id) = setup();
        let mut emitter = AudioEmitter::new("Bee", engine);
        emitter.set_audio(&db, &id);
        emitter.play();

        emitter.set_volume(3.0);
        assert_eq!(emitter.get_volume(), 1.0);
        emitter.set_mute(true);
        assert!(emitter.get_mute());
        assert_eq!(emitter.get_audibility(), 0.0);
        emitter.set_paused(true);
        assert!(emitter.get_paused());
        assert!(!emitter.get_virtual());

        emitter.stop();
        assert!(!emitter.get_paused());
        assert!(emitter.provider().is_finished());
    }

    #[test]
    fn test_disabled_emitter_does_not_play() {
        let (_dir, engine, db, id) = setup();
        let mut emitter = AudioEmitter::new("Bee", engine);
        emitter.set_audio(&db, &id);
        emitter.play();
        emitter.set_enabled(false);
        assert!(emitter.provider().is_finished());
        assert_eq!(emitter.play(), -1);
    }

    #[test]
    fn test_unbound_emitter() {
        let (_dir, engine, _db, _id) = setup();
        let emitter = AudioEmitter::new("Silent", engine);
        assert!(emitter.get_audio().is_null());
        assert_eq!(emitter.get_min_max_distance(), (0.0, 0.0));
    }
}
