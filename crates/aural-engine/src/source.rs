//! Audio source capability.
//!
//! What a scene object needs from the thing that turns an asset into sound.
//! [`AudioProvider`](crate::provider::AudioProvider) is the engine-backed
//! implementation.

use aural_assets::AssetDatabase;
use aural_common::AssetId;
use glam::Vec2;

/// Plays one bound audio asset.
pub trait AudioSource: Send {
    /// Bind the asset registered under `id`. Returns `false` if it does not
    /// resolve or its sound cannot be created.
    fn bind(&mut self, database: &AssetDatabase, id: &AssetId) -> bool;

    /// Start playback at `position`. Returns the channel index or -1.
    fn play(&mut self, position: Vec2) -> i32;

    /// Stop playback.
    fn stop(&mut self);

    /// Pause or resume playback.
    fn pause(&mut self, paused: bool);

    /// Scheduler tick. Returns `true` on the tick playback ended.
    fn tick(&mut self) -> bool;

    /// React to an edit of the bound asset. Returns `true` if playback
    /// ended because of it.
    fn on_asset_changed(&mut self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::AudioProvider;
    use aural_assets::AudioAsset;
    use aural_kernel::{write_wav, AudioEngine, HeadlessClock, ToneSpec};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_provider_as_source() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("hum.wav");
        write_wav(&path, &ToneSpec::sine(220.0, 0.25)).expect("write tone");

        let clock = HeadlessClock::new();
        let engine = Arc::new(AudioEngine::headless(clock.clone()));
        assert!(engine.initialize(4));

        let database = AssetDatabase::new();
        let id = AssetId::new("Test:Hum");
        let asset = AudioAsset::new("Hum");
        asset.set_audio_file(&path);
        database.declare_asset(id.clone(), asset).expect("declare");

        let mut source: Box<dyn AudioSource> = Box::new(AudioProvider::new(Arc::clone(&engine)));
        assert!(!source.bind(&database, &AssetId::new("Test:Missing")));
        assert!(source.bind(&database, &id));
        assert!(source.play(Vec2::ZERO) >= 0);

        source.pause(true);
        clock.advance(Duration::from_secs(1));
        engine.update();
        assert!(!source.tick());

        source.pause(false);
        clock.advance(Duration::from_secs(1));
        engine.update();
        assert!(source.tick());
        assert!(!source.on_asset_changed());

        source.stop();
        assert_eq!(engine.playing_count(), 0);
    }
}
