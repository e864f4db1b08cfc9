//! Emitter scheduler.
//!
//! Owns every emitter but only ticks the providers that asked for ticks.
//! The active set is rebuilt from each provider's `processing_ticks` flag
//! after anything that can change it: a tick, or a mutation through
//! [`AudioScene::with_emitter`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use aural_common::EmitterId;
use aural_kernel::AudioEngine;
use tracing::debug;

use crate::emitter::AudioEmitter;
use crate::source::AudioSource;

/// Emitters plus the set of emitters whose providers are ticking.
#[derive(Debug)]
pub struct AudioScene {
    engine: Arc<AudioEngine>,
    emitters: BTreeMap<EmitterId, AudioEmitter>,
    active: BTreeSet<EmitterId>,
}

impl AudioScene {
    /// Create an empty scene.
    #[must_use]
    pub fn new(engine: Arc<AudioEngine>) -> Self {
        Self {
            engine,
            emitters: BTreeMap::new(),
            active: BTreeSet::new(),
        }
    }

    /// The engine emitters play through.
    #[must_use]
    pub fn engine(&self) -> &Arc<AudioEngine> {
        &self.engine
    }

    /// Create an emitter and return its id.
    pub fn spawn(&mut self, name: impl Into<String>) -> EmitterId {
        self.insert(AudioEmitter::new(name, Arc::clone(&self.engine)))
    }

    /// Add an emitter.
    pub fn insert(&mut self, emitter: AudioEmitter) -> EmitterId {
        let id = emitter.id();
        debug!("Added emitter '{}' as {}", emitter.name(), id);
        self.emitters.insert(id, emitter);
        self.sync_active(id);
        id
    }

    /// Remove an emitter, handing it back.
    pub fn remove(&mut self, id: EmitterId) -> Option<AudioEmitter> {
        self.active.remove(&id);
        self.emitters.remove(&id)
    }

    /// Emitter by id.
    #[must_use]
    pub fn get(&self, id: EmitterId) -> Option<&AudioEmitter> {
        self.emitters.get(&id)
    }

    /// Mutate an emitter, then update its membership in the active set.
    pub fn with_emitter<R>(&mut self, id: EmitterId, f: impl FnOnce(&mut AudioEmitter) -> R) -> Option<R> {
        let result = self.emitters.get_mut(&id).map(f);
        self.sync_active(id);
        result
    }

    fn sync_active(&mut self, id: EmitterId) {
        let ticking = self
            .emitters
            .get(&id)
            .is_some_and(|e| e.provider().processing_ticks());
        if ticking {
            self.active.insert(id);
        } else {
            self.active.remove(&id);
        }
    }

    /// Number of emitters.
    #[must_use]
    pub fn emitter_count(&self) -> usize {
        self.emitters.len()
    }

    /// Number of emitters being ticked.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Whether an emitter is being ticked.
    #[must_use]
    pub fn is_active(&self, id: EmitterId) -> bool {
        self.active.contains(&id)
    }

    /// All emitter ids.
    pub fn ids(&self) -> impl Iterator<Item = EmitterId> + '_ {
        self.emitters.keys().copied()
    }

    /// One scheduling tick: integrate moved emitters, run the engine update
    /// and tick active providers. Returns the emitters whose playback ended.
    pub fn tick(&mut self) -> Vec<EmitterId> {
        for emitter in self.emitters.values_mut() {
            emitter.integrate_object();
        }

        self.engine.update();

        let mut ended = Vec::new();
        let mut idle = Vec::new();
        for &id in &self.active {
            let Some(emitter) = self.emitters.get_mut(&id) else {
                idle.push(id);
                continue;
            };
            let provider = emitter.provider_mut();
            if provider.tick() {
                ended.push(id);
            }
            if !provider.processing_ticks() {
                idle.push(id);
            }
        }
        for id in idle {
            self.active.remove(&id);
        }
        ended
    }

    /// Stop every emitter and drop them.
    pub fn clear(&mut self) {
        for emitter in self.emitters.values_mut() {
            emitter.stop();
            emitter.provider_mut().clear_assets();
        }
        self.active.clear();
        self.emitters.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aural_assets::{AssetDatabase, AudioAsset};
    use aural_common::AssetId;
    use aural_kernel::{write_wav, HeadlessClock, ToneSpec};
    use glam::Vec2;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        clock: HeadlessClock,
        scene: AudioScene,
        database: AssetDatabase,
        short: AssetId,
        looped: AssetId,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tone.wav");
        write_wav(&path, &ToneSpec::sine(330.0, 0.25)).expect("write tone");

        let clock = HeadlessClock::new();
        let engine = Arc::new(AudioEngine::headless(clock.clone()));
        assert!(engine.initialize(32));

        let database = AssetDatabase::new();
        let short = AssetId::new("Test:Short");
        let asset = AudioAsset::new("Short");
        asset.set_audio_file(&path);
        database.declare_asset(short.clone(), asset).expect("declare");

        let looped = AssetId::new("Test:Looped");
        let asset = AudioAsset::new("Looped");
        asset.set_audio_file(&path);
        asset.set_looping(true);
        database.declare_asset(looped.clone(), asset).expect("declare");

        Fixture {
            _dir: dir,
            clock,
            scene: AudioScene::new(engine),
            database,
            short,
            looped,
        }
    }

    #[test]
    fn test_idle_emitters_are_not_active() {
        let mut f = fixture();
        let id = f.scene.spawn("Idle");
        assert_eq!(f.scene.emitter_count(), 1);
        assert!(!f.scene.is_active(id));
        assert!(f.scene.tick().is_empty());
    }

    #[test]
    fn test_play_activates_and_end_deactivates() {
        let mut f = fixture();
        let id = f.scene.spawn("Click");
        let db = f.database.clone();
        let short = f.short.clone();
        f.scene.with_emitter(id, |e| {
            assert!(e.set_audio(&db, &short));
            e.play()
        });
        assert!(f.scene.is_active(id));

        assert!(f.scene.tick().is_empty());
        f.clock.advance(Duration::from_secs(1));
        assert_eq!(f.scene.tick(), vec![id]);
        assert!(!f.scene.is_active(id));
        assert!(f.scene.tick().is_empty());
    }

    #[test]
    fn test_stop_through_with_emitter_deactivates() {
        let mut f = fixture();
        let id = f.scene.spawn("Fire");
        let db = f.database.clone();
        let looped = f.looped.clone();
        f.scene.with_emitter(id, |e| {
            e.set_audio(&db, &looped);
            e.play();
        });
        assert_eq!(f.scene.active_count(), 1);

        f.scene.with_emitter(id, AudioEmitter::stop);
        assert_eq!(f.scene.active_count(), 0);
    }

    #[test]
    fn test_tick_integrates_moved_emitters() {
        let mut f = fixture();
        let id = f.scene.spawn("Bee");
        let db = f.database.clone();
        let looped = f.looped.clone();
        f.scene.with_emitter(id, |e| {
            e.set_audio(&db, &looped);
            e.play();
            e.set_position(Vec2::new(2.0, 2.0));
        });

        f.scene.tick();
        let emitter = f.scene.get(id).expect("emitter");
        assert_eq!(emitter.get_audio_position(), Vec2::new(2.0, 2.0));
        assert!(!emitter.spatial_dirty());
    }

    #[test]
    fn test_remove_and_clear() {
        let mut f = fixture();
        let a = f.scene.spawn("A");
        let b = f.scene.spawn("B");
        assert!(f.scene.remove(a).is_some());
        assert!(f.scene.remove(a).is_none());
        assert_eq!(f.scene.ids().collect::<Vec<_>>(), vec![b]);

        f.scene.clear();
        assert_eq!(f.scene.emitter_count(), 0);
        assert!(f.scene.with_emitter(b, |_| ()).is_none());
    }
}
