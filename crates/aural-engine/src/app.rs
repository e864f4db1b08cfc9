//! Demo application loop.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use aural_assets::{AssetDatabase, AudioAsset};
use aural_common::AssetId;
use aural_engine::{AudioEmitter, AudioFunctions, AudioScene, AuralConfig, TickTimer};
use aural_kernel::{write_wav, AudioEngine, BackendKind, HeadlessClock, ToneSpec};
use glam::Vec2;
use tracing::{debug, info, warn};

/// Name of the generated asset module.
const DEMO_MODULE: &str = "Demo";

/// How long the demo runs.
const DEMO_LENGTH: Duration = Duration::from_secs(6);

struct DemoSound {
    name: &'static str,
    tone: ToneSpec,
    looping: bool,
    streaming: bool,
    max_distance: f32,
}

const DEMO_SOUNDS: [DemoSound; 3] = [
    DemoSound {
        name: "Fire",
        tone: ToneSpec {
            frequency: 110.0,
            duration_secs: 2.0,
            amplitude: 0.4,
            sample_rate: 44_100,
            channels: 1,
        },
        looping: true,
        streaming: true,
        max_distance: 12.0,
    },
    DemoSound {
        name: "Bee",
        tone: ToneSpec {
            frequency: 660.0,
            duration_secs: 1.0,
            amplitude: 0.3,
            sample_rate: 44_100,
            channels: 1,
        },
        looping: true,
        streaming: false,
        max_distance: 6.0,
    },
    DemoSound {
        name: "Click",
        tone: ToneSpec {
            frequency: 1200.0,
            duration_secs: 0.1,
            amplitude: 0.5,
            sample_rate: 44_100,
            channels: 1,
        },
        looping: false,
        streaming: false,
        max_distance: 1.0,
    },
];

/// Write the demo module under `asset_root` unless it already exists.
fn ensure_demo_module(asset_root: &Path) -> Result<()> {
    let module = asset_root.join(DEMO_MODULE);
    if module.exists() {
        return Ok(());
    }

    info!("Generating demo assets in {}", module.display());
    for sound in &DEMO_SOUNDS {
        let relative = format!("sounds/{}.wav", sound.name.to_lowercase());
        write_wav(module.join(&relative), &sound.tone)
            .with_context(|| format!("writing {relative}"))?;

        let asset = AudioAsset::new(sound.name);
        asset.set_audio_file(&relative);
        asset.set_looping(sound.looping);
        asset.set_streaming(sound.streaming);
        asset.set_max_distance(sound.max_distance);
        asset.save_to(module.join(format!("{}.asset.toml", sound.name.to_lowercase())))?;
    }
    Ok(())
}

/// Register every module directory under `asset_root`.
fn load_modules(database: &AssetDatabase, asset_root: &Path) -> Result<()> {
    let entries = fs::read_dir(asset_root)
        .with_context(|| format!("reading asset root {}", asset_root.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            database.add_module(&path)?;
        }
    }
    Ok(())
}

/// Open the configured backend, falling back to headless output.
fn open_engine(config: &AuralConfig) -> (Arc<AudioEngine>, Option<HeadlessClock>) {
    if !config.headless {
        let engine = AudioEngine::new(BackendKind::Rodio).with_max_real_voices(config.max_real_voices);
        if engine.initialize(config.max_channels) {
            return (Arc::new(engine), None);
        }
        warn!("No usable audio device, falling back to headless output");
    }

    let clock = HeadlessClock::new();
    let engine = AudioEngine::headless(clock.clone()).with_max_real_voices(config.max_real_voices);
    if !engine.initialize(config.max_channels) {
        warn!("Headless engine failed to initialize; running silent");
    }
    (Arc::new(engine), Some(clock))
}

/// Player path: a slow loop through both emitters.
fn player_position(t: f32) -> Vec2 {
    Vec2::new(5.0 * (t * 0.5).cos(), 2.0 * (t * 0.5).sin())
}

/// Run the demo.
pub fn run(config: &AuralConfig) -> Result<()> {
    let (engine, clock) = open_engine(config);

    ensure_demo_module(&config.asset_root)?;
    let database = AssetDatabase::with_hot_reload(config.hot_reload_config());
    load_modules(&database, &config.asset_root)?;
    info!("Asset database holds {} assets", database.asset_ids().len());

    let functions = AudioFunctions::new(Arc::clone(&engine), database.clone());
    let mut scene = AudioScene::new(Arc::clone(&engine));

    let fire = scene.insert(AudioEmitter::new("Fire", Arc::clone(&engine)).with_position(Vec2::new(-4.0, 0.0)));
    let bee = scene.insert(AudioEmitter::new("Bee", Arc::clone(&engine)).with_position(Vec2::new(4.0, 1.0)));
    let player = scene.insert(AudioEmitter::new("Player", Arc::clone(&engine)));

    for (id, asset) in [(fire, "Fire"), (bee, "Bee")] {
        let asset_id = AssetId::from_parts(DEMO_MODULE, asset);
        scene.with_emitter(id, |emitter| {
            if emitter.set_audio(&database, &asset_id) {
                let channel = emitter.play();
                info!("{} playing on channel {}", emitter.name(), channel);
            }
        });
    }
    functions.play(&AssetId::from_parts(DEMO_MODULE, "Click"));

    let follows = scene
        .ids()
        .find(|id| scene.get(*id).is_some_and(|e| e.name() == config.listener_follows));
    if follows.is_none() {
        warn!("No emitter named '{}' for the listener to follow", config.listener_follows);
    }

    let mut timer = TickTimer::new(config.tick_duration());
    let tick = timer.tick_duration();
    let total_ticks = (DEMO_LENGTH.as_millis() / tick.as_millis().max(1)) as u64;
    let mut ticks = 0_u64;

    while ticks < total_ticks {
        std::thread::sleep(timer.until_next_tick());
        for _ in 0..timer.advance() {
            ticks += 1;
            let t = ticks as f32 * tick.as_secs_f32();

            if let Some(clock) = &clock {
                clock.advance(tick);
            }

            scene.with_emitter(player, |e| e.set_position(player_position(t)));
            scene.with_emitter(bee, |e| {
                e.set_position(Vec2::new(4.0 + t.sin(), 1.0 + t.cos()));
                e.set_angle((t * 90.0) % 360.0);
            });
            if let Some(listener) = follows.and_then(|id| scene.get(id)) {
                functions.set_listener_position(listener.position());
            }

            for id in database.check_for_changes() {
                info!("Asset {} reloaded", id);
            }
            for ended in scene.tick() {
                if let Some(emitter) = scene.get(ended) {
                    info!("{} finished playing", emitter.name());
                }
            }

            if ticks % 30 == 0 {
                for id in [fire, bee] {
                    if let Some(emitter) = scene.get(id) {
                        debug!("{}", emitter.debug_overlay());
                    }
                }
                info!(
                    "Listener at {}, {} channels playing, {} active emitters",
                    functions.get_listener_position(),
                    engine.playing_count(),
                    scene.active_count()
                );
            }
        }
    }

    scene.clear();
    functions.stop_all();
    functions.shutdown();
    Ok(())
}
