//! Audio asset model.
//!
//! An [`AudioAsset`] describes how a sound file should be played: which
//! file, how loud, whether it loops or streams, and its 3D rolloff and cone
//! parameters. Assets are shared (`Arc<AudioAsset>`) between the asset
//! database and every provider playing them, so all state sits behind
//! interior locks and setters take `&self`.
//!
//! Every setter clamps its value into range and compares it with the
//! current one. Only an actual change bumps the revision and notifies the
//! registered [`AssetObserver`]s, synchronously and in registration order.
//!
//! On disk an asset is an [`AudioAssetRecord`] in TOML. Fields at their
//! default value are left out of the file.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use aural_common::{approx_eq, clamp_f32, clamp_unit, not_equal};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::asset_path::{collapse_asset_path, expand_asset_path};
use crate::error::{AssetError, AssetResult};

/// File extension of audio asset definitions.
pub const AUDIO_ASSET_EXTENSION: &str = "asset.toml";

/// Largest accepted rolloff distance.
pub const MAX_ROLLOFF_DISTANCE: f32 = 10_000.0;

/// Default minimum rolloff distance.
pub const DEFAULT_MIN_DISTANCE: f32 = 0.5;

/// Default maximum rolloff distance.
pub const DEFAULT_MAX_DISTANCE: f32 = 1.0;

/// Default cone angle (omnidirectional).
pub const DEFAULT_CONE_ANGLE: f32 = 360.0;

/// Receives change notifications from an [`AudioAsset`].
pub trait AssetObserver: Send + Sync {
    /// Called after any attribute of `asset` actually changed.
    fn on_asset_refreshed(&self, asset: &AudioAsset);
}

/// Snapshot of an audio asset's attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioAssetData {
    /// Audio file path.
    pub audio_file: PathBuf,
    /// Playback volume (0.0-1.0).
    pub volume: f32,
    /// Restart at the end.
    pub looping: bool,
    /// Stream from storage instead of decoding into memory.
    pub streaming: bool,
    /// Distance inside which the sound is at full volume.
    pub min_distance: f32,
    /// Distance at which the sound becomes silent.
    pub max_distance: f32,
    /// Full-volume cone angle in degrees.
    pub inside_angle: f32,
    /// Attenuated cone angle in degrees.
    pub outside_angle: f32,
    /// Volume outside the outside angle.
    pub outside_volume: f32,
}

impl Default for AudioAssetData {
    fn default() -> Self {
        Self {
            audio_file: PathBuf::new(),
            volume: 1.0,
            looping: false,
            streaming: false,
            min_distance: DEFAULT_MIN_DISTANCE,
            max_distance: DEFAULT_MAX_DISTANCE,
            inside_angle: DEFAULT_CONE_ANGLE,
            outside_angle: DEFAULT_CONE_ANGLE,
            outside_volume: 1.0,
        }
    }
}

impl AudioAssetData {
    /// Clamp every numeric attribute into its domain.
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.volume = clamp_unit(self.volume);
        self.min_distance = clamp_distance(self.min_distance);
        self.max_distance = clamp_distance(self.max_distance);
        self.inside_angle = clamp_angle(self.inside_angle);
        self.outside_angle = clamp_angle(self.outside_angle);
        self.outside_volume = clamp_unit(self.outside_volume);
        self
    }

    /// Whether two snapshots differ beyond float tolerance.
    #[must_use]
    pub fn differs_from(&self, other: &Self) -> bool {
        self.audio_file != other.audio_file
            || self.looping != other.looping
            || self.streaming != other.streaming
            || not_equal(self.volume, other.volume)
            || not_equal(self.min_distance, other.min_distance)
            || not_equal(self.max_distance, other.max_distance)
            || not_equal(self.inside_angle, other.inside_angle)
            || not_equal(self.outside_angle, other.outside_angle)
            || not_equal(self.outside_volume, other.outside_volume)
    }
}

fn clamp_distance(value: f32) -> f32 {
    clamp_f32(value, 0.0, MAX_ROLLOFF_DISTANCE)
}

fn clamp_angle(value: f32) -> f32 {
    clamp_f32(value, 0.0, 360.0)
}

/// Persisted form of an audio asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AudioAssetRecord {
    /// Asset name inside its module.
    pub asset_name: String,
    /// Audio file path, relative to the module directory.
    pub audio_file: String,
    /// Playback volume.
    #[serde(skip_serializing_if = "is_unit")]
    pub volume: f32,
    /// Restart at the end.
    #[serde(skip_serializing_if = "is_false")]
    pub looping: bool,
    /// Stream from storage.
    #[serde(skip_serializing_if = "is_false")]
    pub streaming: bool,
    /// Minimum rolloff distance.
    #[serde(skip_serializing_if = "is_default_min_distance")]
    pub min_distance: f32,
    /// Maximum rolloff distance.
    #[serde(skip_serializing_if = "is_default_max_distance")]
    pub max_distance: f32,
    /// Full-volume cone angle.
    #[serde(skip_serializing_if = "is_full_circle")]
    pub inside_angle: f32,
    /// Attenuated cone angle.
    #[serde(skip_serializing_if = "is_full_circle")]
    pub outside_angle: f32,
    /// Volume outside the outside angle.
    #[serde(skip_serializing_if = "is_unit")]
    pub outside_volume: f32,
}

impl Default for AudioAssetRecord {
    fn default() -> Self {
        let data = AudioAssetData::default();
        Self {
            asset_name: String::new(),
            audio_file: String::new(),
            volume: data.volume,
            looping: data.looping,
            streaming: data.streaming,
            min_distance: data.min_distance,
            max_distance: data.max_distance,
            inside_angle: data.inside_angle,
            outside_angle: data.outside_angle,
            outside_volume: data.outside_volume,
        }
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_unit(value: &f32) -> bool {
    approx_eq(*value, 1.0)
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_false(value: &bool) -> bool {
    !*value
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_default_min_distance(value: &f32) -> bool {
    approx_eq(*value, DEFAULT_MIN_DISTANCE)
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_default_max_distance(value: &f32) -> bool {
    approx_eq(*value, DEFAULT_MAX_DISTANCE)
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_full_circle(value: &f32) -> bool {
    approx_eq(*value, DEFAULT_CONE_ANGLE)
}

impl AudioAssetRecord {
    /// Parse a record from TOML text.
    pub fn from_toml(text: &str, path: &Path) -> AssetResult<Self> {
        toml::from_str(text).map_err(|e| AssetError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Read a record from a file.
    pub fn read(path: &Path) -> AssetResult<Self> {
        let text = fs::read_to_string(path).map_err(|source| AssetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text, path)
    }

    /// Attribute snapshot of this record, with the file path as written.
    #[must_use]
    pub fn data(&self) -> AudioAssetData {
        AudioAssetData {
            audio_file: PathBuf::from(&self.audio_file),
            volume: self.volume,
            looping: self.looping,
            streaming: self.streaming,
            min_distance: self.min_distance,
            max_distance: self.max_distance,
            inside_angle: self.inside_angle,
            outside_angle: self.outside_angle,
            outside_volume: self.outside_volume,
        }
        .clamped()
    }
}

/// Description of how to play an audio file.
pub struct AudioAsset {
    name: String,
    asset_root: RwLock<Option<PathBuf>>,
    data: RwLock<AudioAssetData>,
    auto_unload: AtomicBool,
    revision: AtomicU64,
    observers: Mutex<Vec<Weak<dyn AssetObserver>>>,
}

impl fmt::Debug for AudioAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioAsset")
            .field("name", &self.name)
            .field("revision", &self.revision())
            .field("data", &*self.data.read())
            .finish_non_exhaustive()
    }
}

impl Default for AudioAsset {
    fn default() -> Self {
        Self::new("")
    }
}

impl AudioAsset {
    /// Create an asset with default attributes.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_data(name, AudioAssetData::default())
    }

    /// Create an asset from an attribute snapshot (clamped).
    #[must_use]
    pub fn with_data(name: impl Into<String>, data: AudioAssetData) -> Self {
        Self {
            name: name.into(),
            asset_root: RwLock::new(None),
            data: RwLock::new(data.clamped()),
            auto_unload: AtomicBool::new(true),
            revision: AtomicU64::new(0),
            observers: Mutex::new(Vec::new()),
        }
    }

    /// Create an asset from its persisted record.
    #[must_use]
    pub fn from_record(record: &AudioAssetRecord) -> Self {
        Self::with_data(record.asset_name.clone(), record.data())
    }

    /// Persisted record of the current attributes. The file path is written
    /// as currently stored; see [`AudioAsset::on_pre_write`].
    #[must_use]
    pub fn to_record(&self) -> AudioAssetRecord {
        let data = self.data.read();
        AudioAssetRecord {
            asset_name: self.name.clone(),
            audio_file: data.audio_file.to_string_lossy().replace('\\', "/"),
            volume: data.volume,
            looping: data.looping,
            streaming: data.streaming,
            min_distance: data.min_distance,
            max_distance: data.max_distance,
            inside_angle: data.inside_angle,
            outside_angle: data.outside_angle,
            outside_volume: data.outside_volume,
        }
    }

    /// Load an asset definition file. The asset root is the file's
    /// directory.
    pub fn load_from(path: impl AsRef<Path>) -> AssetResult<Self> {
        let path = path.as_ref();
        let record = AudioAssetRecord::read(path)?;
        let asset = Self::from_record(&record);
        if let Some(dir) = path.parent() {
            asset.set_asset_root(dir);
        }
        debug!("Loaded audio asset '{}' from {}", asset.name, path.display());
        Ok(asset)
    }

    /// Write the asset definition to `path`, creating parent directories.
    pub fn save_to(&self, path: impl AsRef<Path>) -> AssetResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| AssetError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        self.on_pre_write();
        let text = toml::to_string_pretty(&self.to_record());
        self.on_post_write();

        let text = text.map_err(|e| AssetError::Serialize(e.to_string()))?;
        fs::write(path, text).map_err(|source| AssetError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        info!("Saved audio asset '{}' to {}", self.name, path.display());
        Ok(())
    }

    /// Asset name inside its module.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory relative file paths resolve against, once owned by a
    /// database or loaded from a file.
    #[must_use]
    pub fn asset_root(&self) -> Option<PathBuf> {
        self.asset_root.read().clone()
    }

    pub(crate) fn set_asset_root(&self, root: &Path) {
        *self.asset_root.write() = Some(root.to_path_buf());
    }

    /// Revision counter, bumped on every refresh.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    /// Whether the database may unload this asset at zero references.
    #[must_use]
    pub fn auto_unload(&self) -> bool {
        self.auto_unload.load(Ordering::Relaxed)
    }

    /// Allow or forbid unloading at zero references.
    pub fn set_auto_unload(&self, auto_unload: bool) {
        self.auto_unload.store(auto_unload, Ordering::Relaxed);
    }

    // ============================================
    // Lifecycle hooks
    // ============================================

    /// Prepare a freshly loaded asset: expand the file path to absolute
    /// form and pin the asset in memory.
    pub fn initialize(&self) {
        self.expand_audio_file();
        self.set_auto_unload(false);
    }

    /// Collapse the file path to module-relative form before persisting.
    pub fn on_pre_write(&self) {
        if let Some(root) = self.asset_root() {
            let mut data = self.data.write();
            data.audio_file = collapse_asset_path(&root, &data.audio_file);
        }
    }

    /// Re-expand the file path after persisting.
    pub fn on_post_write(&self) {
        self.expand_audio_file();
    }

    fn expand_audio_file(&self) {
        if let Some(root) = self.asset_root() {
            let mut data = self.data.write();
            data.audio_file = expand_asset_path(&root, &data.audio_file);
        }
    }

    // ============================================
    // Observers
    // ============================================

    /// Register an observer. Only a weak reference is kept; dropping the
    /// observer unregisters it.
    pub fn register_observer(&self, observer: &Arc<dyn AssetObserver>) {
        self.observers.lock().push(Arc::downgrade(observer));
    }

    /// Remove an observer.
    pub fn unregister_observer(&self, observer: &Arc<dyn AssetObserver>) {
        let target = Arc::downgrade(observer);
        self.observers
            .lock()
            .retain(|existing| existing.strong_count() > 0 && !Weak::ptr_eq(existing, &target));
    }

    /// Number of live observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers
            .lock()
            .iter()
            .filter(|o| o.strong_count() > 0)
            .count()
    }

    /// Bump the revision and notify every live observer.
    pub fn refresh_asset(&self) {
        self.revision.fetch_add(1, Ordering::AcqRel);

        let live: Vec<Arc<dyn AssetObserver>> = {
            let mut observers = self.observers.lock();
            observers.retain(|o| o.strong_count() > 0);
            observers.iter().filter_map(Weak::upgrade).collect()
        };

        debug!(
            "Audio asset '{}' refreshed (revision {}, {} observers)",
            self.name,
            self.revision(),
            live.len()
        );
        for observer in live {
            observer.on_asset_refreshed(self);
        }
    }

    // ============================================
    // Attributes
    // ============================================

    /// Snapshot of all attributes.
    #[must_use]
    pub fn data(&self) -> AudioAssetData {
        self.data.read().clone()
    }

    /// Apply `edit` and refresh once if anything changed.
    fn update(&self, edit: impl FnOnce(&mut AudioAssetData)) -> bool {
        let changed = {
            let mut data = self.data.write();
            let before = data.clone();
            edit(&mut data);
            *data = data.clone().clamped();
            data.differs_from(&before)
        };
        if changed {
            self.refresh_asset();
        }
        changed
    }

    /// Replace every attribute from a record, refreshing once if anything
    /// changed. The record's file path is expanded against the asset root.
    pub fn apply_record(&self, record: &AudioAssetRecord) -> bool {
        let mut incoming = record.data();
        if let Some(root) = self.asset_root() {
            incoming.audio_file = expand_asset_path(&root, &incoming.audio_file);
        }
        self.update(|data| *data = incoming)
    }

    /// Copy every attribute from `other`.
    pub fn copy_from(&self, other: &AudioAsset) -> bool {
        let incoming = other.data();
        self.update(|data| *data = incoming)
    }

    /// Audio file path.
    #[must_use]
    pub fn audio_file(&self) -> PathBuf {
        self.data.read().audio_file.clone()
    }

    /// Set the audio file. An empty path is rejected.
    pub fn set_audio_file(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        debug_assert!(
            !path.as_os_str().is_empty(),
            "AudioAsset::set_audio_file called with an empty path"
        );
        if path.as_os_str().is_empty() {
            warn!("AudioAsset '{}' - ignoring empty audio file path", self.name);
            return;
        }

        let path = match self.asset_root() {
            Some(root) => expand_asset_path(&root, path),
            None => path.to_path_buf(),
        };
        self.update(|data| data.audio_file = path);
    }

    /// Playback volume.
    #[must_use]
    pub fn volume(&self) -> f32 {
        self.data.read().volume
    }

    /// Set playback volume, clamped to [0, 1].
    pub fn set_volume(&self, volume: f32) {
        self.update(|data| data.volume = volume);
    }

    /// Whether the sound loops.
    #[must_use]
    pub fn looping(&self) -> bool {
        self.data.read().looping
    }

    /// Set whether the sound loops.
    pub fn set_looping(&self, looping: bool) {
        self.update(|data| data.looping = looping);
    }

    /// Whether the sound streams from storage.
    #[must_use]
    pub fn streaming(&self) -> bool {
        self.data.read().streaming
    }

    /// Set whether the sound streams from storage.
    pub fn set_streaming(&self, streaming: bool) {
        self.update(|data| data.streaming = streaming);
    }

    /// Minimum rolloff distance.
    #[must_use]
    pub fn min_distance(&self) -> f32 {
        self.data.read().min_distance
    }

    /// Set minimum rolloff distance, clamped to [0, 10000].
    pub fn set_min_distance(&self, distance: f32) {
        self.update(|data| data.min_distance = distance);
    }

    /// Maximum rolloff distance.
    #[must_use]
    pub fn max_distance(&self) -> f32 {
        self.data.read().max_distance
    }

    /// Set maximum rolloff distance, clamped to [0, 10000].
    pub fn set_max_distance(&self, distance: f32) {
        self.update(|data| data.max_distance = distance);
    }

    /// Full-volume cone angle.
    #[must_use]
    pub fn inside_angle(&self) -> f32 {
        self.data.read().inside_angle
    }

    /// Set full-volume cone angle, clamped to [0, 360].
    pub fn set_inside_angle(&self, angle: f32) {
        self.update(|data| data.inside_angle = angle);
    }

    /// Attenuated cone angle.
    #[must_use]
    pub fn outside_angle(&self) -> f32 {
        self.data.read().outside_angle
    }

    /// Set attenuated cone angle, clamped to [0, 360].
    pub fn set_outside_angle(&self, angle: f32) {
        self.update(|data| data.outside_angle = angle);
    }

    /// Volume outside the outside angle.
    #[must_use]
    pub fn outside_volume(&self) -> f32 {
        self.data.read().outside_volume
    }

    /// Set volume outside the outside angle, clamped to [0, 1].
    pub fn set_outside_volume(&self, volume: f32) {
        self.update(|data| data.outside_volume = volume);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct CountingObserver {
        calls: AtomicUsize,
    }

    impl AssetObserver for CountingObserver {
        fn on_asset_refreshed(&self, _asset: &AudioAsset) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn observed(asset: &AudioAsset) -> (Arc<CountingObserver>, Arc<dyn AssetObserver>) {
        let counter = Arc::new(CountingObserver::default());
        let observer: Arc<dyn AssetObserver> = counter.clone();
        asset.register_observer(&observer);
        (counter, observer)
    }

    #[test]
    fn test_defaults() {
        let asset = AudioAsset::new("Fire");
        assert_eq!(asset.volume(), 1.0);
        assert!(!asset.looping());
        assert!(!asset.streaming());
        assert_eq!(asset.min_distance(), 0.5);
        assert_eq!(asset.max_distance(), 1.0);
        assert_eq!(asset.inside_angle(), 360.0);
        assert_eq!(asset.outside_angle(), 360.0);
        assert_eq!(asset.outside_volume(), 1.0);
        assert!(asset.auto_unload());
    }

    #[test]
    fn test_volume_clamps_and_skips_noop() {
        let asset = AudioAsset::new("Fire");
        let (counter, _observer) = observed(&asset);

        asset.set_volume(1.5);
        assert_eq!(asset.volume(), 1.0);
        assert_eq!(counter.calls.load(Ordering::SeqCst), 0);
        assert_eq!(asset.revision(), 0);

        asset.set_volume(0.25);
        assert_eq!(asset.volume(), 0.25);
        assert_eq!(counter.calls.load(Ordering::SeqCst), 1);
        assert_eq!(asset.revision(), 1);
    }

    #[test]
    fn test_inside_angle_clamp_without_change_does_not_refresh() {
        let asset = AudioAsset::new("Bee");
        let (counter, _observer) = observed(&asset);
        asset.set_inside_angle(400.0);
        assert_eq!(asset.inside_angle(), 360.0);
        assert_eq!(counter.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_min_max_order_not_enforced() {
        let asset = AudioAsset::new("Bee");
        asset.set_min_distance(50.0);
        asset.set_max_distance(10.0);
        assert_eq!(asset.min_distance(), 50.0);
        assert_eq!(asset.max_distance(), 10.0);
    }

    #[test]
    fn test_dropped_observer_is_pruned() {
        let asset = AudioAsset::new("Fire");
        let (counter, observer) = observed(&asset);
        assert_eq!(asset.observer_count(), 1);

        drop(observer);
        drop(counter);
        asset.set_looping(true);
        assert_eq!(asset.observer_count(), 0);
    }

    #[test]
    fn test_unregister_observer() {
        let asset = AudioAsset::new("Fire");
        let (counter, observer) = observed(&asset);
        asset.unregister_observer(&observer);
        asset.set_streaming(true);
        assert_eq!(counter.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_observers_notified_in_order() {
        struct Recorder {
            tag: u8,
            log: Arc<Mutex<Vec<u8>>>,
        }
        impl AssetObserver for Recorder {
            fn on_asset_refreshed(&self, _asset: &AudioAsset) {
                self.log.lock().push(self.tag);
            }
        }

        let asset = AudioAsset::new("Fire");
        let log = Arc::new(Mutex::new(Vec::new()));
        let first: Arc<dyn AssetObserver> = Arc::new(Recorder {
            tag: 1,
            log: log.clone(),
        });
        let second: Arc<dyn AssetObserver> = Arc::new(Recorder {
            tag: 2,
            log: log.clone(),
        });
        asset.register_observer(&first);
        asset.register_observer(&second);

        asset.refresh_asset();
        assert_eq!(*log.lock(), vec![1, 2]);
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn test_empty_audio_file_ignored() {
        let asset = AudioAsset::new("Fire");
        asset.set_audio_file("a.wav");
        asset.set_audio_file("");
        assert_eq!(asset.audio_file(), PathBuf::from("a.wav"));
    }

    #[test]
    #[should_panic(expected = "empty path")]
    #[cfg(debug_assertions)]
    fn test_empty_audio_file_asserts() {
        AudioAsset::new("Fire").set_audio_file("");
    }

    #[test]
    fn test_record_skips_defaults() {
        let asset = AudioAsset::new("Fire");
        asset.set_audio_file("fire.wav");
        let text = toml::to_string(&asset.to_record()).expect("serialize");
        assert!(text.contains("AssetName = \"Fire\""));
        assert!(text.contains("AudioFile = \"fire.wav\""));
        assert!(!text.contains("Volume"));
        assert!(!text.contains("Looping"));
        assert!(!text.contains("MinDistance"));
        assert!(!text.contains("InsideAngle"));
    }

    #[test]
    fn test_record_writes_changed_fields() {
        let asset = AudioAsset::new("Bee");
        asset.set_volume(0.5);
        asset.set_looping(true);
        asset.set_max_distance(20.0);
        let text = toml::to_string(&asset.to_record()).expect("serialize");
        assert!(text.contains("Volume = 0.5"));
        assert!(text.contains("Looping = true"));
        assert!(text.contains("MaxDistance = 20.0"));
        assert!(!text.contains("Streaming"));
    }

    #[test]
    fn test_record_missing_fields_default() {
        let record = AudioAssetRecord::from_toml("AssetName = \"Bee\"\n", Path::new("bee.asset.toml"))
            .expect("parse");
        assert_eq!(record.asset_name, "Bee");
        assert_eq!(record.volume, 1.0);
        assert_eq!(record.min_distance, 0.5);
        assert_eq!(record.outside_angle, 360.0);
    }

    #[test]
    fn test_record_out_of_range_is_clamped() {
        let record = AudioAssetRecord::from_toml(
            "AssetName = \"Bee\"\nVolume = 3.0\nInsideAngle = -20.0\n",
            Path::new("bee.asset.toml"),
        )
        .expect("parse");
        let asset = AudioAsset::from_record(&record);
        assert_eq!(asset.volume(), 1.0);
        assert_eq!(asset.inside_angle(), 0.0);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("fire.asset.toml");

        let asset = AudioAsset::new("Fire");
        asset.set_asset_root(dir.path());
        asset.set_audio_file("sounds/fire.wav");
        asset.set_volume(0.75);
        asset.set_streaming(true);
        assert_eq!(asset.audio_file(), dir.path().join("sounds").join("fire.wav"));

        asset.save_to(&path).expect("save");
        // Hooks restore the absolute path after writing.
        assert_eq!(asset.audio_file(), dir.path().join("sounds").join("fire.wav"));

        let text = fs::read_to_string(&path).expect("read");
        assert!(text.contains("AudioFile = \"sounds/fire.wav\""));

        let loaded = AudioAsset::load_from(&path).expect("load");
        assert_eq!(loaded.audio_file(), PathBuf::from("sounds/fire.wav"));
        loaded.initialize();
        assert_eq!(loaded.audio_file(), dir.path().join("sounds").join("fire.wav"));
        assert!(!loaded.auto_unload());
        assert_eq!(loaded.volume(), 0.75);
        assert!(loaded.streaming());
    }

    #[test]
    fn test_load_missing_file() {
        let result = AudioAsset::load_from("/nonexistent/x.asset.toml");
        assert!(matches!(result, Err(AssetError::Io { .. })));
    }

    #[test]
    fn test_apply_record_refreshes_once() {
        let asset = AudioAsset::new("Fire");
        let (counter, _observer) = observed(&asset);

        let mut record = asset.to_record();
        record.volume = 0.1;
        record.looping = true;
        record.min_distance = 4.0;
        assert!(asset.apply_record(&record));
        assert_eq!(counter.calls.load(Ordering::SeqCst), 1);
        assert!(!asset.apply_record(&record));
        assert_eq!(counter.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_copy_from() {
        let source = AudioAsset::new("A");
        source.set_volume(0.3);
        source.set_outside_volume(0.2);
        let target = AudioAsset::new("B");
        assert!(target.copy_from(&source));
        assert_eq!(target.volume(), 0.3);
        assert_eq!(target.outside_volume(), 0.2);
        assert_eq!(target.name(), "B");
    }

    proptest! {
        #[test]
        fn setters_stay_in_domain(v in proptest::num::f32::ANY, d in proptest::num::f32::ANY, a in proptest::num::f32::ANY) {
            let asset = AudioAsset::new("P");
            asset.set_volume(v);
            asset.set_min_distance(d);
            asset.set_outside_angle(a);
            prop_assert!((0.0..=1.0).contains(&asset.volume()));
            prop_assert!((0.0..=MAX_ROLLOFF_DISTANCE).contains(&asset.min_distance()));
            prop_assert!((0.0..=360.0).contains(&asset.outside_angle()));
        }
    }
}
