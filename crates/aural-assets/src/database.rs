//! Asset database.
//!
//! Maps asset ids (`"<module>:<name>"`) to audio assets. Assets come from
//! module directories scanned for `*.asset.toml` definitions, or are
//! declared in memory. Definitions load lazily on first acquire and are
//! reference counted; an asset with auto-unload enabled is dropped when its
//! last reference is released.
//!
//! Hot reload polls the definition file and the audio file of every loaded
//! asset. A changed definition is re-read into the live asset; a changed
//! audio file refreshes it. Either way observers see one refresh per poll.
//!
//! The database is a cheap cloneable handle; clones share the same state.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use aural_common::AssetId;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::asset_path::normalize_path;
use crate::audio_asset::{AudioAsset, AudioAssetRecord, AUDIO_ASSET_EXTENSION};
use crate::error::{AssetError, AssetResult};
use crate::hot_reload::{FileWatcher, HotReloadConfig};

#[derive(Debug)]
struct AssetEntry {
    definition: Option<PathBuf>,
    root: PathBuf,
    asset: Option<Arc<AudioAsset>>,
    ref_count: usize,
    watched_audio: Option<PathBuf>,
}

#[derive(Debug)]
struct DatabaseInner {
    entries: BTreeMap<AssetId, AssetEntry>,
    watcher: FileWatcher,
}

impl DatabaseInner {
    fn unwatch_entry(&mut self, id: &AssetId) {
        let Some(entry) = self.entries.get_mut(id) else {
            return;
        };
        let definition = entry.definition.clone();
        let audio = entry.watched_audio.take();

        if let Some(definition) = definition {
            self.watcher.unwatch(definition);
        }
        if let Some(audio) = audio {
            if !self.audio_watched_elsewhere(&audio) {
                self.watcher.unwatch(audio);
            }
        }
    }

    fn audio_watched_elsewhere(&self, audio: &Path) -> bool {
        self.entries
            .values()
            .any(|e| e.watched_audio.as_deref() == Some(audio))
    }

    /// Point each loaded asset's audio watch at its current audio file.
    fn sync_audio_watches(&mut self) {
        let ids: Vec<AssetId> = self.entries.keys().cloned().collect();
        for id in ids {
            let Some(entry) = self.entries.get_mut(&id) else {
                continue;
            };
            let Some(asset) = entry.asset.as_ref() else {
                continue;
            };
            let current = asset.audio_file();
            if entry.watched_audio.as_ref() == Some(&current) {
                continue;
            }
            let old = entry.watched_audio.take();
            if !current.as_os_str().is_empty() {
                entry.watched_audio = Some(current.clone());
                self.watcher.watch(&current);
            }
            if let Some(old) = old {
                if !self.audio_watched_elsewhere(&old) {
                    self.watcher.unwatch(old);
                }
            }
        }
    }
}

/// Shared asset database handle.
#[derive(Debug, Clone)]
pub struct AssetDatabase {
    inner: Arc<Mutex<DatabaseInner>>,
}

impl Default for AssetDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetDatabase {
    /// Create an empty database with the default hot reload settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_hot_reload(HotReloadConfig::default())
    }

    /// Create an empty database with the given hot reload settings.
    #[must_use]
    pub fn with_hot_reload(config: HotReloadConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(DatabaseInner {
                entries: BTreeMap::new(),
                watcher: FileWatcher::new(config),
            })),
        }
    }

    /// Enable or disable hot reload polling.
    pub fn set_hot_reload_enabled(&self, enabled: bool) {
        self.inner.lock().watcher.set_enabled(enabled);
    }

    /// Scan `dir` recursively for asset definitions and register them under
    /// the directory's name. Returns the number of assets added.
    pub fn add_module(&self, dir: impl AsRef<Path>) -> AssetResult<usize> {
        let dir = absolute(dir.as_ref())?;
        let module = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| AssetError::Io {
                path: dir.clone(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "module directory has no name"),
            })?;

        let mut files = Vec::new();
        collect_definitions(&dir, &mut files)?;
        files.sort();

        let mut inner = self.inner.lock();
        let mut added = 0;
        for file in files {
            let record = match AudioAssetRecord::read(&file) {
                Ok(record) => record,
                Err(e) => {
                    warn!("Skipping asset definition: {e}");
                    continue;
                },
            };
            let name = if record.asset_name.is_empty() {
                definition_stem(&file)
            } else {
                record.asset_name
            };
            let id = AssetId::from_parts(&module, &name);
            if inner.entries.contains_key(&id) {
                warn!("Skipping {}: {}", file.display(), AssetError::DuplicateAsset(id));
                continue;
            }
            debug!("Registered asset {} from {}", id, file.display());
            inner.entries.insert(
                id,
                AssetEntry {
                    definition: Some(file),
                    root: dir.clone(),
                    asset: None,
                    ref_count: 0,
                    watched_audio: None,
                },
            );
            added += 1;
        }

        info!("Added module '{}' with {} audio assets", module, added);
        Ok(added)
    }

    /// Register an in-memory asset. Declared assets have no definition
    /// file, so they stay loaded for the database's lifetime.
    pub fn declare_asset(&self, id: AssetId, asset: AudioAsset) -> AssetResult<Arc<AudioAsset>> {
        let mut inner = self.inner.lock();
        if inner.entries.contains_key(&id) {
            return Err(AssetError::DuplicateAsset(id));
        }

        let root = asset.asset_root().unwrap_or_default();
        asset.initialize();
        let asset = Arc::new(asset);

        inner.entries.insert(
            id.clone(),
            AssetEntry {
                definition: None,
                root,
                asset: Some(Arc::clone(&asset)),
                ref_count: 0,
                watched_audio: None,
            },
        );
        inner.sync_audio_watches();
        debug!("Declared asset {}", id);
        Ok(asset)
    }

    /// Resolve an id to its asset, loading it if needed, and take a
    /// reference. Returns `None` for unknown ids and unloadable assets.
    pub fn acquire_asset(&self, id: &AssetId) -> Option<Arc<AudioAsset>> {
        let mut inner = self.inner.lock();
        let DatabaseInner { entries, watcher } = &mut *inner;

        let Some(entry) = entries.get_mut(id) else {
            warn!("AssetDatabase::acquire_asset - {}", AssetError::UnknownAsset(id.clone()));
            return None;
        };

        if entry.asset.is_none() {
            let definition = entry.definition.as_ref()?;
            let asset = match AudioAsset::load_from(definition) {
                Ok(asset) => asset,
                Err(e) => {
                    warn!("AssetDatabase::acquire_asset - {e}");
                    return None;
                },
            };
            asset.set_asset_root(&entry.root);
            asset.initialize();
            watcher.watch(definition);
            entry.asset = Some(Arc::new(asset));
            info!("Loaded asset {}", id);
        }

        entry.ref_count += 1;
        let asset = entry.asset.clone();
        inner.sync_audio_watches();
        asset
    }

    /// Drop a reference taken by [`AssetDatabase::acquire_asset`].
    pub fn release_asset(&self, id: &AssetId) {
        let mut inner = self.inner.lock();
        let Some(entry) = inner.entries.get_mut(id) else {
            warn!("AssetDatabase::release_asset - {}", AssetError::UnknownAsset(id.clone()));
            return;
        };
        if entry.ref_count == 0 {
            warn!("AssetDatabase::release_asset - {} has no references", id);
            return;
        }

        entry.ref_count -= 1;
        let unload = entry.ref_count == 0
            && entry.definition.is_some()
            && entry.asset.as_ref().is_some_and(|a| a.auto_unload());
        if unload {
            inner.unwatch_entry(id);
            if let Some(entry) = inner.entries.get_mut(id) {
                entry.asset = None;
            }
            info!("Unloaded asset {}", id);
        }
    }

    /// Write a loaded asset back to its definition file.
    pub fn save_asset(&self, id: &AssetId) -> AssetResult<()> {
        let (asset, definition) = {
            let inner = self.inner.lock();
            let entry = inner
                .entries
                .get(id)
                .ok_or_else(|| AssetError::UnknownAsset(id.clone()))?;
            let asset = entry
                .asset
                .clone()
                .ok_or_else(|| AssetError::NotLoaded(id.clone()))?;
            let definition = entry
                .definition
                .clone()
                .ok_or_else(|| AssetError::NoDefinitionFile(id.clone()))?;
            (asset, definition)
        };

        asset.save_to(&definition)?;
        // Our own write is not a change to reload.
        self.inner.lock().watcher.watch(&definition);
        Ok(())
    }

    /// Number of outstanding references to an asset.
    #[must_use]
    pub fn reference_count(&self, id: &AssetId) -> usize {
        self.inner.lock().entries.get(id).map_or(0, |e| e.ref_count)
    }

    /// Whether an asset is loaded.
    #[must_use]
    pub fn is_loaded(&self, id: &AssetId) -> bool {
        self.inner
            .lock()
            .entries
            .get(id)
            .is_some_and(|e| e.asset.is_some())
    }

    /// Whether an id is registered.
    #[must_use]
    pub fn contains(&self, id: &AssetId) -> bool {
        self.inner.lock().entries.contains_key(id)
    }

    /// All registered ids, sorted.
    #[must_use]
    pub fn asset_ids(&self) -> Vec<AssetId> {
        self.inner.lock().entries.keys().cloned().collect()
    }

    /// Poll definition and audio files of loaded assets and refresh the
    /// ones that changed. Returns the refreshed ids.
    pub fn check_for_changes(&self) -> Vec<AssetId> {
        let pending: Vec<(AssetId, Arc<AudioAsset>, Option<PathBuf>, bool)> = {
            let mut inner = self.inner.lock();
            inner.sync_audio_watches();
            let changed = inner.watcher.check_for_changes();
            if changed.is_empty() {
                return Vec::new();
            }

            inner
                .entries
                .iter()
                .filter_map(|(id, entry)| {
                    let asset = entry.asset.as_ref()?;
                    let definition = entry
                        .definition
                        .as_ref()
                        .filter(|d| changed.contains(d))
                        .cloned();
                    let audio_changed = entry
                        .watched_audio
                        .as_ref()
                        .is_some_and(|a| changed.contains(a));
                    (definition.is_some() || audio_changed).then(|| {
                        (id.clone(), Arc::clone(asset), definition, audio_changed)
                    })
                })
                .collect()
        };

        // Observers run without the database lock held.
        let mut refreshed = Vec::new();
        for (id, asset, definition, audio_changed) in pending {
            let mut did_refresh = false;
            if let Some(definition) = definition {
                match AudioAssetRecord::read(&definition) {
                    Ok(record) => did_refresh = asset.apply_record(&record),
                    Err(e) => warn!("Hot reload of {} failed: {e}", id),
                }
            }
            if audio_changed && !did_refresh {
                asset.refresh_asset();
                did_refresh = true;
            }
            if did_refresh {
                info!("Hot reloaded asset {}", id);
                refreshed.push(id);
            }
        }
        refreshed
    }
}

fn absolute(dir: &Path) -> AssetResult<PathBuf> {
    if dir.is_absolute() {
        return Ok(normalize_path(dir));
    }
    let cwd = std::env::current_dir().map_err(|source| AssetError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    Ok(normalize_path(&cwd.join(dir)))
}

fn definition_stem(file: &Path) -> String {
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.strip_suffix(&format!(".{AUDIO_ASSET_EXTENSION}"))
        .map_or(name.clone(), str::to_string)
}

fn collect_definitions(dir: &Path, out: &mut Vec<PathBuf>) -> AssetResult<()> {
    let io_error = |source| AssetError::Io {
        path: dir.to_path_buf(),
        source,
    };
    for entry in fs::read_dir(dir).map_err(io_error)? {
        let path = entry.map_err(io_error)?.path();
        if path.is_dir() {
            collect_definitions(&path, out)?;
        } else if path
            .file_name()
            .is_some_and(|n| n.to_string_lossy().ends_with(AUDIO_ASSET_EXTENSION))
        {
            out.push(path);
        }
    }
    Ok(())
}
