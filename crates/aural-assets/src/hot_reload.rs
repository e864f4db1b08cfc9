//! Polling file watcher for hot reload.
//!
//! Records the modification time of every watched file and reports the
//! files whose modification time moved forward since the last check.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use tracing::trace;

/// Configuration for the hot reload system.
#[derive(Debug, Clone)]
pub struct HotReloadConfig {
    /// Enable hot reload.
    pub enabled: bool,
    /// Minimum time between two filesystem polls.
    pub poll_interval: Duration,
}

impl Default for HotReloadConfig {
    fn default() -> Self {
        Self {
            enabled: cfg!(debug_assertions),
            poll_interval: Duration::from_millis(500),
        }
    }
}

impl HotReloadConfig {
    /// Enabled, polling on every check.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            enabled: true,
            poll_interval: Duration::ZERO,
        }
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Polling file watcher.
#[derive(Debug)]
pub struct FileWatcher {
    config: HotReloadConfig,
    files: HashMap<PathBuf, Option<SystemTime>>,
    last_check: Option<Instant>,
}

impl Default for FileWatcher {
    fn default() -> Self {
        Self::new(HotReloadConfig::default())
    }
}

impl FileWatcher {
    /// Creates a new watcher.
    #[must_use]
    pub fn new(config: HotReloadConfig) -> Self {
        Self {
            config,
            files: HashMap::new(),
            last_check: None,
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &HotReloadConfig {
        &self.config
    }

    /// Enables or disables polling.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.config.enabled = enabled;
    }

    /// Starts watching a file, recording its current modification time.
    /// Watching an already watched file re-records its time.
    pub fn watch(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        self.files.insert(path.to_path_buf(), modified_time(path));
    }

    /// Stops watching a file.
    pub fn unwatch(&mut self, path: impl AsRef<Path>) {
        self.files.remove(path.as_ref());
    }

    /// Whether a file is watched.
    #[must_use]
    pub fn is_watched(&self, path: impl AsRef<Path>) -> bool {
        self.files.contains_key(path.as_ref())
    }

    /// Number of watched files.
    #[must_use]
    pub fn watched_count(&self) -> usize {
        self.files.len()
    }

    /// Polls every watched file and returns those modified since the last
    /// check. Missing files are skipped until they reappear.
    pub fn check_for_changes(&mut self) -> Vec<PathBuf> {
        if !self.config.enabled {
            return Vec::new();
        }

        let now = Instant::now();
        if let Some(last) = self.last_check {
            if now.duration_since(last) < self.config.poll_interval {
                return Vec::new();
            }
        }
        self.last_check = Some(now);

        let mut changes = Vec::new();
        for (path, last_modified) in &mut self.files {
            let Some(modified) = modified_time(path) else {
                continue;
            };
            let changed = last_modified.map_or(true, |last| modified > last);
            if changed {
                *last_modified = Some(modified);
                trace!("File changed: {}", path.display());
                changes.push(path.clone());
            }
        }
        changes.sort();
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};

    fn touch_forward(path: &Path, secs: u64) {
        let file = File::options().write(true).open(path).expect("open");
        file.set_modified(SystemTime::now() + Duration::from_secs(secs))
            .expect("set mtime");
    }

    #[test]
    fn test_unchanged_file_not_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("a.txt");
        fs::write(&path, "a").expect("write");

        let mut watcher = FileWatcher::new(HotReloadConfig::immediate());
        watcher.watch(&path);
        assert!(watcher.check_for_changes().is_empty());
    }

    #[test]
    fn test_modified_file_reported_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("a.txt");
        fs::write(&path, "a").expect("write");

        let mut watcher = FileWatcher::new(HotReloadConfig::immediate());
        watcher.watch(&path);
        touch_forward(&path, 10);

        assert_eq!(watcher.check_for_changes(), vec![path.clone()]);
        assert!(watcher.check_for_changes().is_empty());
    }

    #[test]
    fn test_disabled_watcher_reports_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("a.txt");
        fs::write(&path, "a").expect("write");

        let mut watcher = FileWatcher::new(HotReloadConfig::immediate());
        watcher.watch(&path);
        watcher.set_enabled(false);
        touch_forward(&path, 10);
        assert!(watcher.check_for_changes().is_empty());
    }

    #[test]
    fn test_poll_interval_throttles() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("a.txt");
        fs::write(&path, "a").expect("write");

        let mut watcher = FileWatcher::new(HotReloadConfig {
            enabled: true,
            poll_interval: Duration::from_secs(3600),
        });
        watcher.watch(&path);
        assert!(watcher.check_for_changes().is_empty());
        touch_forward(&path, 10);
        assert!(watcher.check_for_changes().is_empty());
    }

    #[test]
    fn test_missing_file_appears() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("late.txt");

        let mut watcher = FileWatcher::new(HotReloadConfig::immediate());
        watcher.watch(&path);
        assert!(watcher.check_for_changes().is_empty());

        fs::write(&path, "now").expect("write");
        assert_eq!(watcher.check_for_changes(), vec![path.clone()]);
        watcher.unwatch(&path);
        assert_eq!(watcher.watched_count(), 0);
    }
}
