//! Runtime configuration.
//!
//! Channel budget, backend choice, asset location, hot reload and tick
//! settings. Loaded from and saved to a TOML file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use aural_assets::HotReloadConfig;
use aural_kernel::audio_resource::MAX_CHANNEL_COUNT;

/// Configuration file name.
const CONFIG_FILE: &str = "aural.toml";

/// Runtime configuration parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuralConfig {
    // === Engine ===
    /// Logical channels (1-4093)
    pub max_channels: u32,
    /// Channels mixed to the output at once
    pub max_real_voices: usize,
    /// Run without an output device
    pub headless: bool,

    // === Assets ===
    /// Directory holding asset modules
    pub asset_root: PathBuf,
    /// Poll asset files for changes
    pub hot_reload: bool,
    /// Minimum time between polls in milliseconds
    pub hot_reload_interval_ms: u64,

    // === Scheduling ===
    /// Scheduler tick in milliseconds
    pub tick_ms: u64,
    /// Emitter the listener follows in the demo
    pub listener_follows: String,

    // === Logging ===
    /// Log filter directive when RUST_LOG is unset
    pub log_filter: String,
}

impl Default for AuralConfig {
    fn default() -> Self {
        Self {
            max_channels: 32,
            max_real_voices: 32,
            headless: false,

            asset_root: PathBuf::from("assets"),
            hot_reload: cfg!(debug_assertions),
            hot_reload_interval_ms: 500,

            tick_ms: 32,
            listener_follows: "Player".to_string(),

            log_filter: "aural=info".to_string(),
        }
    }
}

impl AuralConfig {
    /// Load configuration from the default file location.
    /// Returns default config if file doesn't exist.
    pub fn load() -> Self {
        Self::load_from(Self::config_path())
    }

    /// Load configuration from a specific path.
    /// Returns default config if the file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file {} not found, using defaults", path.display());
            return Self::default();
        }

        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!("Failed to read config file: {e}");
                return Self::default();
            },
        };

        match toml::from_str::<Self>(&contents) {
            Ok(mut config) => {
                config.validate();
                info!("Loaded config from {}", path.display());
                config
            },
            Err(e) => {
                warn!("Failed to parse config file: {e}");
                Self::default()
            },
        }
    }

    /// Save configuration to the default file location.
    pub fn save(&self) -> io::Result<()> {
        self.save_to(Self::config_path())
    }

    /// Save configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let mut file = fs::File::create(path)?;
        file.write_all(contents.as_bytes())?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Default configuration file path.
    #[must_use]
    pub fn config_path() -> PathBuf {
        if let Some(config_dir) = dirs_config_path() {
            config_dir.join("aural").join(CONFIG_FILE)
        } else {
            PathBuf::from(CONFIG_FILE)
        }
    }

    /// Clamp values to usable ranges.
    pub fn validate(&mut self) {
        self.max_channels = self.max_channels.clamp(1, MAX_CHANNEL_COUNT);
        self.max_real_voices = self.max_real_voices.clamp(1, self.max_channels as usize);
        self.hot_reload_interval_ms = self.hot_reload_interval_ms.clamp(10, 60_000);
        self.tick_ms = self.tick_ms.clamp(1, 1000);
        if self.log_filter.trim().is_empty() {
            self.log_filter = Self::default().log_filter;
        }
    }

    /// Hot reload settings for the asset database.
    #[must_use]
    pub fn hot_reload_config(&self) -> HotReloadConfig {
        HotReloadConfig {
            enabled: self.hot_reload,
            poll_interval: Duration::from_millis(self.hot_reload_interval_ms),
        }
    }

    /// Scheduler tick length.
    #[must_use]
    pub fn tick_duration(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

/// Platform-specific config directory.
fn dirs_config_path() -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        std::env::var("HOME")
            .ok()
            .map(|home| PathBuf::from(home).join("Library/Application Support"))
    }

    #[cfg(target_os = "windows")]
    {
        std::env::var("APPDATA").ok().map(PathBuf::from)
    }

    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var("HOME")
                    .ok()
                    .map(|h| PathBuf::from(h).join(".config"))
            })
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
    {
        None
    }
}
