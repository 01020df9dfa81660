//! Configuration management for typing-stats
//!
//! Provides persistent configuration that is automatically saved to and loaded
//! from a platform-specific config file.
//!
//! ## Config File Locations
//!
//! | Platform | Path |
//! |----------|------|
//! | Linux | `~/.config/typing-stats/config.toml` |
//! | macOS | `~/Library/Application Support/typing-stats/config.toml` |
//! | Windows | `%APPDATA%\typing-stats\config.toml` |
//!
//! ## Example
//!
//! ```no_run
//! use typing_stats::Config;
//!
//! // Load existing config or use defaults
//! let mut config = Config::load().unwrap_or_default();
//!
//! // Flush more eagerly
//! config.stats.flush_interval_secs = 30;
//!
//! // Save to disk
//! config.save().expect("Failed to save config");
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::engine::EngineConfig;
#[cfg(feature = "wpm-tracking")]
use crate::stats::EmaFactor;
use crate::storage::{FlushPolicy, DEFAULT_OFFSET};

const APP_DIR: &str = "typing-stats";

/// Error type for configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to determine config directory
    #[error("Could not determine config directory")]
    NoConfigDir,
    /// IO error reading or writing config file
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// Failed to parse config file
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Failed to serialize config
    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Platform config directory for this application, created if missing
pub fn app_dir() -> Result<PathBuf, ConfigError> {
    let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
    let app_dir = config_dir.join(APP_DIR);

    if !app_dir.exists() {
        fs::create_dir_all(&app_dir)?;
    }

    Ok(app_dir)
}

/// Returns the path to the config file.
///
/// Creates the config directory if it doesn't exist.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    Ok(app_dir()?.join("config.toml"))
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Statistics engine settings
    #[serde(default)]
    pub stats: StatsConfig,
    /// Where the counter blob is kept
    #[serde(default)]
    pub storage: StorageConfig,
    /// UI settings
    #[serde(default)]
    pub ui: UiConfig,
}

/// Statistics engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Write back dirty counters after this many seconds
    pub flush_interval_secs: u32,
    /// Write back dirty counters after this many key presses
    pub flush_events: u32,
    /// Start a new session on every launch
    pub auto_new_session_on_boot: bool,
    /// EMA smoothing numerator
    pub wpm_ema_num: u16,
    /// EMA smoothing denominator
    pub wpm_ema_den: u16,
    /// Milliseconds between WPM samples
    pub wpm_sample_interval_ms: u32,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            flush_interval_secs: 120,
            flush_events: 2_000,
            auto_new_session_on_boot: true,
            wpm_ema_num: 1,
            wpm_ema_den: 8,
            wpm_sample_interval_ms: 50,
        }
    }
}

/// Counter storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Storage image file; defaults to `stats.bin` in the config directory
    pub data_file: Option<PathBuf>,
    /// Byte offset of the blob inside the image
    pub offset: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_file: None,
            offset: DEFAULT_OFFSET,
        }
    }
}

/// UI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Refresh rate for UI updates (in Hz)
    pub refresh_rate_hz: u32,
    /// Color theme (dark/light)
    pub theme: Theme,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            refresh_rate_hz: 30,
            theme: Theme::Dark,
        }
    }
}

/// Color theme options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Theme {
    Dark,
    Light,
}

impl Config {
    /// Load configuration from the default config file.
    ///
    /// Returns the default configuration if the file doesn't exist.
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    ///
    /// Useful for testing or using custom config locations.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to the default config file.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = config_path()?;
        self.save_to(&path)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Get UI refresh interval as Duration
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_micros(1_000_000 / u64::from(self.ui.refresh_rate_hz.max(1)))
    }

    /// Debounce thresholds for the block store
    pub fn flush_policy(&self) -> FlushPolicy {
        FlushPolicy {
            interval_ms: self.stats.flush_interval_secs.saturating_mul(1_000),
            event_threshold: self.stats.flush_events,
        }
    }

    /// Engine settings; an invalid EMA fraction falls back to 1/8
    pub fn engine_config(&self) -> EngineConfig {
        #[cfg(feature = "wpm-tracking")]
        let ema = EmaFactor::new(self.stats.wpm_ema_num, self.stats.wpm_ema_den).unwrap_or_else(|| {
            log::warn!(
                "ignoring invalid WPM smoothing {}/{}",
                self.stats.wpm_ema_num,
                self.stats.wpm_ema_den
            );
            EmaFactor::default()
        });

        EngineConfig {
            auto_new_session_on_boot: self.stats.auto_new_session_on_boot,
            #[cfg(feature = "wpm-tracking")]
            ema,
            #[cfg(feature = "wpm-tracking")]
            wpm_sample_interval_ms: self.stats.wpm_sample_interval_ms,
        }
    }

    /// Storage image path, falling back to the config directory
    pub fn data_file(&self) -> Result<PathBuf, ConfigError> {
        match &self.storage.data_file {
            Some(path) => Ok(path.clone()),
            None => Ok(app_dir()?.join("stats.bin")),
        }
    }
}
