//! Configuration loading and tunables
//!
//! The synchronization thresholds were tuned empirically for specific
//! platforms, so they are configuration rather than fixed semantics. Every
//! field is optional in the TOML file and falls back to a built-in default.
//!
//! # Config File Priority
//!
//! 1. Explicit path (command-line argument)
//! 2. `TSYNC_CONFIG` environment variable
//! 3. `<user config dir>/tsync/config.toml`
//! 4. Built-in defaults
//!
//! A missing implicit file is not an error. A missing or broken explicit file
//! is, since the caller asked for it by name.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming a config file
pub const CONFIG_ENV_VAR: &str = "TSYNC_CONFIG";

/// Synchronization tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncTuning {
    /// Progress is re-reported once the last sync is older than this (ms)
    pub staleness_threshold_ms: f64,

    /// Audio re-seeks when extrapolated and target progress differ by more (ms)
    pub drift_tolerance_ms: f64,

    /// Buffered lookahead required ahead of the current position (s)
    pub buffer_lookahead_secs: f64,

    /// Buffer reaching `duration - margin` also counts as enough (s)
    pub buffer_end_margin_secs: f64,

    /// A seek that lands further than this from where it should be marks
    /// the video device broken (ms)
    pub stalled_seek_tolerance_ms: f64,

    /// Audio observations must grow by more than `ratio * elapsed` to count
    pub progress_growth_ratio: f64,
}

impl Default for SyncTuning {
    fn default() -> Self {
        Self {
            staleness_threshold_ms: 300.0,
            drift_tolerance_ms: 33.0,
            buffer_lookahead_secs: 5.0,
            buffer_end_margin_secs: 1.0,
            stalled_seek_tolerance_ms: 10.0,
            progress_growth_ratio: 0.01,
        }
    }
}

impl SyncTuning {
    /// Reject negative or non-finite tunables
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("staleness_threshold_ms", self.staleness_threshold_ms),
            ("drift_tolerance_ms", self.drift_tolerance_ms),
            ("buffer_lookahead_secs", self.buffer_lookahead_secs),
            ("buffer_end_margin_secs", self.buffer_end_margin_secs),
            ("stalled_seek_tolerance_ms", self.stalled_seek_tolerance_ms),
            ("progress_growth_ratio", self.progress_growth_ratio),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::Config(format!(
                    "sync.{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Which platform workaround to install for broken video devices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecoveryMode {
    /// Never reload; devices are trusted
    #[default]
    None,
    /// Reload a video device whose seeks do not take
    ReloadOnStalledSeek,
}

/// Recovery configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    pub mode: RecoveryMode,

    /// Ask a silently suspended audio output context to resume on each tick
    pub resume_suspended_audio_context: bool,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            mode: RecoveryMode::None,
            resume_suspended_audio_context: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Complete configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub sync: SyncTuning,
    pub recovery: RecoveryConfig,
    pub logging: LoggingConfig,
}

impl TomlConfig {
    /// Parse and validate TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(text)?;
        config.sync.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        Self::from_toml_str(&text)
    }
}

/// Where a resolved config came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Explicit(PathBuf),
    Environment(PathBuf),
    UserDefault(PathBuf),
    BuiltIn,
}

/// Config file resolution following the priority order above
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    explicit: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new(explicit: Option<PathBuf>) -> Self {
        Self { explicit }
    }

    /// Decide which file (if any) to read
    pub fn source(&self) -> ConfigSource {
        if let Some(path) = &self.explicit {
            return ConfigSource::Explicit(path.clone());
        }
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.is_empty() {
                return ConfigSource::Environment(PathBuf::from(path));
            }
        }
        match default_config_path() {
            Some(path) if path.exists() => ConfigSource::UserDefault(path),
            _ => ConfigSource::BuiltIn,
        }
    }

    /// Resolve and load the configuration
    ///
    /// Explicit paths must exist and parse. Environment and user-default
    /// files degrade to built-in defaults with a warning.
    pub fn load(&self) -> Result<TomlConfig> {
        match self.source() {
            ConfigSource::Explicit(path) => {
                let config = TomlConfig::load(&path)?;
                info!("Loaded configuration from {:?}", path);
                Ok(config)
            }
            ConfigSource::Environment(path) | ConfigSource::UserDefault(path) => {
                match TomlConfig::load(&path) {
                    Ok(config) => {
                        info!("Loaded configuration from {:?}", path);
                        Ok(config)
                    }
                    Err(e) => {
                        warn!("{}; using built-in defaults", e);
                        Ok(TomlConfig::default())
                    }
                }
            }
            ConfigSource::BuiltIn => {
                info!("No configuration file found, using built-in defaults");
                Ok(TomlConfig::default())
            }
        }
    }
}

/// Platform default config file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tsync").join("config.toml"))
}
