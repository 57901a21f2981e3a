//! Runtime settings loaded from TOML
//!
//! Every key is optional; missing keys fall back to the defaults below.
//!
//! ```toml
//! data-dir = "plugins/ResourceGenerator"
//!
//! [performance]
//! max-generators-per-chunk = 10
//! max-generators-per-player = 50
//!
//! [plugin]
//! auto-save-interval = 5   # minutes
//! debug = false
//!
//! [storage]
//! max-backups = 10
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::generator::RegistryLimits;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct GeneratorSettings {
    /// Root for `data/`, `backups/` and `generators/`
    pub data_dir: PathBuf,
    pub performance: PerformanceSettings,
    pub plugin: PluginSettings,
    pub storage: StorageSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PerformanceSettings {
    pub max_generators_per_chunk: usize,
    pub max_generators_per_player: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PluginSettings {
    /// Minutes between periodic saves
    pub auto_save_interval: u64,
    /// Log per-save and per-interaction details at info level
    pub debug: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct StorageSettings {
    pub max_backups: usize,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("plugins/ResourceGenerator"),
            performance: PerformanceSettings::default(),
            plugin: PluginSettings::default(),
            storage: StorageSettings::default(),
        }
    }
}

impl Default for PerformanceSettings {
    fn default() -> Self {
        Self {
            max_generators_per_chunk: 10,
            max_generators_per_player: 50,
        }
    }
}

impl Default for PluginSettings {
    fn default() -> Self {
        Self {
            auto_save_interval: 5,
            debug: false,
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self { max_backups: 10 }
    }
}

impl GeneratorSettings {
    /// Parse settings from a TOML string
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        let settings: Self = toml::from_str(source)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml(&source)
    }

    /// Load settings, falling back to defaults when the file is missing or bad
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("No settings file at {}, using defaults", path.display());
            return Self::default();
        }
        match Self::load(path) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("Failed to load settings from {}: {}. Using defaults", path.display(), e);
                Self::default()
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.plugin.auto_save_interval == 0 {
            return Err(ConfigError::InvalidValue {
                key: "plugin.auto-save-interval",
                reason: "must be at least one minute".to_string(),
            });
        }
        if self.storage.max_backups == 0 {
            return Err(ConfigError::InvalidValue {
                key: "storage.max-backups",
                reason: "must keep at least one backup".to_string(),
            });
        }
        Ok(())
    }

    pub fn auto_save_interval(&self) -> Duration {
        Duration::from_secs(self.plugin.auto_save_interval * 60)
    }

    pub fn limits(&self) -> RegistryLimits {
        RegistryLimits {
            max_per_cell: self.performance.max_generators_per_chunk,
            max_per_owner: self.performance.max_generators_per_player,
        }
    }

    /// Directory holding one JSON file per generator type
    pub fn types_dir(&self) -> PathBuf {
        self.data_dir.join("generators")
    }
}
