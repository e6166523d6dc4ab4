//! Configuration file support for Coach.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/coach/config.toml`.

use crate::catalog::{IntervalCatalog, DEFAULT_COOLDOWN_KM, DEFAULT_WARMUP_KM};
use crate::codec::DEFAULT_MAX_CONCURRENT_WRITES;
use crate::device::DEFAULT_WORKOUT_PROVIDER;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub builder: BuilderConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub partner: PartnerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Fixed session distances used by the workout builder
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuilderConfig {
    #[serde(default = "default_warmup_km")]
    pub warmup_km: f64,

    #[serde(default = "default_cooldown_km")]
    pub cooldown_km: f64,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            warmup_km: default_warmup_km(),
            cooldown_km: default_cooldown_km(),
        }
    }
}

impl BuilderConfig {
    pub fn catalog(&self) -> IntervalCatalog {
        IntervalCatalog::with_distances(self.warmup_km, self.cooldown_km)
    }
}

/// Plan store configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_max_concurrent_writes")]
    pub max_concurrent_writes: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_concurrent_writes: default_max_concurrent_writes(),
        }
    }
}

/// Partner push configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PartnerConfig {
    #[serde(default = "default_workout_provider")]
    pub workout_provider: String,

    /// Outbox directory; `<data_dir>/outbox` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outbox_dir: Option<PathBuf>,
}

impl Default for PartnerConfig {
    fn default() -> Self {
        Self {
            workout_provider: default_workout_provider(),
            outbox_dir: None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

// Default value functions
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("coach")
}

fn default_warmup_km() -> f64 {
    DEFAULT_WARMUP_KM
}

fn default_cooldown_km() -> f64 {
    DEFAULT_COOLDOWN_KM
}

fn default_max_concurrent_writes() -> usize {
    DEFAULT_MAX_CONCURRENT_WRITES
}

fn default_workout_provider() -> String {
    DEFAULT_WORKOUT_PROVIDER.to_string()
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("coach")
            .join("config.toml")
    }

    /// Reject settings the builder or store cannot run with
    pub fn validate(&self) -> Result<()> {
        let mut errors = self.builder.catalog().validate();
        if self.store.max_concurrent_writes == 0 {
            errors.push("store.max_concurrent_writes must be at least 1".to_string());
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Config(errors.join("; ")))
        }
    }

    pub fn outbox_dir(&self) -> PathBuf {
        self.partner
            .outbox_dir
            .clone()
            .unwrap_or_else(|| self.data.data_dir.join("outbox"))
    }

    /// Save the current configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path();
        self.save_to(&config_path)
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}
