//! Configuration management for archivist
//!
//! Handles loading, saving, and validating configuration from TOML files.
//! The configuration is loaded once at startup and written back through
//! [`Config::save`] on every mutation; nothing reads it ambiently.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Provider gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Media download configuration
    #[serde(default)]
    pub media: MediaConfig,

    /// Fleet sweep configuration
    #[serde(default)]
    pub sweep: SweepConfig,

    /// Continuous poll configuration
    #[serde(default)]
    pub poll: PollConfig,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// Provider gateway connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Base URL of the provider gateway
    #[serde(default = "default_gateway_url")]
    pub url: String,

    /// Request timeout in seconds
    #[serde(default = "default_gateway_timeout")]
    pub timeout_secs: u64,
}

/// Media download configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Whether to download attachments during ingestion
    #[serde(default = "default_media_enabled")]
    pub enabled: bool,

    /// Maximum retry attempts for transient download failures
    #[serde(default = "default_media_max_retries")]
    pub max_retries: u32,

    /// Base backoff delay in milliseconds, doubled per attempt
    #[serde(default = "default_media_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

/// Fleet sweep configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Members fetched per batch
    #[serde(default = "default_sweep_batch_size")]
    pub batch_size: usize,

    /// Delay between full member batches, in milliseconds
    #[serde(default = "default_sweep_batch_delay_ms")]
    pub batch_delay_ms: u64,

    /// Delay between targets, in milliseconds
    #[serde(default = "default_sweep_target_delay_ms")]
    pub target_delay_ms: u64,

    /// Minimum random jitter added to the batch delay, in milliseconds
    #[serde(default = "default_sweep_jitter_min_ms")]
    pub jitter_min_ms: u64,

    /// Maximum random jitter added to the batch delay, in milliseconds
    #[serde(default = "default_sweep_jitter_max_ms")]
    pub jitter_max_ms: u64,

    /// Cap on targets visited per hour, enforced across the whole run
    #[serde(default = "default_sweep_max_targets_per_hour")]
    pub max_targets_per_hour: u32,
}

/// Continuous poll configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Sleep between passes, in seconds
    #[serde(default = "default_poll_interval_secs")]
    pub interval_secs: u64,

    /// Page size when listing messages from the source
    #[serde(default = "default_ingest_page_size")]
    pub page_size: usize,
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base directory for archivist data (archives live in subdirectories)
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,

    /// Path to the registry SQLite database
    pub registry_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            media: MediaConfig::default(),
            sweep: SweepConfig::default(),
            poll: PollConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: default_gateway_url(),
            timeout_secs: default_gateway_timeout(),
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            enabled: default_media_enabled(),
            max_retries: default_media_max_retries(),
            backoff_base_ms: default_media_backoff_base_ms(),
        }
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            batch_size: default_sweep_batch_size(),
            batch_delay_ms: default_sweep_batch_delay_ms(),
            target_delay_ms: default_sweep_target_delay_ms(),
            jitter_min_ms: default_sweep_jitter_min_ms(),
            jitter_max_ms: default_sweep_jitter_max_ms(),
            max_targets_per_hour: default_sweep_max_targets_per_hour(),
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval_secs(),
            page_size: default_ingest_page_size(),
        }
    }
}

impl SweepConfig {
    /// Inter-batch delay without jitter
    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    /// Inter-target delay
    pub fn target_delay(&self) -> Duration {
        Duration::from_millis(self.target_delay_ms)
    }
}

impl Config {
    /// Get the default base directory for archivist (~/.archivist)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".archivist")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    /// Initialize paths configuration
    fn init_paths(&mut self, base_dir: Option<PathBuf>) {
        let base = base_dir.unwrap_or_else(Self::default_base_dir);
        self.paths = PathsConfig {
            config_file: base.join("config.toml"),
            registry_file: base.join("registry.db"),
            base_dir: base,
        };
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        let base = config_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        config.paths = PathsConfig {
            config_file: config_path.to_path_buf(),
            registry_file: base.join("registry.db"),
            base_dir: base,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific base directory, falling back to
    /// defaults when no config file exists yet
    pub fn load_from(base_dir: Option<PathBuf>) -> Result<Self> {
        let mut config = Config::default();
        config.init_paths(base_dir);

        if config.paths.config_file.exists() {
            debug!("Loading config from {:?}", config.paths.config_file);
            let content = std::fs::read_to_string(&config.paths.config_file)?;
            let mut loaded: Config = toml::from_str(&content)?;
            loaded.paths = config.paths;
            config = loaded;
            config.validate()?;
        } else {
            debug!("No config file found, using defaults");
        }

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.paths.config_file, content)?;
        info!("Saved config to {:?}", self.paths.config_file);
        Ok(())
    }

    /// Check if archivist is initialized (config and registry exist)
    pub fn is_initialized(&self) -> bool {
        self.paths.config_file.exists() && self.paths.registry_file.exists()
    }

    /// Directory holding a target's archive database and media folder
    pub fn target_dir(&self, label: &str) -> PathBuf {
        self.paths.base_dir.join(label)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.sweep.batch_size == 0 {
            return Err(Error::Config("sweep.batch_size must be positive".to_string()));
        }

        if self.sweep.jitter_min_ms > self.sweep.jitter_max_ms {
            return Err(Error::Config(
                "sweep.jitter_min_ms must be <= sweep.jitter_max_ms".to_string(),
            ));
        }

        if self.sweep.max_targets_per_hour == 0 {
            return Err(Error::Config(
                "sweep.max_targets_per_hour must be positive".to_string(),
            ));
        }

        if self.media.max_retries == 0 {
            return Err(Error::Config("media.max_retries must be positive".to_string()));
        }

        if self.poll.interval_secs == 0 {
            return Err(Error::Config("poll.interval_secs must be positive".to_string()));
        }

        if self.poll.page_size == 0 {
            return Err(Error::Config("poll.page_size must be positive".to_string()));
        }

        Ok(())
    }

    /// Apply a `key = value` style settings update (dotted key paths).
    /// A rejected update leaves the config untouched.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        let mut updated = self.clone();
        updated.apply_value(key, value)?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    fn apply_value(&mut self, key: &str, value: &str) -> Result<()> {
        fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
            value
                .parse()
                .map_err(|_| Error::Config(format!("Invalid value '{}' for {}", value, key)))
        }

        match key {
            "gateway.url" => self.gateway.url = value.to_string(),
            "gateway.timeout_secs" => self.gateway.timeout_secs = parse(key, value)?,
            "media.enabled" => self.media.enabled = parse(key, value)?,
            "media.max_retries" => self.media.max_retries = parse(key, value)?,
            "media.backoff_base_ms" => self.media.backoff_base_ms = parse(key, value)?,
            "sweep.batch_size" => self.sweep.batch_size = parse(key, value)?,
            "sweep.batch_delay_ms" => self.sweep.batch_delay_ms = parse(key, value)?,
            "sweep.target_delay_ms" => self.sweep.target_delay_ms = parse(key, value)?,
            "sweep.jitter_min_ms" => self.sweep.jitter_min_ms = parse(key, value)?,
            "sweep.jitter_max_ms" => self.sweep.jitter_max_ms = parse(key, value)?,
            "sweep.max_targets_per_hour" => self.sweep.max_targets_per_hour = parse(key, value)?,
            "poll.interval_secs" => self.poll.interval_secs = parse(key, value)?,
            "poll.page_size" => self.poll.page_size = parse(key, value)?,
            _ => return Err(Error::Config(format!("Unknown setting: {}", key))),
        }

        Ok(())
    }
}
