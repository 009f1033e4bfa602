//! Application configuration.
//!
//! Loaded from `config.toml` in the platform data directory, or from the
//! path named by `FITCOACH_CONFIG`. Every section has working defaults so a
//! missing file yields a fully offline setup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Environment variable overriding the config file location.
pub const CONFIG_ENV_VAR: &str = "FITCOACH_CONFIG";

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application version
    pub version: String,
    /// Data directory path
    #[serde(skip)]
    pub data_dir: PathBuf,
    /// Remote record store settings
    #[serde(default)]
    pub store: StoreSettings,
    /// Content generator settings
    #[serde(default)]
    pub generator: GeneratorSettings,
    /// Local cache settings
    #[serde(default)]
    pub cache: CacheSettings,
    /// Identity settings
    #[serde(default)]
    pub identity: IdentitySettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            data_dir: PathBuf::new(),
            store: StoreSettings::default(),
            generator: GeneratorSettings::default(),
            cache: CacheSettings::default(),
            identity: IdentitySettings::default(),
        }
    }
}

impl AppConfig {
    /// Path of the SQLite database holding cache, flags and pending writes.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("fitcoach.db")
    }
}

/// Remote record store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Endpoint accepting `{userId, dataType, data, action}`; `None` keeps
    /// records in process
    pub base_url: Option<String>,
    /// Bearer key sent with every request
    pub api_key: Option<String>,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            timeout_secs: 5,
        }
    }
}

/// Content generator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorSettings {
    /// OpenAI-compatible base URL; `None` uses built-in templates only
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model: String,
    /// Generation timeout in seconds
    pub timeout_secs: u64,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 15,
            temperature: 0.7,
            max_tokens: 1000,
        }
    }
}

/// Local cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Lifetime of the durable onboarding flag
    pub onboarding_flag_ttl_days: i64,
    /// Upper bound on writes held for the remote store
    pub retry_queue_limit: usize,
    /// Interval between background retry passes in seconds
    pub flush_interval_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            onboarding_flag_ttl_days: 30,
            retry_queue_limit: 50,
            flush_interval_secs: 30,
        }
    }
}

/// Identity settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentitySettings {
    /// Bearer token to owner id
    #[serde(default)]
    pub tokens: HashMap<String, String>,
}

/// Get the application data directory.
pub fn get_data_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "fitcoach", "FitCoach")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Get the configuration file path.
pub fn get_config_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|| get_data_dir().join("config.toml"))
}

/// Load application configuration from file.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&get_config_path())
}

/// Load configuration from an explicit path, using defaults when absent.
pub fn load_config_from(path: &std::path::Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        let config = AppConfig {
            data_dir: get_data_dir(),
            ..Default::default()
        };
        return Ok(config);
    }

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

    let mut config: AppConfig =
        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

    config.data_dir = get_data_dir();

    Ok(config)
}

/// Save application configuration to file.
pub fn save_config(config: &AppConfig, path: &std::path::Path) -> Result<(), ConfigError> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
    }

    let content =
        toml::to_string_pretty(config).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

    Ok(())
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}
