//! Configuration for Parley
//!
//! One immutable [`Config`] value is loaded (or defaulted) at startup and
//! threaded through constructors; nothing reads ambient global state.
//! Duration-like settings are stored as plain integers for serialization and
//! exposed through accessor methods.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::providers::ProviderConfig;
use crate::{Error, Result};

/// Response cache tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Short-term pool capacity
    pub short_capacity: u64,

    /// Short-term entry time-to-live in seconds
    pub short_ttl_secs: u64,

    /// Long-term (LRU) pool capacity
    pub long_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            short_capacity: 100,
            short_ttl_secs: 600,
            long_capacity: 1000,
        }
    }
}

/// Parley configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Assistant display name
    pub name: String,

    /// Speech language tag, e.g. "zh-CN"
    pub language: String,

    /// Speech rate in words per minute
    pub speech_rate: u32,

    /// Playback volume, 0.0 to 1.0
    pub volume: f32,

    /// Spoken once when the assistant starts
    pub greeting: String,

    /// Spoken once on shutdown
    pub farewell: String,

    /// Spoken when the connectivity precheck fails mid-turn
    pub network_apology: String,

    /// System prompt sent with every provider call
    pub system_prompt: String,

    /// Utterances that terminate the assistant
    pub exit_phrases: Vec<String>,

    /// Name of the provider to use from `providers`
    pub default_provider: String,

    /// Max tokens per reply
    pub max_tokens: u32,

    /// Max messages a session retains after a turn
    pub max_history: usize,

    /// Recognition retry budget per turn
    pub max_retries: u32,

    /// Fixed delay between recognition retries, in milliseconds
    pub retry_delay_ms: u64,

    /// Provider response timeout in seconds
    pub response_timeout_secs: u64,

    /// Connectivity precheck timeout in seconds
    pub network_timeout_secs: u64,

    /// Bounded listen window per recognition attempt, in seconds
    pub listen_timeout_secs: u64,

    /// Probe URL for the connectivity precheck
    pub connectivity_probe_url: String,

    /// Run the connectivity precheck before each turn
    pub check_connectivity: bool,

    /// Calibrate the recognizer for ambient noise at startup
    pub auto_adjust_noise: bool,

    /// Record per-turn performance metrics
    pub enable_monitoring: bool,

    /// Directory for persisted artifacts (conversation history, reports)
    pub data_dir: PathBuf,

    /// Response cache tuning
    pub cache: CacheConfig,

    /// Provider table keyed by name
    pub providers: HashMap<String, ProviderConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: "Parley".to_string(),
            language: "zh-CN".to_string(),
            speech_rate: 150,
            volume: 0.8,
            greeting: "你好，我是AI语音助手，请说话。".to_string(),
            farewell: "再见！".to_string(),
            network_apology: "网络连接不稳定，请检查网络后重试。".to_string(),
            system_prompt: "你是一个智能助手".to_string(),
            exit_phrases: vec![
                "再见".to_string(),
                "退出".to_string(),
                "goodbye".to_string(),
                "exit".to_string(),
            ],
            default_provider: "openai".to_string(),
            max_tokens: 2000,
            max_history: 10,
            max_retries: 3,
            retry_delay_ms: 1000,
            response_timeout_secs: 30,
            network_timeout_secs: 5,
            listen_timeout_secs: 10,
            connectivity_probe_url: "https://api.openai.com".to_string(),
            check_connectivity: true,
            auto_adjust_noise: true,
            enable_monitoring: true,
            data_dir: default_data_dir(),
            cache: CacheConfig::default(),
            providers: HashMap::new(),
        }
    }
}

impl Config {
    /// Load configuration from `path`, or from the default location.
    ///
    /// A missing file yields the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map_or_else(default_config_path, Path::to_path_buf);
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(&path)?;
        let config: Self = toml::from_str(&raw)?;
        tracing::info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Write configuration to `path`, or to the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: Option<&Path>) -> Result<PathBuf> {
        let path = path.map_or_else(default_config_path, Path::to_path_buf);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let raw = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {e}")))?;
        std::fs::write(&path, raw)?;
        tracing::info!(path = %path.display(), "configuration saved");
        Ok(path)
    }

    /// Configuration for a named provider
    #[must_use]
    pub fn provider_config(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name)
    }

    #[must_use]
    pub const fn response_timeout(&self) -> Duration {
        Duration::from_secs(self.response_timeout_secs)
    }

    #[must_use]
    pub const fn network_timeout(&self) -> Duration {
        Duration::from_secs(self.network_timeout_secs)
    }

    #[must_use]
    pub const fn listen_timeout(&self) -> Duration {
        Duration::from_secs(self.listen_timeout_secs)
    }

    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Default config file path: `~/.config/parley/config.toml`
#[must_use]
pub fn default_config_path() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from(".config/parley/config.toml"),
        |d| d.config_dir().join("parley").join("config.toml"),
    )
}

/// Default data directory: `~/.local/share/parley` (platform equivalent)
#[must_use]
pub fn default_data_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from(".local/share/parley"),
        |d| d.data_dir().join("parley"),
    )
}
