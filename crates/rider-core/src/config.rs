use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::platform;
use crate::error::ConfigError;
use crate::resolver::DEFAULT_WATCH_BASE;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_enabled")]
    pub enabled: bool,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Metadata lookup settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Invidious instances; one is picked at random per lookup.
    #[serde(default = "default_instances")]
    pub instances: Vec<String>,
    /// How many distinct instances a single lookup may try.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Prefix of the last-resort watch-page source; the track id is appended.
    #[serde(default = "default_watch_base")]
    pub watch_base_url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Explicit mpv binary; otherwise looked up beside the exe, then on PATH.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mpv_path: Option<PathBuf>,
    /// Explicit yt-dlp binary handed to mpv's ytdl hook.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ytdl_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: default_http_enabled(),
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            instances: default_instances(),
            max_attempts: default_max_attempts(),
            timeout_secs: default_timeout_secs(),
            watch_base_url: default_watch_base(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            log_file: default_log_file(),
        }
    }
}

fn default_http_enabled() -> bool {
    true
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8990
}

fn default_instances() -> Vec<String> {
    vec![
        "https://yewtu.be".to_string(),
        "https://inv.nadeko.net".to_string(),
        "https://invidious.nerdvpn.de".to_string(),
    ]
}

fn default_max_attempts() -> usize {
    2
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_watch_base() -> String {
    DEFAULT_WATCH_BASE.to_string()
}

fn default_log_file() -> PathBuf {
    platform::data_dir().join("rider.log")
}

impl Config {
    /// Load from the default location, writing defaults on first run.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let config = Self::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}
