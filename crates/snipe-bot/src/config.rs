//! Application configuration.

use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use snipe_exchange::Credentials;
use snipe_monitor::MonitorConfig;
use snipe_racer::RaceConfig;
use std::path::Path;

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Venue API key. The SNIPE_API_KEY env var takes precedence.
    #[serde(default)]
    pub api_key: String,
    /// Venue secret key. The SNIPE_SECRET_KEY env var takes precedence.
    #[serde(default)]
    pub secret_key: String,
    /// Venue REST base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Signed-request validity window (ms).
    #[serde(default = "default_recv_window_ms")]
    pub recv_window_ms: u64,
    /// Offset of listing-time announcements from UTC (hours).
    /// Listings on this venue are announced in UTC+6.
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,
    /// How long after the listing moment new attempts may launch (ms).
    #[serde(default = "default_window_open_ms")]
    pub window_open_ms: u64,
    /// Racing parameters.
    #[serde(default)]
    pub race: RaceConfig,
    /// Take-profit monitor parameters.
    #[serde(default)]
    pub monitor: MonitorConfig,
}

fn default_base_url() -> String {
    "https://api.mexc.com".to_string()
}

fn default_recv_window_ms() -> u64 {
    5_000
}

fn default_utc_offset_hours() -> i32 {
    6
}

fn default_window_open_ms() -> u64 {
    5_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            secret_key: String::new(),
            base_url: default_base_url(),
            recv_window_ms: default_recv_window_ms(),
            utc_offset_hours: default_utc_offset_hours(),
            window_open_ms: default_window_open_ms(),
            race: RaceConfig::default(),
            monitor: MonitorConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration, falling back to defaults if the file is
    /// missing.
    pub fn load(path: &str) -> AppResult<Self> {
        if Path::new(path).exists() {
            Self::from_file(path)
        } else {
            tracing::warn!(path = %path, "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// Resolve credentials: environment variables win over the file.
    pub fn credentials(&self) -> AppResult<Credentials> {
        let api_key = std::env::var("SNIPE_API_KEY").unwrap_or_else(|_| self.api_key.clone());
        let secret_key =
            std::env::var("SNIPE_SECRET_KEY").unwrap_or_else(|_| self.secret_key.clone());

        if api_key.is_empty() || secret_key.is_empty() {
            return Err(AppError::Config(
                "Missing API credentials: set api_key/secret_key in config or SNIPE_API_KEY/SNIPE_SECRET_KEY".into(),
            ));
        }

        Ok(Credentials::new(api_key, secret_key))
    }
}
