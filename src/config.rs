use std::path::PathBuf;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;

/// Application configuration loaded from TOML config file.
/// All fields have sensible defaults; the config file is optional.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Playlist to resolve (bare id or share URL) when `fetch` has no CLI argument.
    pub playlist: Option<String>,
    /// Dataset CSV path (overrides the working-directory default).
    pub dataset_path: Option<PathBuf>,
    /// Directory that receives downloaded audio (`original/` and `piano/`).
    pub audio_dir: Option<PathBuf>,
    /// Browser whose cookies yt-dlp should reuse (e.g. "chrome").
    pub cookies_from_browser: Option<String>,
    /// Network and pagination settings for the fetch pipeline.
    pub fetch: FetchConfig,
}

/// Fetch pipeline configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Tracks per playlist page; the API caps this at 100.
    pub page_limit: usize,
    /// Search candidates requested per video lookup.
    pub search_results: u32,
    /// Retries for a failed playlist page fetch.
    pub retries: u32,
    /// Delay between those retries in milliseconds.
    pub retry_delay_ms: u64,
    /// Global timeout for any single HTTP call in seconds.
    pub http_timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            page_limit: 100,
            search_results: 5,
            retries: 3,
            retry_delay_ms: 2000,
            http_timeout_secs: 10,
        }
    }
}

impl AppConfig {
    /// Load config from `~/.config/pianoset/config.toml`.
    /// Returns default config if the file doesn't exist.
    /// Logs a warning if the file exists but can't be parsed.
    pub fn load() -> Self {
        let config_path = Self::config_path();
        match config_path {
            Some(path) if path.exists() => match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<AppConfig>(&contents) {
                    Ok(config) => {
                        log::info!("Loaded config from {}", path.display());
                        config
                    }
                    Err(e) => {
                        log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                        Self::default()
                    }
                },
                Err(e) => {
                    log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Get the config file path.
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

/// Default dataset location: a CSV in the current working directory.
pub fn default_dataset_path() -> PathBuf {
    PathBuf::from(crate::DEFAULT_DATASET_FILE)
}

/// Default audio output directory in the current working directory.
pub fn default_audio_dir() -> PathBuf {
    PathBuf::from("audio")
}

/// API credentials pulled from the environment. A `.env` file in the
/// working directory is honored when present.
#[derive(Debug)]
pub struct Credentials {
    pub spotify_client_id: String,
    pub spotify_client_secret: String,
    pub youtube_api_key: String,
}

impl Credentials {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            spotify_client_id: require_env("SPOTIFY_CLIENT_ID")?,
            spotify_client_secret: require_env("SPOTIFY_CLIENT_SECRET")?,
            youtube_api_key: require_env("YOUTUBE_API_KEY")?,
        })
    }
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name).with_context(|| format!("Missing environment variable {name}"))
}
