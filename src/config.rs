//! Configuration Management
//!
//! Handles persistent configuration storage for portica.
//!
//! Values are resolved in order: command line, then `PORTICA_URL` /
//! `PORTICA_API_KEY`, then `config.json` in the user config directory.

use crate::api::Credentials;
use crate::notification::DetailLevel;
use crate::query::{QueryOptions, DEFAULT_GC_TIME};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the API URL
pub const API_URL_ENV: &str = "PORTICA_URL";
/// Environment variable overriding the API key
pub const API_KEY_ENV: &str = "PORTICA_API_KEY";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_gc_time_secs() -> u64 {
    DEFAULT_GC_TIME.as_secs()
}

fn default_max_history() -> usize {
    50
}

fn default_toast_duration_secs() -> u64 {
    5
}

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the management API, e.g. `https://portainer.local:9443/api`
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Default stale time of cached queries
    #[serde(default)]
    pub stale_time_secs: u64,
    /// How long unobserved queries are retained
    #[serde(default = "default_gc_time_secs")]
    pub gc_time_secs: u64,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

/// Notification display settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub detail_level: DetailLevel,
    #[serde(default = "default_max_history")]
    pub max_history: usize,
    #[serde(default = "default_toast_duration_secs")]
    pub toast_duration_secs: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            detail_level: DetailLevel::default(),
            max_history: default_max_history(),
            toast_duration_secs: default_toast_duration_secs(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: None,
            api_key: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            stale_time_secs: 0,
            gc_time_secs: default_gc_time_secs(),
            notifications: NotificationConfig::default(),
        }
    }
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("portica").join("config.json"))
    }

    /// Load configuration from disk, falling back to defaults
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Ignoring configuration: {:#}", e);
                Self::default()
            },
        }
    }

    /// Load configuration from a file; a missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create parent directory
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;

        Ok(())
    }

    /// Apply environment variables, then command line values
    pub fn with_overrides(mut self, api_url: Option<String>, api_key: Option<String>) -> Self {
        self.merge(env_value(API_URL_ENV), env_value(API_KEY_ENV));
        self.merge(api_url, api_key);
        self
    }

    fn merge(&mut self, api_url: Option<String>, api_key: Option<String>) {
        if let Some(url) = api_url.filter(|u| !u.trim().is_empty()) {
            self.api_url = Some(url);
        }
        if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
            self.api_key = Some(key);
        }
    }

    /// Get effective API URL, if any is configured
    pub fn effective_api_url(&self) -> Option<String> {
        self.api_url.clone().filter(|u| !u.trim().is_empty())
    }

    /// Credentials sent with every request
    pub fn credentials(&self) -> Credentials {
        match &self.api_key {
            Some(key) if !key.trim().is_empty() => Credentials::ApiKey(key.clone()),
            _ => Credentials::Anonymous,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Default options for the query cache
    pub fn query_options(&self) -> QueryOptions {
        QueryOptions::default()
            .with_stale_time(Duration::from_secs(self.stale_time_secs))
            .with_gc_time(Duration::from_secs(self.gc_time_secs))
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("portica-test-{}", Uuid::new_v4()))
            .join("config.json")
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.gc_time_secs, 300);
        assert_eq!(config.notifications.max_history, 50);
        assert!(matches!(config.credentials(), Credentials::Anonymous));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = Config::load_from(&temp_path()).unwrap();
        assert!(config.api_url.is_none());
    }

    #[test]
    fn test_save_and_load() {
        let path = temp_path();
        let mut config = Config::default();
        config.api_url = Some("https://portainer.local/api".to_string());
        config.stale_time_secs = 15;
        config.notifications.detail_level = DetailLevel::Verbose;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.effective_api_url().as_deref(), Some("https://portainer.local/api"));
        assert_eq!(loaded.query_options().stale_time, Duration::from_secs(15));
        assert_eq!(loaded.notifications.detail_level, DetailLevel::Verbose);

        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let path = temp_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"api_key": "ptr_secret"}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert!(matches!(config.credentials(), Credentials::ApiKey(ref k) if k == "ptr_secret"));
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.gc_time_secs, 300);

        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let path = temp_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{not json").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().starts_with("Failed to parse"));

        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_command_line_wins_over_file() {
        let mut config = Config::default();
        config.api_url = Some("https://from-file/api".to_string());
        config.merge(Some("https://from-cli/api".to_string()), Some(String::new()));

        assert_eq!(config.effective_api_url().as_deref(), Some("https://from-cli/api"));
        assert!(config.api_key.is_none());
    }
}
