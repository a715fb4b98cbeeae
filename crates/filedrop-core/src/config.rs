//! Application configuration management.
//!
//! This module handles loading and saving the application configuration,
//! which includes the API base URL, HTTP timeouts, and last used identity.
//!
//! Configuration is stored at `~/.config/filedrop/config.json`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "filedrop";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding the API base URL
pub const API_URL_ENV: &str = "FILEDROP_API_URL";

/// Base URL used when neither the environment nor the config file names one
pub const DEFAULT_API_URL: &str = "http://localhost:8080";

/// HTTP request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Timeout for the token refresh call. Expiry counts as a failed refresh.
const DEFAULT_REFRESH_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub api_url: Option<String>,
    pub request_timeout_secs: u64,
    pub refresh_timeout_secs: u64,
    pub last_identity: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            refresh_timeout_secs: DEFAULT_REFRESH_TIMEOUT_SECS,
            last_identity: None,
        }
    }
}

impl Config {
    /// Read the user's config, or the defaults when there is none yet
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    fn load_from(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", path.display())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).context("Failed to create config directory")?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    fn config_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_NAME).join(CONFIG_FILE))
            .context("Could not find config directory")
    }

    /// Directory holding the persisted session file
    pub fn cache_dir(&self) -> Result<PathBuf> {
        dirs::cache_dir()
            .map(|dir| dir.join(APP_NAME))
            .context("Could not find cache directory")
    }

    /// Resolve the API base URL: environment first, then config, then the default.
    pub fn base_url(&self) -> String {
        resolve_base_url(std::env::var(API_URL_ENV).ok(), self.api_url.as_deref())
    }
}

fn resolve_base_url(from_env: Option<String>, configured: Option<&str>) -> String {
    from_env
        .filter(|url| !url.trim().is_empty())
        .or_else(|| configured.map(str::to_string))
        .unwrap_or_else(|| DEFAULT_API_URL.to_string())
}

/// Join the base URL and an endpoint path without doubling slashes.
pub fn api_url(base_url: &str, path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let path = path.strip_prefix('/').unwrap_or(path);
    format!("{}/{}", base, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_url_joins_paths() {
        assert_eq!(api_url("http://localhost:8080", "login"), "http://localhost:8080/login");
        assert_eq!(api_url("http://localhost:8080", "/login"), "http://localhost:8080/login");
        assert_eq!(api_url("http://localhost:8080/", "/files"), "http://localhost:8080/files");
        assert_eq!(
            api_url("https://files.example.com/api", "download/abc"),
            "https://files.example.com/api/download/abc"
        );
    }

    #[test]
    fn test_resolve_base_url_precedence() {
        assert_eq!(resolve_base_url(None, None), DEFAULT_API_URL);
        assert_eq!(
            resolve_base_url(None, Some("http://configured:9000")),
            "http://configured:9000"
        );
        assert_eq!(
            resolve_base_url(Some("http://env:7000".into()), Some("http://configured:9000")),
            "http://env:7000"
        );
        // Blank env var falls through
        assert_eq!(
            resolve_base_url(Some("  ".into()), Some("http://configured:9000")),
            "http://configured:9000"
        );
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"last_identity": "alice"}"#)
            .expect("Failed to parse partial config");
        assert_eq!(config.last_identity.as_deref(), Some("alice"));
        assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
        assert_eq!(config.refresh_timeout_secs, DEFAULT_REFRESH_TIMEOUT_SECS);
        assert!(config.api_url.is_none());
    }

    #[test]
    fn test_missing_config_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_then_load_keeps_last_identity() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            last_identity: Some("alice".into()),
            api_url: Some("http://files.local:9000".into()),
            ..Config::default()
        };

        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_corrupt_config_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{broken").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("config.json"));
    }
}
