//! Configuration file handling.
//!
//! Loads optional settings from a TOML file:
//! - Linux: `~/.config/roguepkg/config.toml`
//! - macOS: `~/Library/Application Support/roguepkg/config.toml`
//! - Windows: `%APPDATA%\roguepkg\config.toml`
//!
//! A missing file yields defaults; the `GITHUB_TOKEN` environment
//! variable always overrides the file.
//!
//! # Example Configuration
//!
//! ```toml
//! default_format = "text"
//! max_repos = 50
//! # github_token = "ghp_..."
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::github::GITHUB_API_URL;
use crate::osv::OSV_API_URL;
use crate::scan::DEFAULT_MAX_REPOS;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// OSV API base URL. Only worth changing against a test double.
    pub osv_url: String,

    /// GitHub API base URL.
    pub github_url: String,

    /// GitHub token for repository/organization scans.
    pub github_token: Option<String>,

    /// Default cap on repositories per organization scan.
    pub max_repos: usize,

    /// Default output format ("text" or "json").
    pub default_format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            osv_url: OSV_API_URL.to_string(),
            github_url: GITHUB_API_URL.to_string(),
            github_token: None,
            max_repos: DEFAULT_MAX_REPOS,
            default_format: "text".to_string(),
        }
    }
}

impl Config {
    /// Loads configuration from the config file, falling back to defaults
    /// when it doesn't exist, then applies environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();

        let config = if path.exists() {
            let content = fs::read_to_string(&path)?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };

        Ok(config.with_env_token(std::env::var("GITHUB_TOKEN").ok()))
    }

    /// Applies the `GITHUB_TOKEN` override; an absent or empty value
    /// leaves the file-configured token in place.
    fn with_env_token(mut self, token: Option<String>) -> Self {
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            self.github_token = Some(token);
        }
        self
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("roguepkg")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.osv_url, OSV_API_URL);
        assert_eq!(config.github_url, GITHUB_API_URL);
        assert_eq!(config.max_repos, 50);
        assert_eq!(config.default_format, "text");
        assert!(config.github_token.is_none());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = toml::from_str("max_repos = 10").unwrap();
        assert_eq!(config.max_repos, 10);
        assert_eq!(config.default_format, "text");
    }

    #[test]
    fn test_env_token_overrides_file_token() {
        let config: Config = toml::from_str(r#"github_token = "from-file""#).unwrap();
        let config = config.with_env_token(Some("from-env".to_string()));
        assert_eq!(config.github_token.as_deref(), Some("from-env"));
    }

    #[test]
    fn test_empty_env_token_is_ignored() {
        let config: Config = toml::from_str(r#"github_token = "from-file""#).unwrap();
        let config = config.with_env_token(Some(String::new()));
        assert_eq!(config.github_token.as_deref(), Some("from-file"));
    }
}
