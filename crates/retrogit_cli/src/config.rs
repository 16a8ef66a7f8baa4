//! Configuration file support for retrogit.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (prefixed with `RETROGIT_`, e.g., `RETROGIT_GITHUB_TOKEN`)
//! 3. Config file (~/.config/retrogit/config.toml or ./retrogit.toml)
//! 4. Built-in defaults
//!
//! The database URL defaults to `sqlite://~/.local/state/retrogit/retrogit.db` on Linux
//! (using the XDG state directory) if not explicitly configured.
//!
//! Example config file:
//! ```toml
//! [database]
//! url = "sqlite://~/.local/state/retrogit/retrogit.db"  # optional, this is the default
//!
//! [github]
//! token = "ghp_..."  # or use RETROGIT_GITHUB_TOKEN env var
//! api_url = "https://api.github.com"
//! requests_per_second = 10
//!
//! [cache]
//! enabled = true
//! backend = "database"  # or "memory"
//! capacity = 4096       # entries, memory backend only
//!
//! [vintage]
//! retry_delay_secs = 10
//! concurrency = 8
//!
//! [digest]
//! lookback_years = 1
//! window_days = 1
//! concurrency = 16
//! excluded_repos = [1296269]
//! ```

use std::path::PathBuf;
use std::time::Duration;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use directories::ProjectDirs;
use retrogit::cache::{CachingTransport, MemoryCacheStore};
use retrogit::digest::{
    DEFAULT_DIGEST_CONCURRENCY, DEFAULT_LOOKBACK_YEARS, DEFAULT_WINDOW_DAYS, DigestOptions,
};
use retrogit::github::GITHUB_API_URL;
use retrogit::rate_limits;
use retrogit::repos::DigestPreferences;
use retrogit::vintage::{DEFAULT_RETRY_DELAY, DEFAULT_VINTAGE_CONCURRENCY, VintageOptions};
use serde::Deserialize;

const APP_NAME: &str = "retrogit";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub github: GitHubConfig,
    /// Response cache in front of the GitHub API.
    pub cache: CacheConfig,
    pub vintage: VintageConfig,
    pub digest: DigestConfig,
}

/// Database configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database connection URL.
    /// Supports sqlite:// and postgres:// schemes.
    /// Defaults to `sqlite://~/.local/state/retrogit/retrogit.db` if not specified.
    pub url: Option<String>,
}

/// GitHub configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// GitHub API token.
    /// Can also be set via RETROGIT_GITHUB_TOKEN environment variable.
    pub token: Option<String>,
    /// API root; GitHub Enterprise uses `https://host/api/v3`.
    pub api_url: String,
    /// Proactive client-side limit. `0` disables it.
    pub requests_per_second: u32,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: GITHUB_API_URL.to_string(),
            requests_per_second: rate_limits::GITHUB_DEFAULT_RPS,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// The `http_cache` table, shared across runs.
    #[default]
    Database,
    /// Process-local, bounded.
    Memory,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub backend: CacheBackend,
    pub namespace: String,
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: CacheBackend::Database,
            namespace: CachingTransport::DEFAULT_NAMESPACE.to_string(),
            capacity: MemoryCacheStore::DEFAULT_CAPACITY,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct VintageConfig {
    /// Seconds before re-asking for contributor statistics still being computed.
    pub retry_delay_secs: u64,
    pub concurrency: usize,
}

impl Default for VintageConfig {
    fn default() -> Self {
        Self {
            retry_delay_secs: DEFAULT_RETRY_DELAY.as_secs(),
            concurrency: DEFAULT_VINTAGE_CONCURRENCY,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DigestConfig {
    pub lookback_years: u32,
    pub window_days: u32,
    /// Repositories fetched at once; `0` means all at once.
    pub concurrency: usize,
    /// Repository ids never included in digests.
    pub excluded_repos: Vec<i64>,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            lookback_years: DEFAULT_LOOKBACK_YEARS,
            window_days: DEFAULT_WINDOW_DAYS,
            concurrency: DEFAULT_DIGEST_CONCURRENCY,
            excluded_repos: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    ///
    /// Sources are loaded in order (later sources override earlier):
    /// 1. Built-in defaults
    /// 2. XDG config file (~/.config/retrogit/config.toml)
    /// 3. Local config file (./retrogit.toml)
    /// 4. Environment variables with RETROGIT_ prefix
    pub fn load() -> Self {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = Self::default_config_path()
            && path.exists()
        {
            tracing::debug!("Loading config from {:?}", path);
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(false));
        }

        let local_config = PathBuf::from("retrogit.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./retrogit.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        // e.g., RETROGIT_DATABASE_URL -> database.url
        builder = builder.add_source(
            Environment::with_prefix("RETROGIT")
                .separator("_")
                .try_parsing(true),
        );

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<Config>() {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to deserialize config: {}", e);
                    Config::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to build config: {}", e);
                Config::default()
            }
        }
    }

    /// Get the database URL, falling back to the default state directory path.
    ///
    /// The `mode=rwc` parameter creates the SQLite file if it doesn't exist.
    pub fn database_url(&self) -> Option<String> {
        self.database.url.clone().or_else(|| {
            Self::default_state_dir().map(|state_dir| {
                let db_path = state_dir.join("retrogit.db");
                format!("sqlite://{}?mode=rwc", db_path.display())
            })
        })
    }

    /// The GitHub token, treating an empty value as unset.
    pub fn github_token(&self) -> Option<&str> {
        self.github.token.as_deref().filter(|t| !t.trim().is_empty())
    }

    pub fn vintage_options(&self) -> VintageOptions {
        VintageOptions {
            retry_delay: Duration::from_secs(self.vintage.retry_delay_secs),
            concurrency: self.vintage.concurrency,
        }
    }

    pub fn digest_options(&self) -> DigestOptions {
        DigestOptions {
            lookback_years: self.digest.lookback_years,
            window_days: self.digest.window_days,
            concurrency: self.digest.concurrency,
        }
    }

    pub fn digest_preferences(&self) -> DigestPreferences {
        DigestPreferences {
            excluded_repo_ids: self.digest.excluded_repos.iter().copied().collect(),
        }
    }

    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get the default state directory path.
    ///
    /// On Linux, this is `$XDG_STATE_HOME/retrogit` or `~/.local/state/retrogit`.
    /// On macOS/Windows, falls back to the data directory.
    pub fn default_state_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", APP_NAME).map(|dirs| {
            dirs.state_dir()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| dirs.data_dir().to_path_buf())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_toml(content: &str) -> Config {
        ConfigBuilder::builder()
            .add_source(config::File::from_str(content, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.database.url.is_none());
        assert!(config.github.token.is_none());
        assert_eq!(config.github.api_url, "https://api.github.com");
        assert_eq!(config.github.requests_per_second, 10);
        assert!(config.cache.enabled);
        assert_eq!(config.cache.backend, CacheBackend::Database);
        assert_eq!(config.cache.namespace, "CachingTransport");
        assert_eq!(config.vintage.retry_delay_secs, 10);
        assert_eq!(config.vintage.concurrency, 8);
        assert_eq!(config.digest.lookback_years, 1);
        assert_eq!(config.digest.window_days, 1);
        assert!(config.digest.excluded_repos.is_empty());
    }

    #[test]
    fn test_config_builder_with_defaults() {
        let settings = ConfigBuilder::builder().build().unwrap();
        let config: Config = settings.try_deserialize().unwrap_or_default();

        assert_eq!(config.digest.concurrency, 16);
        assert_eq!(config.vintage_options().retry_delay, Duration::from_secs(10));
    }

    #[test]
    fn test_full_config_parsing() {
        let config = from_toml(
            r#"
            [database]
            url = "sqlite:///tmp/test.db"

            [github]
            token = "ghp_test123"
            api_url = "https://ghe.example.com/api/v3"
            requests_per_second = 0

            [cache]
            backend = "memory"
            capacity = 10

            [vintage]
            retry_delay_secs = 30
            concurrency = 2

            [digest]
            lookback_years = 2
            window_days = 7
            concurrency = 0
            excluded_repos = [1, 2, 3]
        "#,
        );

        assert_eq!(
            config.database.url,
            Some("sqlite:///tmp/test.db".to_string())
        );
        assert_eq!(config.github_token(), Some("ghp_test123"));
        assert_eq!(config.github.api_url, "https://ghe.example.com/api/v3");
        assert_eq!(config.github.requests_per_second, 0);
        assert_eq!(config.cache.backend, CacheBackend::Memory);
        assert_eq!(config.cache.capacity, 10);
        assert!(config.cache.enabled);

        let vintage = config.vintage_options();
        assert_eq!(vintage.retry_delay, Duration::from_secs(30));
        assert_eq!(vintage.concurrency, 2);

        let digest = config.digest_options();
        assert_eq!(digest.lookback_years, 2);
        assert_eq!(digest.window_days, 7);
        assert_eq!(digest.concurrency, 0);

        let prefs = config.digest_preferences();
        assert!(!prefs.includes(2));
        assert!(prefs.includes(4));
    }

    #[test]
    fn test_config_partial_override() {
        let config = from_toml(
            r#"
            [digest]
            window_days = 3
        "#,
        );

        assert_eq!(config.digest.window_days, 3);
        assert_eq!(config.digest.lookback_years, 1);
        assert_eq!(config.vintage.concurrency, 8);
    }

    #[test]
    fn test_config_merging_order() {
        let settings = ConfigBuilder::builder()
            .add_source(config::File::from_str(
                "[vintage]\nretry_delay_secs = 60\nconcurrency = 4",
                FileFormat::Toml,
            ))
            .add_source(config::File::from_str(
                "[vintage]\nretry_delay_secs = 5",
                FileFormat::Toml,
            ))
            .build()
            .unwrap();
        let config: Config = settings.try_deserialize().unwrap();

        assert_eq!(config.vintage.retry_delay_secs, 5);
        assert_eq!(config.vintage.concurrency, 4);
    }

    #[test]
    fn test_blank_token_is_unset() {
        let config = from_toml("[github]\ntoken = \"  \"");
        assert!(config.github_token().is_none());
    }

    #[test]
    fn test_unknown_cache_backend_is_rejected() {
        let result = ConfigBuilder::builder()
            .add_source(config::File::from_str(
                "[cache]\nbackend = \"redis\"",
                FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize::<Config>();
        assert!(result.is_err());
    }

    #[test]
    fn test_config_invalid_toml() {
        let result = ConfigBuilder::builder()
            .add_source(config::File::from_str("[digest\nwindow_days = 1", FileFormat::Toml))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_database_url_defaults_to_state_dir() {
        let url = Config::default().database_url().expect("default url");
        assert!(url.starts_with("sqlite://"));
        assert!(url.contains("retrogit.db"));
        assert!(url.ends_with("?mode=rwc"));
    }

    #[test]
    fn test_database_url_respects_configured_value() {
        let config = from_toml("[database]\nurl = \"postgres://localhost/retrogit\"");
        assert_eq!(
            config.database_url(),
            Some("postgres://localhost/retrogit".to_string())
        );
    }
}
