//! Configuration system for tweetdb.
//!
//! Provides layered configuration from multiple sources:
//!
//! 1. **Compiled defaults** - files in the current directory, like the
//!    original script layout (`twitter.db`, `keywords.txt`)
//! 2. **User config file** - `~/.config/tweetdb/config.toml` (or `--config`)
//! 3. **Environment variables** - `TWEETDB_*` prefix
//! 4. **CLI arguments** - Highest priority, always wins
//!
//! # Example Configuration File
//!
//! ```toml
//! [paths]
//! db = "~/tweets/twitter.db"
//! keywords = "~/tweets/keywords.txt"
//! export_dir = "~/tweets/exports"
//!
//! [api]
//! base_url = "https://api.twitter.com/1.1"
//! page_size = 200
//! timeout_secs = 30
//!
//! [output]
//! preview_rows = 10
//! export_rows = 5000
//! charts = true
//!
//! [credentials]
//! consumer_key = "..."
//! consumer_secret = "..."
//! access_token = "..."
//! access_token_secret = "..."
//! ```

use crate::credentials::Credentials;
use crate::error::{Result, TweetDbError};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Main configuration structure for tweetdb.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// File locations.
    pub paths: PathsConfig,
    /// Upstream API settings.
    pub api: ApiConfig,
    /// Console and export settings.
    pub output: OutputConfig,
    /// API secrets.
    pub credentials: Credentials,
}

/// Path configuration for the database, keyword list and exports.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Path to the `SQLite` database file.
    /// Environment variable: `TWEETDB_DB`
    pub db: Option<PathBuf>,

    /// Path to the keyword list.
    /// Environment variable: `TWEETDB_KEYWORDS`
    pub keywords: Option<PathBuf>,

    /// Directory for `data.csv`, `test.csv` and `READ.csv`.
    /// Environment variable: `TWEETDB_EXPORT_DIR`
    pub export_dir: Option<PathBuf>,
}

/// Upstream API settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the v1.1 REST API.
    /// Environment variable: `TWEETDB_API_URL`
    pub base_url: String,

    /// Records requested per page.
    pub page_size: u32,

    /// Per-request timeout.
    pub timeout_secs: u64,
}

/// Console and export settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Rows shown in the console preview after each fetch.
    pub preview_rows: usize,

    /// Maximum rows written to a debug export file.
    pub export_rows: usize,

    /// Render terminal charts after analysis.
    pub charts: bool,

    /// Enable colored output.
    pub colors: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: crate::DEFAULT_API_URL.to_string(),
            page_size: 200,
            timeout_secs: 30,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            preview_rows: 10,
            export_rows: 5000,
            charts: true,
            colors: true,
        }
    }
}

impl Config {
    /// Load configuration from the user config file and the environment.
    ///
    /// When `explicit` is given, that file must exist and parse.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly requested config file is missing or
    /// any config file is malformed.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(TweetDbError::ConfigError {
                        path: path.to_path_buf(),
                        reason: "file does not exist".to_string(),
                    });
                }
                Self::load_from_file(path)?
            }
            None => match Self::user_config_path() {
                Some(path) if path.exists() => Self::load_from_file(&path)?,
                _ => Self::default(),
            },
        };

        config.apply_env_overrides();
        debug!(
            db = %config.db_path().display(),
            keywords = %config.keywords_path().display(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TweetDbError::path_error("read", path, e))?;
        let config = toml::from_str(&content).map_err(|e| TweetDbError::ConfigError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        info!("Loaded config from: {}", path.display());
        Ok(config)
    }

    /// Get the path to the user configuration file.
    #[must_use]
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("tweetdb").join("config.toml"))
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(db) = std::env::var("TWEETDB_DB") {
            self.paths.db = Some(PathBuf::from(db));
        }
        if let Ok(keywords) = std::env::var("TWEETDB_KEYWORDS") {
            self.paths.keywords = Some(PathBuf::from(keywords));
        }
        if let Ok(dir) = std::env::var("TWEETDB_EXPORT_DIR") {
            self.paths.export_dir = Some(PathBuf::from(dir));
        }
        if let Ok(url) = std::env::var("TWEETDB_API_URL") {
            self.api.base_url = url;
        }
        if std::env::var("TWEETDB_NO_COLOR").is_ok() || std::env::var("NO_COLOR").is_ok() {
            self.output.colors = false;
        }
        self.credentials.apply_env_overrides();
    }

    /// Get the database path, using the default if not configured.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.paths
            .db
            .clone()
            .unwrap_or_else(|| PathBuf::from(crate::DEFAULT_DB_NAME))
    }

    /// Get the keyword list path, using the default if not configured.
    #[must_use]
    pub fn keywords_path(&self) -> PathBuf {
        self.paths
            .keywords
            .clone()
            .unwrap_or_else(|| PathBuf::from(crate::DEFAULT_KEYWORDS_FILE))
    }

    /// Get the export directory, defaulting to the current directory.
    #[must_use]
    pub fn export_dir(&self) -> PathBuf {
        self.paths
            .export_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api.page_size, 200);
        assert_eq!(config.output.preview_rows, 10);
        assert!(config.output.charts);
        assert_eq!(config.db_path(), PathBuf::from("twitter.db"));
        assert_eq!(config.keywords_path(), PathBuf::from("keywords.txt"));
        assert_eq!(config.export_dir(), PathBuf::from("."));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
            [paths]
            db = "/data/tw.db"

            [output]
            preview_rows = 3

            [credentials]
            consumer_key = "ck"
            "#,
        )
        .unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.db_path(), PathBuf::from("/data/tw.db"));
        assert_eq!(config.output.preview_rows, 3);
        assert_eq!(config.output.export_rows, 5000);
        assert_eq!(config.api.base_url, crate::DEFAULT_API_URL);
        assert_eq!(config.credentials.get("consumer_key"), Some("ck"));
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[paths\ndb = ").unwrap();
        let err = Config::load_from_file(&path).unwrap_err();
        assert!(matches!(err, TweetDbError::ConfigError { .. }));
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let err = Config::load(Some(Path::new("/nonexistent/tweetdb.toml"))).unwrap_err();
        assert!(matches!(err, TweetDbError::ConfigError { .. }));
    }
}
