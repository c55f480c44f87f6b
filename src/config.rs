//! Configuration loaded from `config.toml` with environment overrides.
//!
//! ```toml
//! database_path = "/home/me/.local/share/revisu/revisu.db"
//! initial_review_delay_secs = 300
//!
//! [extraction]
//! api_key = "..."
//! model = "gemini-2.5-flash"
//! timeout_secs = 30
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::topics::manager::DEFAULT_INITIAL_REVIEW_DELAY_SECS;

/// Environment variable holding the Gemini API key
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Environment variable overriding the database location
pub const DATABASE_ENV: &str = "REVISU_DATABASE";

const APP_DIR: &str = "revisu";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Could not determine data directory")]
    NoDataDir,
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database file (default: `<data dir>/revisu/revisu.db`)
    pub database_path: Option<PathBuf>,
    /// Seconds before a new topic is first due
    pub initial_review_delay_secs: i64,
    pub extraction: ExtractionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: None,
            initial_review_delay_secs: DEFAULT_INITIAL_REVIEW_DELAY_SECS,
            extraction: ExtractionConfig::default(),
        }
    }
}

/// Settings for the content extraction service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    /// Upper bound on a single extraction call
    pub timeout_secs: u64,
    /// Characters of the note sent to the model
    pub max_input_chars: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-2.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            timeout_secs: 30,
            max_input_chars: 3000,
        }
    }
}

impl ExtractionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Default config file location (e.g., ~/.config/revisu/config.toml)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.toml"))
    }

    /// Load configuration, then apply environment overrides.
    ///
    /// An explicit `path` must exist. Without one, the default location is
    /// read if present and defaults are used otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&content)?;
        log::debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Override settings from environment variables looked up with `lookup`
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(API_KEY_ENV).filter(|k| !k.is_empty()) {
            self.extraction.api_key = Some(key);
        }
        if let Some(path) = lookup(DATABASE_ENV).filter(|p| !p.is_empty()) {
            self.database_path = Some(PathBuf::from(path));
        }
    }

    /// Resolved database file location
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => dirs::data_dir()
                .map(|dir| dir.join(APP_DIR).join("revisu.db"))
                .ok_or(ConfigError::NoDataDir),
        }
    }

    pub fn initial_review_delay(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.initial_review_delay_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::from_toml_str("").unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.initial_review_delay(), chrono::Duration::minutes(5));
        assert_eq!(config.extraction.timeout(), Duration::from_secs(30));
        assert_eq!(config.extraction.max_input_chars, 3000);
    }

    #[test]
    fn test_parse_partial_file() {
        let config = Config::from_toml_str(
            r#"
            database_path = "/tmp/revisu-test.db"
            initial_review_delay_secs = 60

            [extraction]
            model = "gemini-2.0-flash"
            timeout_secs = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.database_path().unwrap(), PathBuf::from("/tmp/revisu-test.db"));
        assert_eq!(config.initial_review_delay(), chrono::Duration::seconds(60));
        assert_eq!(config.extraction.model, "gemini-2.0-flash");
        assert_eq!(config.extraction.timeout(), Duration::from_secs(5));
        assert_eq!(config.extraction.api_key, None);
        assert_eq!(config.extraction.max_input_chars, 3000);
    }

    #[test]
    fn test_invalid_file() {
        assert!(matches!(
            Config::from_toml_str("initial_review_delay_secs = \"soon\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [(API_KEY_ENV, "from-env"), (DATABASE_ENV, "/data/r.db")]
            .into_iter()
            .collect();
        let mut config = Config::default();
        config.extraction.api_key = Some("from-file".to_string());

        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.extraction.api_key.as_deref(), Some("from-env"));
        assert_eq!(config.database_path, Some(PathBuf::from("/data/r.db")));
    }

    #[test]
    fn test_empty_env_is_ignored() {
        let mut config = Config::default();
        config.apply_env(|_| Some(String::new()));

        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[extraction]\napi_key = \"k\"\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.extraction.api_key.as_deref(), Some("k"));

        let missing = temp_dir.path().join("missing.toml");
        assert!(matches!(Config::from_file(&missing), Err(ConfigError::Io { .. })));
    }
}
