//! Core configuration loaded from TOML.
//!
//! ```toml
//! [api]
//! base_url = "http://localhost:8080"
//! timeout_secs = 30
//!
//! [storage]
//! database_path = "docpug.sqlite3"
//!
//! [stock]
//! decrement_on_add = true
//! restore_on_remove = true
//!
//! [logging]
//! filter = "info"
//! json = false
//! ```
//!
//! `DOCPUG_API_URL` and `DOCPUG_DB_PATH` override the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable overriding `api.base_url`.
pub const ENV_API_URL: &str = "DOCPUG_API_URL";

/// Environment variable overriding `storage.database_path`.
pub const ENV_DB_PATH: &str = "DOCPUG_DB_PATH";

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Remote API settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    /// Server root URL.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            timeout_secs: 30,
        }
    }
}

impl ApiSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// Local storage settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// SQLite database file.
    pub database_path: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("docpug.sqlite3"),
        }
    }
}

/// How stock lines move the stock registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StockPolicy {
    /// Take the line quantity out of stock when a line is added.
    pub decrement_on_add: bool,
    /// Put the line quantity back when a line is removed.
    pub restore_on_remove: bool,
}

impl Default for StockPolicy {
    fn default() -> Self {
        Self {
            decrement_on_add: true,
            restore_on_remove: true,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// `EnvFilter` directive; `RUST_LOG` wins when set.
    pub filter: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

/// Complete core configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub api: ApiSettings,
    pub storage: StorageSettings,
    pub stock: StockPolicy,
    pub logging: LogSettings,
}

impl CoreConfig {
    /// Parse configuration from TOML text. Missing keys take defaults.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load configuration from a file, then apply environment overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&text)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Defaults plus environment overrides.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok());
        config
    }

    /// Apply overrides from a variable lookup. Blank values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = lookup(ENV_API_URL) {
            self.api.base_url = url.trim().to_string();
        }
        if let Some(path) = lookup(ENV_DB_PATH) {
            self.storage.database_path = PathBuf::from(path.trim());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = CoreConfig::from_toml_str("").unwrap();
        assert_eq!(config, CoreConfig::default());
        assert_eq!(config.api.base_url, "http://localhost:8080");
        assert_eq!(config.api.timeout(), Duration::from_secs(30));
        assert!(config.stock.decrement_on_add);
        assert!(config.stock.restore_on_remove);
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn test_partial_sections() {
        let config = CoreConfig::from_toml_str(
            r#"
            [api]
            base_url = "https://clinic.example"

            [stock]
            decrement_on_add = false
            "#,
        )
        .unwrap();

        assert_eq!(config.api.base_url, "https://clinic.example");
        assert_eq!(config.api.timeout_secs, 30);
        assert!(!config.stock.decrement_on_add);
        assert!(config.stock.restore_on_remove);
    }

    #[test]
    fn test_invalid_toml() {
        let err = CoreConfig::from_toml_str("[api\nbase_url = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_overrides() {
        let mut config = CoreConfig::default();
        config.apply_overrides(|key| match key {
            ENV_API_URL => Some(" http://10.0.0.2:5000 ".to_string()),
            ENV_DB_PATH => Some("  ".to_string()),
            _ => None,
        });

        assert_eq!(config.api.base_url, "http://10.0.0.2:5000");
        assert_eq!(config.storage.database_path, PathBuf::from("docpug.sqlite3"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[logging]\njson = true").unwrap();

        let config = CoreConfig::load(file.path()).unwrap();
        assert!(config.logging.json);

        let missing = CoreConfig::load("/nonexistent/docpug.toml").unwrap_err();
        assert!(matches!(missing, ConfigError::Io { .. }));
    }
}
