//! Store configuration.
//!
//! A single storage string decides everything: a `sqlite:` URI selects the
//! database backend, anything else is the root directory of the file backend.

use crate::core::error::StoreError;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Default config file name looked up by the CLI.
pub const CONFIG_FILE_NAME: &str = "recordstore.toml";
/// Environment override for `database.uri`.
pub const URI_ENV_VAR: &str = "RECORDSTORE_DATABASE_URI";
/// Scheme prefix that marks a database URI.
pub const DATABASE_SCHEME: &str = "sqlite:";

const DEFAULT_URI: &str = "data";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// `sqlite://<path>` for the database backend, or a directory path.
    pub uri: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            uri: DEFAULT_URI.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Append-only JSONL log of mutations. Disabled when unset.
    #[serde(default)]
    pub audit_log: Option<PathBuf>,
}

impl StoreConfig {
    pub fn with_uri(uri: impl Into<String>) -> Self {
        Self {
            database: DatabaseConfig { uri: uri.into() },
            audit_log: None,
        }
    }

    pub fn is_database_backend(&self) -> bool {
        is_database_uri(&self.database.uri)
    }

    /// Parse a config from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, StoreError> {
        toml::from_str(content).map_err(|e| StoreError::ConfigError(e.to_string()))
    }

    /// Load a config file, falling back to defaults when it does not exist,
    /// then apply the environment override.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let mut config = if path.exists() {
            let content = fs::read_to_string(path).map_err(StoreError::IoError)?;
            Self::from_toml(&content)?
        } else {
            Self::default()
        };

        match env::var(URI_ENV_VAR) {
            Ok(uri) if !uri.trim().is_empty() => config.database.uri = uri,
            Ok(_) | Err(env::VarError::NotPresent) => {}
            Err(e) => return Err(StoreError::EnvVarError(e)),
        }

        Ok(config)
    }
}

pub fn is_database_uri(uri: &str) -> bool {
    uri.starts_with(DATABASE_SCHEME)
}

/// Filesystem path of the SQLite database named by a `sqlite:` URI.
///
/// Accepts both `sqlite://path/to/db` and `sqlite:path/to/db`.
pub fn database_path(uri: &str) -> Result<PathBuf, StoreError> {
    let rest = uri
        .strip_prefix(DATABASE_SCHEME)
        .ok_or_else(|| StoreError::ConfigError(format!("not a database URI: {}", uri)))?;
    let rest = rest.strip_prefix("//").unwrap_or(rest);
    if rest.is_empty() {
        return Err(StoreError::ConfigError(format!(
            "database URI has no path: {}",
            uri
        )));
    }
    Ok(PathBuf::from(rest))
}
