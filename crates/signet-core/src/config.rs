//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries the
//! server and database sub-configs. Every section defaults sensibly so a
//! completely empty `{}` file is valid. Pool sizing is fixed at startup and
//! not mutable at runtime.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;
use crate::Error;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub db: DbConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    ///
    /// This is intentionally string-based so the caller can read the file
    /// however it sees fit (async, embedded, etc.).
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Apply environment variable overrides (`DB_PATH`).
    pub fn apply_env(&mut self) {
        if let Ok(path) = std::env::var("DB_PATH") {
            if !path.is_empty() {
                self.db.path = path;
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port is 0; a random port will be assigned".into());
        }

        if self.db.max_connections == 0 {
            warnings.push("db.max_connections is 0; no connection can ever be acquired".into());
        }

        if self.db.min_connections > self.db.max_connections {
            warnings.push(format!(
                "db.min_connections ({}) exceeds db.max_connections ({}); the pool is capped at max",
                self.db.min_connections, self.db.max_connections
            ));
        }

        if self.db.busy_timeout_ms == 0 {
            warnings.push(
                "db.busy_timeout_ms is 0; lock contention will fail immediately instead of waiting"
                    .into(),
            );
        }

        warnings
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
        }
    }
}

/// Database and connection pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// Path to the SQLite database file.
    pub path: String,
    /// Connections created eagerly at startup.
    pub min_connections: u32,
    /// Hard cap on live connections; demand beyond this blocks.
    pub max_connections: u32,
    /// SQLite busy handler timeout applied per connection.
    pub busy_timeout_ms: u64,
    /// How long `acquire` waits for pool capacity before failing with
    /// `PoolExhausted`. `None` waits indefinitely.
    pub acquire_timeout_ms: Option<u64>,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: "signet.db".into(),
            min_connections: 1,
            max_connections: 5,
            busy_timeout_ms: 5000,
            acquire_timeout_ms: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_is_valid() {
        let config = Config::from_json("{}").unwrap();
        assert_eq!(config.db.min_connections, 1);
        assert_eq!(config.db.max_connections, 5);
        assert_eq!(config.db.busy_timeout_ms, 5000);
        assert!(config.db.acquire_timeout_ms.is_none());
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn partial_override() {
        let config = Config::from_json(r#"{"db": {"max_connections": 2}}"#).unwrap();
        assert_eq!(config.db.max_connections, 2);
        assert_eq!(config.db.min_connections, 1);
    }

    #[test]
    fn invalid_json_errors() {
        assert!(Config::from_json("not json").is_err());
    }

    #[test]
    fn load_missing_file_uses_defaults() {
        let config = Config::load_or_default(Some(Path::new("/nonexistent/signet.json")));
        assert_eq!(config.db.max_connections, 5);
    }

    #[test]
    fn validate_flags_zero_max() {
        let mut config = Config::default();
        config.db.max_connections = 0;
        let warnings = config.validate();
        assert!(warnings.iter().any(|w| w.contains("max_connections")));
    }

    #[test]
    fn validate_flags_min_above_max() {
        let mut config = Config::default();
        config.db.min_connections = 10;
        let warnings = config.validate();
        assert!(warnings.iter().any(|w| w.contains("min_connections")));
    }

    #[test]
    fn validate_clean_config() {
        assert!(Config::default().validate().is_empty());
    }
}
