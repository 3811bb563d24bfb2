//! Application configuration.
//!
//! Configuration is loaded from environment variables with fallback to defaults.
//!
//! | Variable                  | Default      |
//! |---------------------------|--------------|
//! | `VENTRIX_DB_PATH`         | `ventrix.db` |
//! | `VENTRIX_MAX_CONNECTIONS` | `5`          |
//! | `VENTRIX_BUSY_TIMEOUT_MS` | `5000`       |
//! | `VENTRIX_IMAGES_DIR`      | `imagenes`   |
//! | `VENTRIX_RUN_MIGRATIONS`  | `true`       |

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Runtime configuration of the persistence layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// SQLite database file
    pub database_path: PathBuf,

    /// Pool size
    pub max_connections: u32,

    /// How long a writer waits for the SQLite lock before giving up
    pub busy_timeout_ms: u64,

    /// Root directory of the filesystem blob store
    pub images_dir: PathBuf,

    /// Apply embedded migrations when connecting
    pub run_migrations: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            database_path: PathBuf::from("ventrix.db"),
            max_connections: 5,
            busy_timeout_ms: 5_000,
            images_dir: PathBuf::from("imagenes"),
            run_migrations: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = AppConfig::default();

        let config = AppConfig {
            database_path: lookup("VENTRIX_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),

            max_connections: parse_or(&lookup, "VENTRIX_MAX_CONNECTIONS", defaults.max_connections)?,

            busy_timeout_ms: parse_or(&lookup, "VENTRIX_BUSY_TIMEOUT_MS", defaults.busy_timeout_ms)?,

            images_dir: lookup("VENTRIX_IMAGES_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.images_dir),

            run_migrations: parse_or(&lookup, "VENTRIX_RUN_MIGRATIONS", defaults.run_migrations)?,
        };

        if config.max_connections == 0 {
            return Err(ConfigError::InvalidValue("VENTRIX_MAX_CONNECTIONS".to_string()));
        }

        Ok(config)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.database_path, PathBuf::from("ventrix.db"));
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.busy_timeout(), Duration::from_secs(5));
        assert_eq!(config.images_dir, PathBuf::from("imagenes"));
        assert!(config.run_migrations);
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("VENTRIX_DB_PATH", "/var/lib/ventrix/data.db"),
            ("VENTRIX_BUSY_TIMEOUT_MS", "250"),
            ("VENTRIX_RUN_MIGRATIONS", "false"),
        ]))
        .unwrap();
        assert_eq!(config.database_path, PathBuf::from("/var/lib/ventrix/data.db"));
        assert_eq!(config.busy_timeout_ms, 250);
        assert!(!config.run_migrations);
    }

    #[test]
    fn test_invalid_value() {
        let err = AppConfig::from_lookup(lookup(&[("VENTRIX_MAX_CONNECTIONS", "muchas")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref k) if k == "VENTRIX_MAX_CONNECTIONS"));

        assert!(AppConfig::from_lookup(lookup(&[("VENTRIX_MAX_CONNECTIONS", "0")])).is_err());
    }
}
