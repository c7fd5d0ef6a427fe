//! Core runtime configuration.
//!
//! # Responsibility
//! - Describe where the database and logs live and how chatty logs are.
//! - Load settings from JSON and environment overrides.
//!
//! # Invariants
//! - A validated config has a known log level, an absolute log dir (when
//!   set), and a recent-orders page size in `1..=100`.

use crate::logging::{default_log_level, normalize_level};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const ENV_DB_PATH: &str = "STOREFRONT_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "STOREFRONT_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "STOREFRONT_LOG_DIR";

const DEFAULT_DB_FILE: &str = "storefront.sqlite3";
const DEFAULT_RECENT_ORDERS_LIMIT: u32 = 20;
const MAX_RECENT_ORDERS_LIMIT: u32 = 100;

/// Configuration loading or validation failure.
#[derive(Debug)]
pub enum ConfigError {
    Parse(serde_json::Error),
    EmptyDbPath,
    InvalidLogLevel(String),
    RelativeLogDir(PathBuf),
    RecentOrdersLimitOutOfRange(u32),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "invalid config json: {err}"),
            Self::EmptyDbPath => write!(f, "db_path cannot be empty"),
            Self::InvalidLogLevel(level) => write!(f, "unsupported log level `{level}`"),
            Self::RelativeLogDir(dir) => {
                write!(f, "log_dir must be an absolute path, got `{}`", dir.display())
            }
            Self::RecentOrdersLimitOutOfRange(limit) => write!(
                f,
                "recent_orders_limit must be within 1..={MAX_RECENT_ORDERS_LIMIT}, got {limit}"
            ),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// Settings shared by the CLI and embedders of the core crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoreConfig {
    /// SQLite database file.
    pub db_path: PathBuf,
    pub log_level: String,
    /// Rolling log directory; `None` leaves logging uninitialized.
    pub log_dir: Option<PathBuf>,
    /// Default page size for recent-order listings.
    pub recent_orders_limit: u32,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_FILE),
            log_level: default_log_level().to_string(),
            log_dir: None,
            recent_orders_limit: DEFAULT_RECENT_ORDERS_LIMIT,
        }
    }
}

impl CoreConfig {
    /// Parses and validates a JSON document; missing keys take defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `STOREFRONT_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Applies overrides from `lookup`; blank values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(db_path) = read(ENV_DB_PATH) {
            self.db_path = PathBuf::from(db_path.trim());
        }
        if let Some(level) = read(ENV_LOG_LEVEL) {
            self.log_level = level.trim().to_string();
        }
        if let Some(log_dir) = read(ENV_LOG_DIR) {
            self.log_dir = Some(PathBuf::from(log_dir.trim()));
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.db_path.as_os_str().is_empty() {
            return Err(ConfigError::EmptyDbPath);
        }
        if normalize_level(&self.log_level).is_err() {
            return Err(ConfigError::InvalidLogLevel(self.log_level.clone()));
        }
        if let Some(log_dir) = self.log_dir.as_ref() {
            if !log_dir.is_absolute() {
                return Err(ConfigError::RelativeLogDir(log_dir.clone()));
            }
        }
        if !(1..=MAX_RECENT_ORDERS_LIMIT).contains(&self.recent_orders_limit) {
            return Err(ConfigError::RecentOrdersLimitOutOfRange(
                self.recent_orders_limit,
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, CoreConfig, ENV_DB_PATH, ENV_LOG_DIR, ENV_LOG_LEVEL};
    use std::collections::HashMap;
    use std::path::PathBuf;

    #[test]
    fn default_config_is_valid() {
        let config = CoreConfig::default();
        config.validate().unwrap();
        assert_eq!(config.recent_orders_limit, 20);
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn json_fills_missing_keys_with_defaults() {
        let config = CoreConfig::from_json_str(r#"{"db_path": "/tmp/shop.db"}"#).unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/shop.db"));
        assert_eq!(config.recent_orders_limit, 20);
    }

    #[test]
    fn json_rejects_unknown_keys_and_bad_values() {
        assert!(matches!(
            CoreConfig::from_json_str(r#"{"db": "x"}"#),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            CoreConfig::from_json_str(r#"{"log_level": "loud"}"#),
            Err(ConfigError::InvalidLogLevel(_))
        ));
        assert!(matches!(
            CoreConfig::from_json_str(r#"{"log_dir": "logs"}"#),
            Err(ConfigError::RelativeLogDir(_))
        ));
        assert!(matches!(
            CoreConfig::from_json_str(r#"{"recent_orders_limit": 0}"#),
            Err(ConfigError::RecentOrdersLimitOutOfRange(0))
        ));
    }

    #[test]
    fn env_overrides_replace_defaults_and_skip_blanks() {
        let vars = HashMap::from([
            (ENV_DB_PATH, "/var/lib/shop.db"),
            (ENV_LOG_LEVEL, " "),
            (ENV_LOG_DIR, "/var/log/shop"),
        ]);
        let mut config = CoreConfig::default();
        config.apply_env(|key| vars.get(key).map(|value| value.to_string()));

        assert_eq!(config.db_path, PathBuf::from("/var/lib/shop.db"));
        assert_eq!(config.log_level, CoreConfig::default().log_level);
        assert_eq!(config.log_dir, Some(PathBuf::from("/var/log/shop")));
        config.validate().unwrap();
    }
}
