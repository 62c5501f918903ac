//! # Database Configuration
//!
//! The two settings a connection provider needs: which driver to use and
//! how to reach the database.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     KEEL_DB_PROVIDER=sqlite                                            │
//! │     KEEL_DB_CONNECTION_STRING=sqlite://./keel.db?mode=rwc              │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     passed explicitly to DbConfig::load                                │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     sqlite, in-memory database                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # keel.toml
//! provider_name = "sqlite"
//! connection_string = "sqlite://./keel.db?mode=rwc"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};

// =============================================================================
// Provider
// =============================================================================

/// Supported database drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// SQLite through sqlx.
    Sqlite,
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl std::str::FromStr for Provider {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(Provider::Sqlite),
            other => Err(DbError::UnsupportedProvider(other.to_string())),
        }
    }
}

// =============================================================================
// DbConfig
// =============================================================================

/// Connection settings.
///
/// ## Example
/// ```rust
/// use keel_db::DbConfig;
///
/// let config = DbConfig::sqlite("sqlite://./keel.db?mode=rwc");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DbConfig {
    /// Driver identifier, e.g. `sqlite`.
    pub provider_name: String,

    /// Driver-specific connection string.
    pub connection_string: String,
}

const ENV_PROVIDER: &str = "KEEL_DB_PROVIDER";
const ENV_CONNECTION_STRING: &str = "KEEL_DB_CONNECTION_STRING";

impl DbConfig {
    /// Creates a configuration from its two settings.
    pub fn new(provider_name: impl Into<String>, connection_string: impl Into<String>) -> Self {
        DbConfig {
            provider_name: provider_name.into(),
            connection_string: connection_string.into(),
        }
    }

    /// Creates a SQLite configuration.
    pub fn sqlite(connection_string: impl Into<String>) -> Self {
        Self::new(Provider::Sqlite.to_string(), connection_string)
    }

    /// Creates an in-memory SQLite configuration (for testing).
    ///
    /// Every connection opened from it is a separate, empty database.
    pub fn in_memory() -> Self {
        Self::sqlite("sqlite::memory:")
    }

    /// Parses a configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> DbResult<Self> {
        let config: DbConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (if it exists)
    /// 3. Environment variables
    pub fn load(config_path: Option<&Path>) -> DbResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path {
            if path.exists() {
                info!(?path, "Loading database config from file");
                let contents = std::fs::read_to_string(path).map_err(|e| {
                    DbError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
                })?;
                config = Self::from_toml_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> DbResult<()> {
        if self.provider_name.trim().is_empty() {
            return Err(DbError::InvalidConfig("provider_name must not be empty".into()));
        }

        if self.connection_string.trim().is_empty() {
            return Err(DbError::InvalidConfig(
                "connection_string must not be empty".into(),
            ));
        }

        self.provider()?;
        Ok(())
    }

    /// Returns the parsed provider.
    pub fn provider(&self) -> DbResult<Provider> {
        self.provider_name.parse()
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(provider) = std::env::var(ENV_PROVIDER) {
            debug!(provider = %provider, "Overriding provider from environment");
            self.provider_name = provider;
        }

        if let Ok(connection_string) = std::env::var(ENV_CONNECTION_STRING) {
            debug!("Overriding connection string from environment");
            self.connection_string = connection_string;
        }
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        DbConfig::in_memory()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parsing() {
        assert_eq!("sqlite".parse::<Provider>().unwrap(), Provider::Sqlite);
        assert_eq!("SQLite3".parse::<Provider>().unwrap(), Provider::Sqlite);
        assert!(matches!(
            "oracle".parse::<Provider>(),
            Err(DbError::UnsupportedProvider(_))
        ));
    }

    #[test]
    fn test_default_config_is_in_memory_sqlite() {
        let config = DbConfig::default();
        assert_eq!(config.provider().unwrap(), Provider::Sqlite);
        assert_eq!(config.connection_string, "sqlite::memory:");
    }

    #[test]
    fn test_config_validation() {
        assert!(DbConfig::sqlite("sqlite::memory:").validate().is_ok());
        assert!(DbConfig::sqlite("  ").validate().is_err());
        assert!(DbConfig::new("", "sqlite::memory:").validate().is_err());
        assert!(matches!(
            DbConfig::new("mysql", "mysql://localhost").validate(),
            Err(DbError::UnsupportedProvider(_))
        ));
    }

    #[test]
    fn test_toml_parsing() {
        let config = DbConfig::from_toml_str(
            r#"
            provider_name = "sqlite"
            connection_string = "sqlite://./keel.db?mode=rwc"
            "#,
        )
        .unwrap();

        assert_eq!(config, DbConfig::sqlite("sqlite://./keel.db?mode=rwc"));
    }

    #[test]
    fn test_toml_rejects_unknown_fields() {
        let result = DbConfig::from_toml_str(
            r#"
            provider_name = "sqlite"
            connection_string = "sqlite::memory:"
            pool_size = 4
            "#,
        );

        assert!(matches!(result, Err(DbError::InvalidConfig(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keel.toml");
        std::fs::write(
            &path,
            "provider_name = \"sqlite\"\nconnection_string = \"sqlite://./file.db\"\n",
        )
        .unwrap();

        let config = DbConfig::load(Some(&path)).unwrap();
        assert_eq!(config.provider().unwrap(), Provider::Sqlite);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = DbConfig::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.provider().unwrap(), Provider::Sqlite);
    }

    #[test]
    fn test_load_unreadable_file_is_config_error() {
        // A directory exists but cannot be read as a file
        let dir = tempfile::tempdir().unwrap();

        match DbConfig::load(Some(dir.path())) {
            Err(DbError::InvalidConfig(message)) => assert!(message.contains("cannot read")),
            other => panic!("expected InvalidConfig, got {:?}", other),
        }
    }
}
