//! API server configuration.
//!
//! Configuration is loaded from environment variables with fallback to defaults.

use serde::{Deserialize, Serialize};
use std::env;
use std::net::SocketAddr;

use campus_db::DbConfig;

/// API server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Interface to listen on
    pub bind_addr: String,

    /// HTTP port
    pub port: u16,

    /// SQLite database file
    pub database_path: String,

    /// Pool size
    pub db_max_connections: u32,

    /// Apply pending migrations on startup
    pub run_migrations: bool,
}

impl ApiConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let config = ApiConfig {
            bind_addr: lookup("CAMPUS_BIND_ADDR").unwrap_or_else(|| "0.0.0.0".to_string()),

            port: lookup("CAMPUS_PORT")
                .unwrap_or_else(|| "8080".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("CAMPUS_PORT".to_string()))?,

            database_path: lookup("CAMPUS_DATABASE_PATH")
                .unwrap_or_else(|| "./campus.db".to_string()),

            db_max_connections: lookup("CAMPUS_DB_MAX_CONNECTIONS")
                .unwrap_or_else(|| "5".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("CAMPUS_DB_MAX_CONNECTIONS".to_string()))?,

            run_migrations: lookup("CAMPUS_RUN_MIGRATIONS")
                .unwrap_or_else(|| "true".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("CAMPUS_RUN_MIGRATIONS".to_string()))?,
        };

        if config.database_path.trim().is_empty() {
            return Err(ConfigError::MissingRequired("CAMPUS_DATABASE_PATH".to_string()));
        }
        if config.db_max_connections == 0 {
            return Err(ConfigError::InvalidValue("CAMPUS_DB_MAX_CONNECTIONS".to_string()));
        }

        Ok(config)
    }

    /// Socket address the server binds to.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_addr, self.port)
            .parse()
            .map_err(|_| ConfigError::InvalidValue("CAMPUS_BIND_ADDR".to_string()))
    }

    /// Database settings derived from this configuration.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database_path)
            .max_connections(self.db_max_connections)
            .run_migrations(self.run_migrations)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}
