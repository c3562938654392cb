//! Server configuration module.
//!
//! Configuration is layered: built-in defaults, then an optional TOML file
//! named by `STOCKBOOK_CONFIG`, then environment variables.
//!
//! ```text
//! defaults ──► stockbook.toml ──► env vars ──► ServerConfig
//! ```
//!
//! ## Environment Variables
//! | Variable                    | Field                      |
//! |-----------------------------|----------------------------|
//! | `STOCKBOOK_BIND`            | `bind_address`             |
//! | `STOCKBOOK_PORT`            | `port`                     |
//! | `STOCKBOOK_DB_PATH`         | `database_path`            |
//! | `JWT_SECRET`                | `jwt_secret`               |
//! | `JWT_ACCESS_LIFETIME_SECS`  | `jwt_access_lifetime_secs` |
//! | `STOCKBOOK_ADMIN_EMAIL`     | `admin_email`              |
//! | `STOCKBOOK_ADMIN_PASSWORD`  | `admin_password`           |

use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

/// Used only when `JWT_SECRET` is not set. Never use it in production.
const DEV_JWT_SECRET: &str = "stockbook-dev-secret-change-in-production";

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to listen on
    pub bind_address: String,

    /// HTTP port
    pub port: u16,

    /// SQLite database file
    pub database_path: PathBuf,

    /// Maximum pooled SQLite connections
    pub max_connections: u32,

    /// JWT secret key for signing tokens
    pub jwt_secret: String,

    /// JWT access token lifetime in seconds
    pub jwt_access_lifetime_secs: i64,

    /// Admin account created on first start when no users exist
    pub admin_email: Option<String>,

    /// Password for the bootstrap admin
    pub admin_password: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
            database_path: default_database_path(),
            max_connections: 5,
            jwt_secret: DEV_JWT_SECRET.to_string(),
            jwt_access_lifetime_secs: 8 * 3600,
            admin_email: None,
            admin_password: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from file and environment.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match env::var("STOCKBOOK_CONFIG") {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => ServerConfig::default(),
        };

        config.apply_env(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a TOML file. Missing keys keep their defaults.
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Overrides fields from environment-style lookups.
    ///
    /// Takes a lookup function so tests need not touch the process env.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup("STOCKBOOK_BIND") {
            self.bind_address = bind;
        }
        if let Some(port) = lookup("STOCKBOOK_PORT") {
            self.port = port
                .parse()
                .map_err(|_| ConfigError::InvalidValue("STOCKBOOK_PORT".to_string()))?;
        }
        if let Some(path) = lookup("STOCKBOOK_DB_PATH") {
            self.database_path = PathBuf::from(path);
        }
        if let Some(secret) = lookup("JWT_SECRET") {
            self.jwt_secret = secret;
        }
        if let Some(lifetime) = lookup("JWT_ACCESS_LIFETIME_SECS") {
            self.jwt_access_lifetime_secs = lifetime
                .parse()
                .map_err(|_| ConfigError::InvalidValue("JWT_ACCESS_LIFETIME_SECS".to_string()))?;
        }
        if let Some(email) = lookup("STOCKBOOK_ADMIN_EMAIL") {
            self.admin_email = Some(email);
        }
        if let Some(password) = lookup("STOCKBOOK_ADMIN_PASSWORD") {
            self.admin_password = Some(password);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.trim().is_empty() {
            return Err(ConfigError::MissingRequired("JWT_SECRET".to_string()));
        }
        if self.jwt_access_lifetime_secs <= 0 {
            return Err(ConfigError::InvalidValue("JWT_ACCESS_LIFETIME_SECS".to_string()));
        }
        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue("max_connections".to_string()));
        }
        if self.admin_email.is_some() != self.admin_password.is_some() {
            return Err(ConfigError::IncompleteAdmin);
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_address, self.port)
            .parse()
            .map_err(|_| ConfigError::InvalidValue("STOCKBOOK_BIND".to_string()))
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }
}

/// `<data dir>/stockbook.db`, or `./stockbook.db` when the platform has no
/// data directory.
fn default_database_path() -> PathBuf {
    ProjectDirs::from("com", "stockbook", "Stockbook")
        .map(|dirs| dirs.data_dir().join("stockbook.db"))
        .unwrap_or_else(|| PathBuf::from("stockbook.db"))
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("STOCKBOOK_ADMIN_EMAIL and STOCKBOOK_ADMIN_PASSWORD must be set together")]
    IncompleteAdmin,

    #[error("Cannot read config file {path}: {message}")]
    Io { path: String, message: String },

    #[error("Invalid config file: {0}")]
    Parse(String),
}
