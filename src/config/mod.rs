//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// SQLite database location (sqlx connection URL)
    pub database_url: String,

    /// HMAC key for session token signing
    pub session_secret: String,
    /// Session token lifetime in seconds
    pub session_ttl_secs: u64,

    /// Bootstrap admin username, seeded on first startup
    pub admin_username: String,
    /// Bootstrap admin password, seeded on first startup
    pub admin_password: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Render provides PORT env var, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let session_ttl_secs = match env::var("SESSION_TTL_SECS") {
            Ok(v) => v.parse().map_err(|_| ConfigError::InvalidTtl)?,
            Err(_) => 86400,
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:invex.db".to_string()),

            session_secret: env::var("SESSION_SECRET")
                .map_err(|_| ConfigError::Missing("SESSION_SECRET"))?,
            session_ttl_secs,

            admin_username: env::var("ADMIN_USERNAME").unwrap_or_else(|_| "admin".to_string()),
            admin_password: env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "1234".to_string()),
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("SESSION_TTL_SECS must be an integer number of seconds")]
    InvalidTtl,
}
