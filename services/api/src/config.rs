//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub cors_origin: String,
    pub es_url: String,
    pub es_index: String,
    pub embedding_url: String,
    pub reindex_batch_size: usize,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Database Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let cors_origin = std::env::var("CORS_ORIGIN")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());

        // --- Load Search and Embedding Settings ---
        let es_url = std::env::var("ES_URL")
            .unwrap_or_else(|_| "http://localhost:9200".to_string())
            .trim_end_matches('/')
            .to_string();
        let es_index = std::env::var("ES_INDEX").unwrap_or_else(|_| "zeeguu".to_string());
        let embedding_url = std::env::var("EMBEDDING_URL")
            .unwrap_or_else(|_| "http://localhost:3654".to_string())
            .trim_end_matches('/')
            .to_string();

        let batch_str =
            std::env::var("REINDEX_BATCH_SIZE").unwrap_or_else(|_| "100".to_string());
        let reindex_batch_size = match batch_str.parse::<usize>() {
            Ok(n) if n > 0 => n,
            _ => {
                return Err(ConfigError::InvalidValue(
                    "REINDEX_BATCH_SIZE".to_string(),
                    format!("'{}' is not a positive integer", batch_str),
                ))
            }
        };

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            cors_origin,
            es_url,
            es_index,
            embedding_url,
            reindex_batch_size,
        })
    }
}
