//! Configuration module for the homestay backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Raised when an environment variable is present but unusable.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key for API authentication (required in production)
    pub api_psk: Option<String>,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Directory uploaded evidence and documents are written to
    pub upload_dir: PathBuf,
    /// URL prefix under which uploaded files are served
    pub public_url: String,
    /// Largest accepted upload in bytes
    pub max_upload_bytes: usize,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let api_psk = env::var("HOMESTAY_API_PSK").ok();

        let db_path = env::var("HOMESTAY_DB_PATH")
            .unwrap_or_else(|_| "./data/homestay.sqlite".to_string())
            .into();

        let bind_addr = env::var("HOMESTAY_BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let bind_addr = bind_addr.parse().map_err(|_| ConfigError::Invalid {
            name: "HOMESTAY_BIND_ADDR",
            value: bind_addr.clone(),
        })?;

        let log_level = env::var("HOMESTAY_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let upload_dir = env::var("HOMESTAY_UPLOAD_DIR")
            .unwrap_or_else(|_| "./data/uploads".to_string())
            .into();

        let public_url = env::var("HOMESTAY_PUBLIC_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8080/uploads".to_string())
            .trim_end_matches('/')
            .to_string();

        let max_upload_bytes = match env::var("HOMESTAY_MAX_UPLOAD_BYTES") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                name: "HOMESTAY_MAX_UPLOAD_BYTES",
                value: raw.clone(),
            })?,
            Err(_) => 5 * 1024 * 1024,
        };

        Ok(Self {
            api_psk,
            db_path,
            bind_addr,
            log_level,
            upload_dir,
            public_url,
            max_upload_bytes,
        })
    }
}
