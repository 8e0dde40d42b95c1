//! Typed configuration from environment variables.
//!
//! Loads once at startup. Every variable has a default; a value that is
//! present but unparseable fails fast.

use crate::error::{Error, Result};
use crate::runner::DEFAULT_DEADLINE;
use crate::server::DEFAULT_UPLOAD_BODY_LIMIT;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub upload_dir: PathBuf,
    /// How long an upload request waits for its save before answering.
    pub upload_deadline: Duration,
    /// Artificial delay before each save. Zero disables it.
    pub upload_save_delay: Duration,
    pub upload_body_limit: usize,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8081)),
            upload_dir: PathBuf::from("./Uploads"),
            upload_deadline: DEFAULT_DEADLINE,
            upload_save_delay: Duration::ZERO,
            upload_body_limit: DEFAULT_UPLOAD_BODY_LIMIT,
            otel_endpoint: None,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            bind_addr: parsed_var("BIND_ADDR")?.unwrap_or(defaults.bind_addr),
            upload_dir: std::env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            upload_deadline: parsed_var("UPLOAD_DEADLINE_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.upload_deadline),
            upload_save_delay: parsed_var("UPLOAD_SAVE_DELAY_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.upload_save_delay),
            upload_body_limit: parsed_var("UPLOAD_BODY_LIMIT_BYTES")?
                .unwrap_or(defaults.upload_body_limit),
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
        })
    }
}

fn parsed_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("environment variable {name}={raw:?}: {e}"))),
        Err(_) => Ok(None),
    }
}
