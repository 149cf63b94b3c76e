//! Environment-driven startup configuration.
//!
//! No config file and no CLI-flag layer: this is meant to run as a
//! container/service process configured entirely by its environment.

use crate::support::errors::InfraError;

const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub bridge_url: Option<String>,
    pub bridge_secret: Option<String>,
    pub log_format: LogFormat,
    pub log_level: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// Fails fast on a malformed `PORT` — the process has no useful state
    /// yet, so "log and continue" is the wrong call here.
    pub fn from_env() -> Result<Self, InfraError> {
        let port = match std::env::var("PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .map_err(|_| InfraError::Config(format!("PORT must be a valid port number, got {raw:?}")))?,
            Err(_) => DEFAULT_PORT,
        };

        let bridge_url = std::env::var("BRIDGE_URL").ok().filter(|s| !s.is_empty());
        let bridge_secret = std::env::var("BRIDGE_SECRET").ok().filter(|s| !s.is_empty());

        let log_format = match std::env::var("LOG_FORMAT").ok().as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            port,
            bridge_url,
            bridge_secret,
            log_format,
            log_level,
        })
    }

    pub fn address(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}
