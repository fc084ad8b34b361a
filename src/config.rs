/// Server configuration
///
/// Built by the binary from command line flags and environment variables,
/// then validated once before the server starts.

use std::time::Duration;

use reqwest::Url;
use thiserror::Error;

use crate::mcp::codec::{DEFAULT_MAX_FRAME_SIZE, FRAME_SIZE_CEILING};

/// Errors in user-supplied configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Server name cannot be empty")]
    EmptyName,

    #[error("Request timeout must be greater than zero")]
    ZeroTimeout,

    #[error("Maximum frame size must be greater than zero")]
    ZeroFrameSize,

    #[error("Maximum frame size must not exceed {limit} bytes")]
    FrameSizeTooLarge { limit: usize },

    #[error("Maximum number of in-flight requests must be greater than zero")]
    ZeroInFlight,

    #[error("Invalid weather API base URL: {0}")]
    InvalidBaseUrl(String),
}

/// Settings for the request/response engine
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Name reported in `initialize`
    pub name: String,
    /// Version reported in `initialize`
    pub version: String,
    /// Upper bound for a single tool call
    pub request_timeout: Duration,
    /// Largest accepted payload in bytes
    pub max_frame_size: usize,
    /// Tool calls allowed to run at once on one connection
    pub max_in_flight: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            request_timeout: Duration::from_secs(30),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            max_in_flight: 16,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.max_frame_size == 0 {
            return Err(ConfigError::ZeroFrameSize);
        }
        if self.max_frame_size > FRAME_SIZE_CEILING {
            return Err(ConfigError::FrameSizeTooLarge {
                limit: FRAME_SIZE_CEILING,
            });
        }
        if self.max_in_flight == 0 {
            return Err(ConfigError::ZeroInFlight);
        }
        Ok(())
    }
}

/// Parse a weather API base URL
///
/// Only absolute http(s) URLs with a host are accepted. The returned path
/// always ends with `/` so relative endpoints join below it.
pub fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidBaseUrl(format!("{} ({})", raw.trim(), reason));

    let mut url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
