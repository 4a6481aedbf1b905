//! Application configuration
//!
//! Centralized configuration management with environment variable support
//! and sensible defaults.

use std::env;
use thiserror::Error;

/// Default public endpoint of the completions API.
pub const DEFAULT_BASE_URL: &str = "https://api.deepseek.com";
/// Default model identifier sent with every completion request.
pub const DEFAULT_MODEL: &str = "deepseek-chat";

/// Errors raised while loading configuration from the environment
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The upstream API key is not set; the server cannot start without it
    #[error("DEEPSEEK_API_KEY environment variable is required")]
    MissingApiKey,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Upstream completions API configuration
    pub upstream: UpstreamConfig,
    /// Upload storage configuration
    pub uploads: UploadsConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind the server to
    pub port: u16,
    /// Host address to bind to
    pub host: String,
}

/// Upstream completions API configuration
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Bearer token sent with every request
    pub api_key: String,
    /// Base URL of the API, without the chat-completions path
    pub base_url: String,
    /// Model identifier sent with every request
    pub model: String,
}

/// Upload storage configuration
#[derive(Debug, Clone)]
pub struct UploadsConfig {
    /// Directory client uploads are written to
    pub dir: String,
}

impl Config {
    /// Load configuration from environment variables with defaults.
    ///
    /// Fails only when `DEEPSEEK_API_KEY` is absent; every other option
    /// falls back to a default.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = env::var("DEEPSEEK_API_KEY")
            .ok()
            .filter(|key| !key.is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        Ok(Self {
            server: ServerConfig {
                port: env::var("PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(9000),
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            },
            upstream: UpstreamConfig {
                api_key,
                base_url: env::var("DEEPSEEK_BASE_URL")
                    .ok()
                    .filter(|url| !url.is_empty())
                    .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
                model: env::var("DEEPSEEK_MODEL")
                    .ok()
                    .filter(|model| !model.is_empty())
                    .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            },
            uploads: UploadsConfig {
                dir: env::var("UPLOADS_DIR").unwrap_or_else(|_| "uploads".to_string()),
            },
        })
    }

    /// Get the server address as a string
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
