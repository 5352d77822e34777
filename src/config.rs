//! Configuration module for the chat service.

use serde::Deserialize;
use std::path::Path;

use crate::{ChatError, Result};

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allowed CORS origins (empty = permissive development mode).
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
    /// Maximum pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> String {
    "data/mentorlink.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Chat behaviour limits.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    /// Maximum message body length in characters (after trimming).
    #[serde(default = "default_max_body_length")]
    pub max_body_length: usize,
    /// Page size used when a history request has no limit.
    #[serde(default = "default_history_limit")]
    pub default_history_limit: u32,
    /// Upper bound on a single history page.
    #[serde(default = "default_max_history_limit")]
    pub max_history_limit: u32,
    /// Pushes buffered per connection before live delivery is dropped.
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,
}

fn default_max_body_length() -> usize {
    2000
}

fn default_history_limit() -> u32 {
    50
}

fn default_max_history_limit() -> u32 {
    200
}

fn default_outbound_buffer() -> usize {
    256
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_body_length: default_max_body_length(),
            default_history_limit: default_history_limit(),
            max_history_limit: default_max_history_limit(),
            outbound_buffer: default_outbound_buffer(),
        }
    }
}

/// Bearer token configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HS256 secret shared with the platform's login service.
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    /// Clock skew tolerated when checking `exp`, in seconds.
    #[serde(default = "default_token_leeway")]
    pub token_leeway_secs: u64,
}

fn default_jwt_secret() -> String {
    "change-me-in-production".to_string()
}

fn default_token_leeway() -> u64 {
    30
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            token_leeway_secs: default_token_leeway(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/mentorlink.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// HTTP / WebSocket listener.
    #[serde(default)]
    pub server: ServerConfig,
    /// Storage.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Chat limits.
    #[serde(default)]
    pub chat: ChatConfig,
    /// Token verification.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Logging.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| ChatError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        if self.auth.jwt_secret.is_empty() {
            return Err(ChatError::Config("auth.jwt_secret must not be empty".into()));
        }
        if self.chat.max_body_length == 0 {
            return Err(ChatError::Config(
                "chat.max_body_length must be greater than 0".into(),
            ));
        }
        if self.chat.max_history_limit == 0
            || self.chat.default_history_limit > self.chat.max_history_limit
        {
            return Err(ChatError::Config(
                "chat.default_history_limit must be between 1 and chat.max_history_limit".into(),
            ));
        }
        if self.chat.outbound_buffer == 0 {
            return Err(ChatError::Config(
                "chat.outbound_buffer must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}
