//! Configuration management for RAX Room Server
//!
//! Values come from built-in defaults, then an optional `config.toml`,
//! then `RAX_ROOM__*` environment variables.

use config::{Config, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::auth::credentials::default_credentials;

const CONFIG_BASENAME: &str = "config";
const ENV_PREFIX: &str = "RAX_ROOM";

/// Complete server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// IP address the listener binds to
    pub bind_address: String,

    /// TCP port for client sessions; 0 picks an ephemeral port
    pub port: u16,

    /// Directory backing the shared server-side file store
    pub server_root: String,

    /// Longest accepted command line, in bytes, excluding the newline
    pub max_command_length: usize,

    /// Chunk size used while streaming raw upload/download bodies
    pub buffer_size: usize,

    /// Largest upload the server will accept, in MB
    pub max_upload_size_mb: u64,

    /// Username to password table consulted on LOGIN
    #[serde(default = "default_credentials")]
    pub credentials: HashMap<String, String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 12345,
            server_root: "./server_files".to_string(),
            max_command_length: 8192,
            buffer_size: 8192,
            max_upload_size_mb: 100,
            credentials: default_credentials(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from config.toml with environment overrides
    pub fn load() -> Result<Self, config::ConfigError> {
        let defaults = Self::default();

        let settings = Config::builder()
            .set_default("bind_address", defaults.bind_address)?
            .set_default("port", i64::from(defaults.port))?
            .set_default("server_root", defaults.server_root)?
            .set_default("max_command_length", defaults.max_command_length as i64)?
            .set_default("buffer_size", defaults.buffer_size as i64)?
            .set_default("max_upload_size_mb", defaults.max_upload_size_mb as i64)?
            .add_source(File::with_name(CONFIG_BASENAME).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        let config: ServerConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validation for all configuration values
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.server_root.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "server_root cannot be empty".into(),
            ));
        }

        if self.max_command_length == 0 {
            return Err(config::ConfigError::Message(
                "max_command_length must be greater than 0".into(),
            ));
        }

        if self.buffer_size == 0 {
            return Err(config::ConfigError::Message(
                "buffer_size must be greater than 0".into(),
            ));
        }

        if self.max_upload_size_mb == 0 {
            return Err(config::ConfigError::Message(
                "max_upload_size_mb must be greater than 0".into(),
            ));
        }

        if self.credentials.is_empty() {
            return Err(config::ConfigError::Message(
                "at least one credential must be configured".into(),
            ));
        }

        Ok(())
    }

    /// Get bind address and port as a socket address string
    pub fn listen_socket(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    /// Get server root as PathBuf
    pub fn server_root_path(&self) -> PathBuf {
        PathBuf::from(&self.server_root)
    }

    /// Get maximum upload size in bytes
    pub fn max_upload_size_bytes(&self) -> u64 {
        self.max_upload_size_mb * 1024 * 1024
    }
}
