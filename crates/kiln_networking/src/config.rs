//! # Configuration
//!
//! TOML loading for [`ClientConfig`] and [`ServerConfig`].
//!
//! Every field has a default, so a file only lists what it overrides:
//!
//! ```toml
//! [server]
//! port = 9000
//! max_clients = 8
//!
//! [client]
//! nodelay = false
//! ```

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

use crate::client::ClientConfig;
use crate::server::ServerConfig;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid TOML for the expected shape.
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Client and server sections of one configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NetConfig {
    /// `[client]` section.
    pub client: ClientConfig,
    /// `[server]` section.
    pub server: ServerConfig,
}

impl NetConfig {
    /// Loads and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`].
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let config: Self = load_toml(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates both sections.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] naming the first bad value.
    pub fn validate(&self) -> ConfigResult<()> {
        self.client.validate()?;
        self.server.validate()
    }
}

/// Reads `path` and parses it as `T`.
///
/// # Errors
///
/// [`ConfigError::Io`] or [`ConfigError::Parse`].
pub fn load_toml<T: DeserializeOwned>(path: impl AsRef<Path>) -> ConfigResult<T> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    tracing::debug!("Loaded configuration from {}", path.display());
    parse_toml(&text)
}

/// Parses `text` as `T`.
///
/// # Errors
///
/// [`ConfigError::Parse`].
pub fn parse_toml<T: DeserializeOwned>(text: &str) -> ConfigResult<T> {
    Ok(toml::from_str(text)?)
}

/// Fails with [`ConfigError::Invalid`] when `value` is zero.
pub(crate) fn require_nonzero(name: &str, value: usize) -> ConfigResult<()> {
    if value == 0 {
        return Err(ConfigError::Invalid(format!("{name} must be greater than zero")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    #[test]
    fn test_empty_file_is_all_defaults() {
        let config: NetConfig = parse_toml("").unwrap();
        assert_eq!(config.server.port, crate::DEFAULT_PORT);
        assert_eq!(config.server.max_clients, crate::DEFAULT_MAX_CLIENTS);
        assert_eq!(config.client.recv_buffer_size, crate::DEFAULT_BUFFER_SIZE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_override() {
        let text = r#"
            [server]
            bind_address = "127.0.0.1"
            port = 9000
            max_clients = 8

            [client]
            nodelay = false
        "#;
        let config: NetConfig = parse_toml(text).unwrap();

        assert_eq!(config.server.bind_address, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.max_clients, 8);
        assert_eq!(config.server.backlog, ServerConfig::default().backlog);
        assert!(!config.client.nodelay);
    }

    #[test]
    fn test_section_alone() {
        let server: ServerConfig = parse_toml("port = 1234").unwrap();
        assert_eq!(server.port, 1234);
    }

    #[test]
    fn test_parse_error() {
        let result: ConfigResult<NetConfig> = parse_toml("[server]\nport = \"high\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut config = NetConfig::default();
        config.server.max_clients = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = NetConfig::default();
        config.client.send_buffer_size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = NetConfig::default();
        config.server.backlog = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let result = NetConfig::load("/nonexistent/kiln.toml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
