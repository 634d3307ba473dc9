//! Client configuration.

use serde::Deserialize;

use crate::config::{require_nonzero, ConfigResult};
use crate::DEFAULT_BUFFER_SIZE;

/// Client configuration.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Outbound buffer capacity in bytes.
    pub send_buffer_size: usize,
    /// Inbound buffer capacity in bytes.
    pub recv_buffer_size: usize,
    /// Disable Nagle's algorithm on the connection.
    pub nodelay: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            send_buffer_size: DEFAULT_BUFFER_SIZE,
            recv_buffer_size: DEFAULT_BUFFER_SIZE,
            nodelay: true,
        }
    }
}

impl ClientConfig {
    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`](crate::ConfigError::Invalid) for a zero buffer size.
    pub fn validate(&self) -> ConfigResult<()> {
        require_nonzero("client.send_buffer_size", self.send_buffer_size)?;
        require_nonzero("client.recv_buffer_size", self.recv_buffer_size)
    }
}
