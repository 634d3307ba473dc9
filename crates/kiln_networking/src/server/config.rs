//! Server configuration.

use std::net::{IpAddr, Ipv4Addr};

use serde::Deserialize;

use crate::config::{require_nonzero, ConfigError, ConfigResult};
use crate::{DEFAULT_BUFFER_SIZE, DEFAULT_MAX_CLIENTS, DEFAULT_PORT};

/// Server configuration.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Local address to bind.
    pub bind_address: IpAddr,
    /// Port to listen on; 0 lets the OS choose.
    pub port: u16,
    /// Maximum concurrently connected peers.
    pub max_clients: usize,
    /// Listen backlog.
    pub backlog: i32,
    /// Per-peer outbound buffer capacity in bytes.
    pub send_buffer_size: usize,
    /// Per-peer inbound buffer capacity in bytes.
    pub recv_buffer_size: usize,
    /// Set `SO_REUSEADDR` on the listener.
    pub reuse_address: bool,
    /// Disable Nagle's algorithm on accepted connections.
    pub nodelay: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            max_clients: DEFAULT_MAX_CLIENTS,
            backlog: 128,
            send_buffer_size: DEFAULT_BUFFER_SIZE,
            recv_buffer_size: DEFAULT_BUFFER_SIZE,
            reuse_address: true,
            nodelay: true,
        }
    }
}

impl ServerConfig {
    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] for a zero buffer size or peer cap, or a
    /// non-positive backlog.
    pub fn validate(&self) -> ConfigResult<()> {
        require_nonzero("server.max_clients", self.max_clients)?;
        require_nonzero("server.send_buffer_size", self.send_buffer_size)?;
        require_nonzero("server.recv_buffer_size", self.recv_buffer_size)?;
        if self.backlog <= 0 {
            return Err(ConfigError::Invalid(format!(
                "server.backlog must be positive, got {}",
                self.backlog
            )));
        }
        Ok(())
    }
}
