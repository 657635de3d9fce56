//! Server configuration types
//!
//! Defines the configuration structures for the relay. Every section is
//! optional; a missing file or section means defaults.

use crate::error::RelayError;
use crate::socks::{DEFAULT_BUFFER_SIZE, MAX_BUFFER_SIZE};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Default listen address (all interfaces)
fn default_listen_addr() -> String {
    "0.0.0.0".to_string()
}

/// Default listening port
fn default_port() -> u16 {
    1080
}

/// Root configuration structure
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Listener configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// SOCKS5 negotiation and relay configuration
    #[serde(default)]
    pub socks: SocksConfig,

    /// Socket options for outbound connections
    #[serde(default)]
    pub tcp: TcpConfig,
}

impl Config {
    /// Validate every section
    pub fn validate(&self) -> Result<(), RelayError> {
        self.server.validate()?;
        self.socks.validate()?;
        Ok(())
    }
}

/// Listener configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    /// IP address to bind
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Port to bind
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            listen_addr: default_listen_addr(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// Socket address the listener binds to
    pub fn bind_addr(&self) -> Result<SocketAddr, RelayError> {
        let ip: IpAddr = self.listen_addr.parse().map_err(|_| {
            RelayError::Config(format!("Invalid listen address: {}", self.listen_addr))
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), RelayError> {
        self.bind_addr().map(|_| ())
    }
}

/// Default connect timeout in seconds
fn default_connect_timeout() -> u64 {
    10
}

/// Default relay idle timeout in seconds
fn default_idle_timeout() -> u64 {
    300
}

/// Default bound on greeting plus request, in seconds
fn default_handshake_timeout() -> u64 {
    30
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

fn default_reply_on_resolve_failure() -> bool {
    true
}

/// SOCKS5 negotiation and relay configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SocksConfig {
    /// Outbound connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Relay idle timeout in seconds; 0 disables it
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Time allowed for the whole negotiation in seconds; 0 disables it
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_secs: u64,

    /// Per-direction relay buffer size in bytes
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Send a failure reply when a domain name cannot be resolved
    /// (otherwise the connection is closed without a reply)
    #[serde(default = "default_reply_on_resolve_failure")]
    pub reply_on_resolve_failure: bool,
}

impl Default for SocksConfig {
    fn default() -> Self {
        SocksConfig {
            connect_timeout_secs: default_connect_timeout(),
            idle_timeout_secs: default_idle_timeout(),
            handshake_timeout_secs: default_handshake_timeout(),
            buffer_size: default_buffer_size(),
            reply_on_resolve_failure: default_reply_on_resolve_failure(),
        }
    }
}

impl SocksConfig {
    /// Outbound connect timeout
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Relay idle timeout, `None` when disabled
    pub fn idle_timeout(&self) -> Option<Duration> {
        match self.idle_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Negotiation timeout, `None` when disabled
    pub fn handshake_timeout(&self) -> Option<Duration> {
        (self.handshake_timeout_secs > 0).then(|| Duration::from_secs(self.handshake_timeout_secs))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.buffer_size == 0 || self.buffer_size > MAX_BUFFER_SIZE {
            return Err(RelayError::Config(format!(
                "Invalid buffer size: {}. Must be between 1 and {}",
                self.buffer_size, MAX_BUFFER_SIZE
            )));
        }
        if self.connect_timeout_secs == 0 {
            return Err(RelayError::Config(
                "connect_timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Default keepalive seconds
fn default_keepalive_secs() -> u64 {
    20
}

/// Default keepalive interval
fn default_keepalive_interval() -> u64 {
    8
}

fn default_nodelay() -> bool {
    true
}

/// TCP options for outbound connections
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TcpConfig {
    /// Enable TCP_NODELAY
    #[serde(default = "default_nodelay")]
    pub nodelay: bool,

    /// TCP keepalive timeout in seconds; 0 disables keepalive
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,

    /// TCP keepalive interval in seconds
    #[serde(default = "default_keepalive_interval")]
    pub keepalive_interval: u64,
}

impl Default for TcpConfig {
    fn default() -> Self {
        TcpConfig {
            nodelay: default_nodelay(),
            keepalive_secs: default_keepalive_secs(),
            keepalive_interval: default_keepalive_interval(),
        }
    }
}
