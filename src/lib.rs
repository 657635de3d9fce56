//! # Socksrelay - SOCKS5 CONNECT relay
//!
//! Socksrelay is a small SOCKS5 proxy server. It accepts TCP clients, runs
//! the RFC 1928 negotiation with the "no authentication" method, opens the
//! requested outbound TCP connection and relays bytes in both directions
//! until both sides have closed.
//!
//! ## Features
//!
//! - **CONNECT only**: BIND and UDP ASSOCIATE are answered with
//!   "command not supported"
//! - **IPv4, IPv6 and domain targets**: domain names are resolved through a
//!   pluggable [`socks::Resolve`] implementation
//! - **Half-close aware relay**: each direction shuts down its destination
//!   independently
//! - **Timeouts**: handshake, outbound connect and relay idle bounds
//!
//! ## Usage
//!
//! ```rust,ignore
//! use socksrelay::config::load_config;
//! use socksrelay::server::run_server;
//! use tokio::sync::broadcast;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config("socksrelay.toml")?;
//!     let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
//!
//!     run_server(config, shutdown_rx).await
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! SOCKS5 Client -> Socksrelay -> Target
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod helper;
pub mod server;
pub mod socks;

// Re-export commonly used items
pub use config::{load_config, Config};
pub use error::{RelayError, Socks5Error, Socks5ReplyCode};
pub use server::{run_server, Server};

/// Version of the Socksrelay library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the application
pub const NAME: &str = env!("CARGO_PKG_NAME");
