//! Test utilities and mocks for Socksrelay
//!
//! This module provides common test utilities used across integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use socksrelay::config::Config;
use socksrelay::server::Server;
use socksrelay::socks::{Resolve, SessionContext};
use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Create a test TCP listener on an available port
pub async fn create_test_listener() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

/// An address nothing listens on
pub async fn closed_addr() -> SocketAddr {
    let (listener, addr) = create_test_listener().await;
    drop(listener);
    addr
}

/// Spawn an echo server that serves connections until the test ends
pub async fn spawn_echo_server() -> SocketAddr {
    let (listener, addr) = create_test_listener().await;
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut reader, mut writer) = socket.split();
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
                let _ = writer.shutdown().await;
            });
        }
    });
    addr
}

/// Resolver backed by a fixed table
#[derive(Debug, Default)]
pub struct StaticResolver {
    hosts: HashMap<String, SocketAddr>,
}

impl StaticResolver {
    /// Map `host` to `addr`; the requested port replaces `addr`'s port
    pub fn with_host(mut self, host: &str, addr: SocketAddr) -> Self {
        self.hosts.insert(host.to_string(), addr);
        self
    }
}

#[async_trait]
impl Resolve for StaticResolver {
    async fn lookup(&self, host: &str, port: u16) -> io::Result<Vec<SocketAddr>> {
        match self.hosts.get(host) {
            Some(addr) => Ok(vec![SocketAddr::new(addr.ip(), port)]),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("unknown host {}", host),
            )),
        }
    }
}

/// Loopback test configuration
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.server.listen_addr = "127.0.0.1".to_string();
    config.server.port = 0;
    config
}

/// A running relay server
pub struct TestServer {
    /// Listening address
    pub addr: SocketAddr,
    shutdown_tx: broadcast::Sender<bool>,
    handle: JoinHandle<anyhow::Result<()>>,
}

impl TestServer {
    /// Start a server with the given config and resolver
    pub async fn start(config: Config, resolver: StaticResolver) -> Self {
        let listener = TcpListener::bind(config.server.bind_addr().unwrap())
            .await
            .unwrap();
        let ctx = SessionContext::with_resolver(&config, Arc::new(resolver));
        let server = Server::from_listener(
            listener,
            ctx,
            socksrelay::helper::SocketOpts::from_tcp_config(&config.tcp),
        );
        let addr = server.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(server.run(shutdown_rx));

        TestServer {
            addr,
            shutdown_tx,
            handle,
        }
    }

    /// Stop accepting and wait for the supervisor to return
    pub async fn shutdown(self) -> anyhow::Result<()> {
        let _ = self.shutdown_tx.send(true);
        self.handle.await.unwrap()
    }
}

/// Connect to the relay and complete the greeting
pub async fn connect_and_greet(server: SocketAddr) -> TcpStream {
    let mut stream = TcpStream::connect(server).await.unwrap();
    stream
        .write_all(&socks5_mock::create_greeting_no_auth())
        .await
        .unwrap();
    let mut selection = [0u8; 2];
    stream.read_exact(&mut selection).await.unwrap();
    assert_eq!(selection, [0x05, 0x00]);
    stream
}

/// Read everything until the peer closes, tolerating a reset
pub async fn read_until_close(stream: &mut TcpStream) -> Vec<u8> {
    let mut data = Vec::new();
    let _ = stream.read_to_end(&mut data).await;
    data
}

/// Mock SOCKS5 handshake data
pub mod socks5_mock {
    use socksrelay::socks::*;

    /// Create a greeting offering only "no authentication"
    pub fn create_greeting_no_auth() -> Vec<u8> {
        vec![SOCKS5_VERSION, 1, SOCKS5_AUTH_METHOD_NONE]
    }

    /// Create a greeting offering the given methods
    pub fn create_greeting(methods: &[u8]) -> Vec<u8> {
        let mut greeting = vec![SOCKS5_VERSION, methods.len() as u8];
        greeting.extend_from_slice(methods);
        greeting
    }

    /// Create a connect command to IPv4 address
    pub fn create_connect_ipv4(ip: [u8; 4], port: u16) -> Vec<u8> {
        let mut cmd = vec![
            SOCKS5_VERSION,
            SOCKS5_CMD_TCP_CONNECT,
            SOCKS5_RESERVED,
            SOCKS5_ADDR_TYPE_IPV4,
        ];
        cmd.extend_from_slice(&ip);
        cmd.extend_from_slice(&port.to_be_bytes());
        cmd
    }

    /// Create a connect command to domain
    pub fn create_connect_domain(domain: &str, port: u16) -> Vec<u8> {
        let mut cmd = vec![
            SOCKS5_VERSION,
            SOCKS5_CMD_TCP_CONNECT,
            SOCKS5_RESERVED,
            SOCKS5_ADDR_TYPE_DOMAIN,
            domain.len() as u8,
        ];
        cmd.extend_from_slice(domain.as_bytes());
        cmd.extend_from_slice(&port.to_be_bytes());
        cmd
    }

    /// Create a request with an arbitrary command byte
    pub fn create_command_ipv4(command: u8, ip: [u8; 4], port: u16) -> Vec<u8> {
        let mut cmd = create_connect_ipv4(ip, port);
        cmd[1] = command;
        cmd
    }
}
