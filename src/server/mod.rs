//! Connection supervisor
//!
//! Owns the listening socket, accepts clients and runs one task per
//! connection until a shutdown signal arrives.

mod accept;

pub use accept::{
    classify_accept_error, AcceptErrorKind, ACCEPT_RETRY_DELAY, EXHAUSTED_RETRY_DELAY,
};

use crate::config::Config;
use crate::error::{ErrorClass, RelayError};
use crate::helper::SocketOpts;
use crate::socks::{handle_socks5_on_stream, NegotiationError, SessionContext};
use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// SOCKS5 relay server
pub struct Server {
    listener: TcpListener,
    ctx: Arc<SessionContext>,
    client_opts: SocketOpts,
}

impl Server {
    /// Bind the listener described by the configuration
    pub async fn bind(config: &Config) -> Result<Self, RelayError> {
        let addr = config.server.bind_addr()?;
        let listener = TcpListener::bind(addr).await.map_err(RelayError::Listener)?;
        Ok(Server::from_listener(
            listener,
            SessionContext::from_config(config),
            SocketOpts::from_tcp_config(&config.tcp),
        ))
    }

    /// Wrap an already bound listener
    pub fn from_listener(
        listener: TcpListener,
        ctx: SessionContext,
        client_opts: SocketOpts,
    ) -> Self {
        Server {
            listener,
            ctx: Arc::new(ctx),
            client_opts,
        }
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until shutdown or a fatal accept error
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<bool>) -> Result<()> {
        info!("SOCKS5 relay listening on {}", self.local_addr()?);

        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => self.spawn_connection(stream, peer),
                    Err(e) => match classify_accept_error(&e) {
                        AcceptErrorKind::Transient(delay) => {
                            warn!("Accept failed, retrying in {:?}: {}", delay, e);
                            tokio::time::sleep(delay).await;
                        }
                        AcceptErrorKind::Fatal => {
                            error!("Listener failed: {}", e);
                            return Err(RelayError::Listener(e).into());
                        }
                    },
                },
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received, no longer accepting connections");
                    break;
                }
            }
        }

        Ok(())
    }

    fn spawn_connection(&self, stream: TcpStream, peer: SocketAddr) {
        if let Err(e) = self.client_opts.apply(&stream) {
            debug!("Failed to set socket options for {}: {}", peer, e);
        }

        let ctx = self.ctx.clone();
        tokio::spawn(async move {
            debug!("New client: {}", peer);
            if let Err(e) = handle_socks5_on_stream(stream, &ctx).await {
                log_session_error(peer, &e);
            }
        });
    }
}

fn log_session_error(peer: SocketAddr, err: &anyhow::Error) {
    match err.downcast_ref::<NegotiationError>().map(|e| e.error.class()) {
        Some(ErrorClass::Transport) => debug!("Client {} went away: {:#}", peer, err),
        Some(_) => warn!("Client {}: {:#}", peer, err),
        None => error!("Connection error for {}: {:#}", peer, err),
    }
}

/// Bind and run the server described by `config`
pub async fn run_server(config: Config, shutdown_rx: broadcast::Receiver<bool>) -> Result<()> {
    let server = Server::bind(&config).await?;
    server.run(shutdown_rx).await
}
