//! Main SOCKS5 handler
//!
//! Entry point for one accepted client: negotiation, then the relay.

use crate::config::Config;
use crate::socks::negotiation::{negotiate, Established, NegotiationOptions};
use crate::socks::resolver::{Resolve, SystemResolver};
use crate::socks::tcp_relay::{relay_tcp, RelayOptions, RelayStats};
use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

/// Everything a connection task needs, shared by all of them
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Name lookup for domain targets
    pub resolver: Arc<dyn Resolve>,
    /// Negotiation tunables
    pub negotiation: NegotiationOptions,
    /// Relay tunables
    pub relay: RelayOptions,
    /// Bound on the whole negotiation
    pub handshake_timeout: Option<Duration>,
}

impl SessionContext {
    /// Build a context using the system resolver
    pub fn from_config(config: &Config) -> Self {
        SessionContext::with_resolver(config, Arc::new(SystemResolver))
    }

    /// Build a context with a custom resolver
    pub fn with_resolver(config: &Config, resolver: Arc<dyn Resolve>) -> Self {
        SessionContext {
            resolver,
            negotiation: NegotiationOptions::from(config),
            relay: RelayOptions::from(&config.socks),
            handshake_timeout: config.socks.handshake_timeout(),
        }
    }
}

/// Handle SOCKS5 protocol on a client stream
///
/// # Protocol Flow
///
/// 1. Greeting and method selection (no authentication only)
/// 2. CONNECT request parsing
/// 3. Target resolution and outbound dial
/// 4. Reply, then bidirectional relay until both sides close
///
/// Returns the relay byte counts once the session is over.
pub async fn handle_socks5_on_stream<S>(stream: S, ctx: &SessionContext) -> Result<RelayStats>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let negotiation = negotiate(stream, ctx.resolver.as_ref(), &ctx.negotiation);
    let established = match ctx.handshake_timeout {
        Some(limit) => tokio::time::timeout(limit, negotiation)
            .await
            .map_err(|_| anyhow!("SOCKS5 negotiation timed out after {:?}", limit))?,
        None => negotiation.await,
    }?;

    let Established {
        client,
        mut upstream,
        target,
        bound,
        pending,
    } = established;

    info!("CONNECT {} established via {}", target, bound);

    if !pending.is_empty() {
        debug!("Forwarding {} early bytes to {}", pending.len(), target);
        upstream
            .write_all(&pending)
            .await
            .with_context(|| format!("Failed to forward early data to {}", target))?;
    }

    let stats = relay_tcp(client, upstream, ctx.relay).await;
    info!(
        "Relay to {} closed: {} bytes sent, {} bytes received",
        target, stats.client_to_upstream, stats.upstream_to_client
    );

    Ok(stats)
}
