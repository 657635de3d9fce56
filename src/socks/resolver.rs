//! Address resolution for CONNECT targets
//!
//! IP targets are used as-is; domain names go through a [`Resolve`]
//! implementation, the system resolver unless a test swaps it out.

use super::types::{ResolvedTarget, TargetAddr};
use crate::error::Socks5Error;
use async_trait::async_trait;
use std::fmt::Debug;
use std::io;
use std::net::SocketAddr;
use tracing::debug;

/// DNS lookup backend
#[async_trait]
pub trait Resolve: Debug + Send + Sync {
    /// Forward-resolve `host`, returning addresses in preference order
    async fn lookup(&self, host: &str, port: u16) -> io::Result<Vec<SocketAddr>>;
}

/// Resolver backed by the operating system (`getaddrinfo` via tokio)
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemResolver;

#[async_trait]
impl Resolve for SystemResolver {
    async fn lookup(&self, host: &str, port: u16) -> io::Result<Vec<SocketAddr>> {
        let addrs = tokio::net::lookup_host((host, port)).await?;
        Ok(addrs.collect())
    }
}

/// Turn a request target into a concrete address.
///
/// For domain names the first address returned wins, and its family decides
/// the address type of the eventual reply.
pub async fn resolve(
    resolver: &dyn Resolve,
    target: &TargetAddr,
) -> Result<ResolvedTarget, Socks5Error> {
    match target {
        TargetAddr::Ip(addr) => Ok(ResolvedTarget { addr: *addr }),
        TargetAddr::Domain(host, port) => {
            let addrs = resolver
                .lookup(host, *port)
                .await
                .map_err(|e| Socks5Error::Resolution {
                    host: host.clone(),
                    reason: e.to_string(),
                })?;

            debug!("{} resolved to {} address(es)", host, addrs.len());

            let addr = addrs
                .into_iter()
                .next()
                .ok_or_else(|| Socks5Error::Resolution {
                    host: host.clone(),
                    reason: "no addresses found".to_string(),
                })?;

            Ok(ResolvedTarget { addr })
        }
    }
}
