//! SOCKS5 negotiation state machine
//!
//! Drives one client through greeting, method selection, request, resolve,
//! dial and reply. Frames are read through [`Framed`] so exactly one frame
//! is consumed per step; bytes the client pipelined behind its request are
//! handed over with the established session.

use super::codec::{GreetingCodec, RequestCodec};
use super::resolver::{resolve, Resolve};
use super::types::{ConnectReply, MethodSelection, ResolvedTarget};
use crate::config::Config;
use crate::error::{ErrorClass, Socks5Error};
use crate::helper::SocketOpts;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

/// Negotiation states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    /// Waiting for `[VER][NMETHODS][METHODS]`
    AwaitGreeting,
    /// Method selected, waiting for the CONNECT request
    AwaitRequest,
    /// Looking up the target
    Resolving,
    /// Opening the outbound connection
    Dialing,
    /// Writing the success reply
    Replying,
    /// Session established
    Done,
}

impl fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NegotiationState::AwaitGreeting => "await-greeting",
            NegotiationState::AwaitRequest => "await-request",
            NegotiationState::Resolving => "resolving",
            NegotiationState::Dialing => "dialing",
            NegotiationState::Replying => "replying",
            NegotiationState::Done => "done",
        };
        f.write_str(name)
    }
}

/// Negotiation failure, tagged with the state it happened in
#[derive(Debug)]
pub struct NegotiationError {
    /// State the machine was in
    pub state: NegotiationState,
    /// What went wrong
    pub error: Socks5Error,
}

impl fmt::Display for NegotiationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "negotiation failed in {}: {}", self.state, self.error)
    }
}

impl std::error::Error for NegotiationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Tunables for negotiation
#[derive(Debug, Clone)]
pub struct NegotiationOptions {
    /// Bound on the outbound connect
    pub connect_timeout: Duration,
    /// Write a failure reply when DNS resolution fails
    pub reply_on_resolve_failure: bool,
    /// Options applied to the outbound socket
    pub socket_opts: SocketOpts,
}

impl Default for NegotiationOptions {
    fn default() -> Self {
        NegotiationOptions::from(&Config::default())
    }
}

impl From<&Config> for NegotiationOptions {
    fn from(config: &Config) -> Self {
        NegotiationOptions {
            connect_timeout: config.socks.connect_timeout(),
            reply_on_resolve_failure: config.socks.reply_on_resolve_failure,
            socket_opts: SocketOpts::from_tcp_config(&config.tcp),
        }
    }
}

/// Result of a successful negotiation
#[derive(Debug)]
pub struct Established<S> {
    /// Client stream, positioned right after the request frame
    pub client: S,
    /// Connected upstream socket
    pub upstream: TcpStream,
    /// Where the upstream socket points
    pub target: ResolvedTarget,
    /// Local address of the upstream socket, as sent in the reply
    pub bound: SocketAddr,
    /// Client bytes read past the request frame, owed to upstream
    pub pending: Bytes,
}

/// Run the negotiation on a client stream.
///
/// On failure the client stream is dropped, closing it, after whatever reply
/// the failure calls for has been written.
pub async fn negotiate<S>(
    client: S,
    resolver: &dyn Resolve,
    opts: &NegotiationOptions,
) -> Result<Established<S>, NegotiationError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut state = NegotiationState::AwaitGreeting;
    let fail = |state: NegotiationState, error: Socks5Error| NegotiationError { state, error };

    let mut framed = Framed::new(client, GreetingCodec);

    let greeting = match framed.next().await {
        Some(Ok(greeting)) => greeting,
        Some(Err(e)) => return Err(fail(state, e)),
        None => return Err(fail(state, closed_early("greeting"))),
    };
    debug!("Greeting offers methods {:?}", greeting.methods);

    let selection = MethodSelection::for_greeting(&greeting);
    if !selection.is_acceptable() {
        // no reply: the connection is just closed
        return Err(fail(state, Socks5Error::NoAcceptableMethod));
    }
    framed.send(selection).await.map_err(|e| fail(state, e))?;

    state = NegotiationState::AwaitRequest;
    let mut framed = framed.map_codec(|_| RequestCodec);

    let request = match framed.next().await {
        Some(Ok(request)) => request,
        Some(Err(e)) => {
            send_failure(&mut framed, &e, opts).await;
            return Err(fail(state, e));
        }
        None => return Err(fail(state, closed_early("request"))),
    };

    state = NegotiationState::Resolving;
    let target = match resolve(resolver, &request.target).await {
        Ok(target) => target,
        Err(e) => {
            send_failure(&mut framed, &e, opts).await;
            return Err(fail(state, e));
        }
    };
    info!("Requested address: {} ({})", request.target, target);

    state = NegotiationState::Dialing;
    let upstream = match dial(target, opts).await {
        Ok(upstream) => upstream,
        Err(e) => {
            send_failure(&mut framed, &e, opts).await;
            return Err(fail(state, e));
        }
    };

    state = NegotiationState::Replying;
    let bound = upstream
        .local_addr()
        .map_err(|e| fail(state, Socks5Error::Transport(e)))?;
    framed
        .send(ConnectReply::success(bound))
        .await
        .map_err(|e| fail(state, e))?;

    let parts = framed.into_parts();
    debug!("Negotiation {}: {} via {}", NegotiationState::Done, target, bound);

    Ok(Established {
        client: parts.io,
        upstream,
        target,
        bound,
        pending: parts.read_buf.freeze(),
    })
}

async fn dial(target: ResolvedTarget, opts: &NegotiationOptions) -> Result<TcpStream, Socks5Error> {
    let addr = target.addr;
    let stream = match tokio::time::timeout(opts.connect_timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(source)) => return Err(Socks5Error::Dial { addr, source }),
        Err(_) => {
            return Err(Socks5Error::Dial {
                addr,
                source: io::Error::new(io::ErrorKind::TimedOut, "connect timed out"),
            })
        }
    };

    if let Err(e) = opts.socket_opts.apply(&stream) {
        warn!("Failed to set socket options for {}: {}", addr, e);
    }

    Ok(stream)
}

/// Reply owed to the client for a failed negotiation, if any.
///
/// Unsupported requests get the abbreviated frame; lookup and dial failures
/// get the zero-filled one, lookups only when configured to.
fn failure_reply(error: &Socks5Error, opts: &NegotiationOptions) -> Option<ConnectReply> {
    let code = error.reply_code()?;
    match error.class() {
        ErrorClass::Unsupported => Some(ConnectReply::abbreviated(code)),
        ErrorClass::Resolution if !opts.reply_on_resolve_failure => None,
        _ => Some(ConnectReply::zero_filled(code)),
    }
}

/// Best-effort failure reply; the connection is closed right after
async fn send_failure<S>(
    framed: &mut Framed<S, RequestCodec>,
    error: &Socks5Error,
    opts: &NegotiationOptions,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let Some(reply) = failure_reply(error, opts) else {
        return;
    };
    if let Err(e) = framed.send(reply).await {
        debug!("Failed to write {:?} reply: {}", reply.code, e);
    }
}

fn closed_early(frame: &str) -> Socks5Error {
    Socks5Error::Transport(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("client closed before sending the {}", frame),
    ))
}
