//! TCP relay for established SOCKS5 CONNECT sessions
//!
//! Two copy tasks, one per direction, each reporting to a shared two-slot
//! completion channel. The relay returns only after both have reported, so
//! neither socket is released while the other direction may still use it.
//!
//! The idle timeout covers the session as a whole: it fires only once
//! neither direction has moved a byte for the configured duration, and then
//! ends both directions together.

use crate::config::SocksConfig;
use crate::socks::consts::DEFAULT_BUFFER_SIZE;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, warn};

/// Direction of one copy loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Client socket to upstream socket
    ClientToUpstream,
    /// Upstream socket to client socket
    UpstreamToClient,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::ClientToUpstream => write!(f, "client->upstream"),
            Direction::UpstreamToClient => write!(f, "upstream->client"),
        }
    }
}

/// Tunables for one relay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayOptions {
    /// Read buffer size per direction
    pub buffer_size: usize,
    /// Session ends after this long without traffic in either direction
    pub idle_timeout: Option<Duration>,
}

impl Default for RelayOptions {
    fn default() -> Self {
        RelayOptions {
            buffer_size: DEFAULT_BUFFER_SIZE,
            idle_timeout: None,
        }
    }
}

impl From<&SocksConfig> for RelayOptions {
    fn from(config: &SocksConfig) -> Self {
        RelayOptions {
            buffer_size: config.buffer_size,
            idle_timeout: config.idle_timeout(),
        }
    }
}

/// Bytes moved in each direction
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RelayStats {
    /// Bytes forwarded from the client to upstream
    pub client_to_upstream: u64,
    /// Bytes forwarded from upstream to the client
    pub upstream_to_client: u64,
}

/// Completion signal sent by a copy loop when it exits
#[derive(Debug, Clone, Copy)]
struct Finished {
    direction: Direction,
    bytes: u64,
}

/// Last time either copy loop moved data
#[derive(Debug)]
struct Activity {
    start: Instant,
    last_ms: AtomicU64,
}

impl Activity {
    fn new() -> Self {
        Activity {
            start: Instant::now(),
            last_ms: AtomicU64::new(0),
        }
    }

    fn touch(&self) {
        let elapsed = self.start.elapsed().as_millis() as u64;
        self.last_ms.fetch_max(elapsed, Ordering::Relaxed);
    }

    fn last(&self) -> Instant {
        self.start + Duration::from_millis(self.last_ms.load(Ordering::Relaxed))
    }
}

/// Resolves once the session has been quiet for `idle`
async fn idle_expired(activity: &Activity, idle: Duration) {
    loop {
        let deadline = activity.last() + idle;
        if Instant::now() >= deadline {
            return;
        }
        tokio::time::sleep_until(deadline).await;
    }
}

/// Relay data bidirectionally between the client and upstream streams.
///
/// Each direction runs until end-of-stream or an I/O error, then shuts down
/// the write side of its destination. When the idle timeout expires both
/// directions stop. Returns once both directions have finished.
pub async fn relay_tcp<A, B>(client: A, upstream: B, opts: RelayOptions) -> RelayStats
where
    A: AsyncRead + AsyncWrite + Send + 'static,
    B: AsyncRead + AsyncWrite + Send + 'static,
{
    let (client_read, client_write) = tokio::io::split(client);
    let (upstream_read, upstream_write) = tokio::io::split(upstream);

    let (done_tx, mut done_rx) = mpsc::channel::<Finished>(2);
    let (idle_tx, idle_rx) = watch::channel(false);
    let activity = Arc::new(Activity::new());

    spawn_direction(
        Direction::ClientToUpstream,
        client_read,
        upstream_write,
        opts.buffer_size,
        CopyControl {
            activity: activity.clone(),
            idle_rx: idle_rx.clone(),
            done_tx: done_tx.clone(),
        },
    );
    spawn_direction(
        Direction::UpstreamToClient,
        upstream_read,
        client_write,
        opts.buffer_size,
        CopyControl {
            activity: activity.clone(),
            idle_rx,
            done_tx,
        },
    );

    let mut stats = RelayStats::default();
    let mut pending = 2;
    let mut idle_fired = false;

    while pending > 0 {
        tokio::select! {
            finished = done_rx.recv() => match finished {
                Some(Finished { direction, bytes }) => {
                    debug!("{} finished: {} bytes", direction, bytes);
                    match direction {
                        Direction::ClientToUpstream => stats.client_to_upstream = bytes,
                        Direction::UpstreamToClient => stats.upstream_to_client = bytes,
                    }
                    pending -= 1;
                }
                None => {
                    // a copy task died without reporting
                    warn!("Relay task exited without signalling completion");
                    break;
                }
            },
            _ = wait_idle(&activity, opts.idle_timeout), if !idle_fired => {
                debug!("Relay idle for {:?}, closing both directions", opts.idle_timeout);
                idle_fired = true;
                let _ = idle_tx.send(true);
            }
        }
    }

    stats
}

async fn wait_idle(activity: &Activity, idle: Option<Duration>) {
    match idle {
        Some(idle) => idle_expired(activity, idle).await,
        None => std::future::pending().await,
    }
}

/// Shared state handed to each copy loop
struct CopyControl {
    activity: Arc<Activity>,
    idle_rx: watch::Receiver<bool>,
    done_tx: mpsc::Sender<Finished>,
}

fn spawn_direction<R, W>(
    direction: Direction,
    reader: R,
    writer: W,
    buffer_size: usize,
    control: CopyControl,
) where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let CopyControl {
            activity,
            idle_rx,
            done_tx,
        } = control;
        let bytes =
            copy_direction(direction, reader, writer, buffer_size, &activity, idle_rx).await;
        let _ = done_tx.send(Finished { direction, bytes }).await;
    });
}

async fn copy_direction<R, W>(
    direction: Direction,
    mut reader: R,
    mut writer: W,
    buffer_size: usize,
    activity: &Activity,
    mut idle_rx: watch::Receiver<bool>,
) -> u64
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; buffer_size.max(1)];
    let mut copied = 0u64;

    loop {
        let read = tokio::select! {
            read = reader.read(&mut buf) => read,
            _ = idle_rx.wait_for(|idle| *idle) => {
                debug!("{} stopped by idle timeout", direction);
                break;
            }
        };

        let n = match read {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                debug!("{} read error: {}", direction, e);
                break;
            }
        };
        activity.touch();

        let written = tokio::select! {
            written = writer.write_all(&buf[..n]) => written,
            _ = idle_rx.wait_for(|idle| *idle) => {
                debug!("{} stopped by idle timeout while writing", direction);
                break;
            }
        };
        if let Err(e) = written {
            debug!("{} write error: {}", direction, e);
            break;
        }
        copied += n as u64;
        activity.touch();
    }

    // propagate EOF to the destination peer
    let _ = writer.shutdown().await;
    copied
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    const WAIT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_relay_tcp_bidirectional() {
        let (mut client, client_side) = duplex(1024);
        let (mut upstream, upstream_side) = duplex(1024);

        let relay = tokio::spawn(relay_tcp(client_side, upstream_side, RelayOptions::default()));

        client.write_all(b"message A->B").await.unwrap();
        let mut buf = [0u8; 12];
        upstream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"message A->B");

        upstream.write_all(b"message B->A").await.unwrap();
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"message B->A");

        drop(client);
        drop(upstream);

        let stats = tokio::time::timeout(WAIT, relay).await.unwrap().unwrap();
        assert_eq!(stats.client_to_upstream, 12);
        assert_eq!(stats.upstream_to_client, 12);
    }

    #[tokio::test]
    async fn test_relay_tcp_preserves_order_across_chunks() {
        let (mut client, client_side) = duplex(512);
        let (mut upstream, upstream_side) = duplex(512);

        let opts = RelayOptions {
            buffer_size: 100,
            idle_timeout: None,
        };
        let relay = tokio::spawn(relay_tcp(client_side, upstream_side, opts));

        let payload: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
        let expected = payload.clone();

        let writer = tokio::spawn(async move {
            client.write_all(&payload).await.unwrap();
            client.shutdown().await.unwrap();
            client
        });

        let mut received = Vec::new();
        upstream.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, expected);

        upstream.shutdown().await.unwrap();
        let mut client = writer.await.unwrap();
        let mut rest = Vec::new();
        client.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());

        let stats = tokio::time::timeout(WAIT, relay).await.unwrap().unwrap();
        assert_eq!(stats.client_to_upstream, 20_000);
        assert_eq!(stats.upstream_to_client, 0);
    }

    #[tokio::test]
    async fn test_relay_tcp_half_close_still_delivers_response() {
        let (mut client, client_side) = duplex(1024);
        let (mut upstream, upstream_side) = duplex(1024);

        let relay = tokio::spawn(relay_tcp(client_side, upstream_side, RelayOptions::default()));

        client.write_all(b"request").await.unwrap();
        client.shutdown().await.unwrap();

        let mut request = Vec::new();
        upstream.read_to_end(&mut request).await.unwrap();
        assert_eq!(request, b"request");

        upstream.write_all(b"response").await.unwrap();
        drop(upstream);

        let mut response = Vec::new();
        client.read_to_end(&mut response).await.unwrap();
        assert_eq!(response, b"response");

        let result = tokio::time::timeout(WAIT, relay).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_relay_tcp_empty_transfer() {
        let (client, client_side) = duplex(1024);
        let (upstream, upstream_side) = duplex(1024);

        let relay = tokio::spawn(relay_tcp(client_side, upstream_side, RelayOptions::default()));

        drop(client);
        drop(upstream);

        let stats = tokio::time::timeout(WAIT, relay).await.unwrap().unwrap();
        assert_eq!(stats, RelayStats::default());
    }

    #[tokio::test]
    async fn test_relay_tcp_idle_timeout() {
        let (_client, client_side) = duplex(1024);
        let (_upstream, upstream_side) = duplex(1024);

        let opts = RelayOptions {
            buffer_size: DEFAULT_BUFFER_SIZE,
            idle_timeout: Some(Duration::from_millis(50)),
        };

        // both peers stay open and silent; only the idle timeout ends the relay
        let result = tokio::time::timeout(WAIT, relay_tcp(client_side, upstream_side, opts)).await;
        assert_eq!(result.unwrap(), RelayStats::default());
    }

    #[tokio::test]
    async fn test_relay_tcp_one_way_stream_outlives_idle_timeout() {
        let (mut client, client_side) = duplex(4096);
        let (upstream, upstream_side) = duplex(4096);

        let opts = RelayOptions {
            buffer_size: DEFAULT_BUFFER_SIZE,
            idle_timeout: Some(Duration::from_millis(100)),
        };
        let relay = tokio::spawn(relay_tcp(client_side, upstream_side, opts));

        let (mut upstream_read, mut upstream_write) = tokio::io::split(upstream);
        let started = Instant::now();
        let eof_seen = tokio::spawn(async move {
            let mut from_client = Vec::new();
            upstream_read.read_to_end(&mut from_client).await.unwrap();
            (started.elapsed(), from_client)
        });

        // the client stays silent while upstream keeps sending well past the timeout
        for _ in 0..25 {
            upstream_write.write_all(b"chunk").await.unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let streamed_for = started.elapsed();

        let (eof_after, from_client) = tokio::time::timeout(WAIT, eof_seen).await.unwrap().unwrap();
        assert!(from_client.is_empty());
        assert!(
            eof_after >= streamed_for,
            "upstream got EOF after {:?} while still streaming for {:?}",
            eof_after,
            streamed_for
        );

        let mut downloaded = Vec::new();
        client.read_to_end(&mut downloaded).await.unwrap();
        assert_eq!(downloaded, b"chunk".repeat(25));

        let stats = tokio::time::timeout(WAIT, relay).await.unwrap().unwrap();
        assert_eq!(stats.upstream_to_client, 125);
        assert_eq!(stats.client_to_upstream, 0);
    }

    #[tokio::test]
    async fn test_relay_tcp_idle_timeout_ends_both_directions_together() {
        let (mut client, client_side) = duplex(1024);
        let (mut upstream, upstream_side) = duplex(1024);

        let opts = RelayOptions {
            buffer_size: DEFAULT_BUFFER_SIZE,
            idle_timeout: Some(Duration::from_millis(50)),
        };
        let relay = tokio::spawn(relay_tcp(client_side, upstream_side, opts));

        client.write_all(b"hello").await.unwrap();
        let mut buf = [0u8; 5];
        upstream.read_exact(&mut buf).await.unwrap();

        let stats = tokio::time::timeout(WAIT, relay).await.unwrap().unwrap();
        assert_eq!(stats.client_to_upstream, 5);

        let mut rest = Vec::new();
        upstream.read_to_end(&mut rest).await.unwrap();
        client.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }

    #[test]
    fn test_relay_options_from_config() {
        let config = SocksConfig {
            buffer_size: 8192,
            idle_timeout_secs: 0,
            ..Default::default()
        };
        let opts = RelayOptions::from(&config);
        assert_eq!(opts.buffer_size, 8192);
        assert_eq!(opts.idle_timeout, None);
    }

    #[test]
    fn test_direction_display() {
        assert_eq!(Direction::ClientToUpstream.to_string(), "client->upstream");
        assert_eq!(Direction::UpstreamToClient.to_string(), "upstream->client");
    }
}
