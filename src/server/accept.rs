//! Accept error classification
//!
//! `accept()` fails for reasons that belong to a single pending connection
//! (the peer reset it before we got to it) and for reasons that belong to
//! the process (descriptor table full). Both are survivable. Anything else
//! means the listening socket itself is broken.

use std::io::{self, ErrorKind};
use std::time::Duration;

/// Per-process descriptor table full
const EMFILE: i32 = 24;
/// System-wide descriptor table full
const ENFILE: i32 = 23;

/// Pause after a failed accept of one pending connection
pub const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(10);

/// Pause after running out of file descriptors
pub const EXHAUSTED_RETRY_DELAY: Duration = Duration::from_millis(500);

/// How the supervisor reacts to an accept error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptErrorKind {
    /// Log, wait the given delay, keep accepting
    Transient(Duration),
    /// Stop the supervisor
    Fatal,
}

/// Classify an error returned by `TcpListener::accept`
pub fn classify_accept_error(err: &io::Error) -> AcceptErrorKind {
    if matches!(err.raw_os_error(), Some(EMFILE) | Some(ENFILE)) {
        return AcceptErrorKind::Transient(EXHAUSTED_RETRY_DELAY);
    }

    match err.kind() {
        ErrorKind::ConnectionAborted
        | ErrorKind::ConnectionReset
        | ErrorKind::ConnectionRefused
        | ErrorKind::Interrupted
        | ErrorKind::WouldBlock
        | ErrorKind::TimedOut => AcceptErrorKind::Transient(ACCEPT_RETRY_DELAY),
        _ => AcceptErrorKind::Fatal,
    }
}
