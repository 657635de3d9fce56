//! Error types for Socksrelay
//!
//! This module defines all custom error types used throughout the application.

use std::io;
use std::net::SocketAddr;
use thiserror::Error;

/// Main error type for Socksrelay operations
#[derive(Error, Debug)]
pub enum RelayError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Listener failed in a way that cannot be recovered by retrying
    #[error("Listener error: {0}")]
    Listener(io::Error),

    /// SOCKS5 protocol error
    #[error("SOCKS5 error: {0}")]
    Socks5(#[from] Socks5Error),
}

/// Broad category of a [`Socks5Error`], used to decide how a failed
/// negotiation is reported to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Short or failed read/write on a socket
    Transport,
    /// Malformed fixed-format field; the peer gets no reply
    Protocol,
    /// Well-formed request asking for something this relay does not do
    Unsupported,
    /// DNS lookup failed or returned nothing
    Resolution,
    /// Outbound connection could not be opened
    Dial,
}

/// SOCKS5 specific errors
#[derive(Error, Debug)]
pub enum Socks5Error {
    /// Socket failure or stream ended in the middle of a frame
    #[error("Transport error: {0}")]
    Transport(#[from] io::Error),

    /// Unsupported SOCKS version
    #[error("Unsupported SOCKS version: {0}")]
    UnsupportedVersion(u8),

    /// Greeting offered zero methods
    #[error("Client offered no authentication methods")]
    NoMethods,

    /// Reserved byte in a request was not zero
    #[error("Reserved field must be 0, got {0}")]
    NonZeroReserved(u8),

    /// No acceptable authentication method
    #[error("No acceptable authentication method")]
    NoAcceptableMethod,

    /// Domain name that can never resolve (empty or not UTF-8)
    #[error("Invalid domain name: {0}")]
    InvalidDomain(String),

    /// Command not supported
    #[error("Command not supported: {0}")]
    UnsupportedCommand(u8),

    /// Address type not supported
    #[error("Address type not supported: {0}")]
    UnsupportedAddressType(u8),

    /// DNS resolution failed
    #[error("Failed to resolve '{host}': {reason}")]
    Resolution {
        /// Host name that was looked up
        host: String,
        /// Lookup error or "no addresses"
        reason: String,
    },

    /// Outbound connection failed
    #[error("Failed to connect to {addr}: {source}")]
    Dial {
        /// Resolved target
        addr: SocketAddr,
        /// Underlying connect error
        #[source]
        source: io::Error,
    },
}

impl Socks5Error {
    /// Category of this error
    pub fn class(&self) -> ErrorClass {
        match self {
            Socks5Error::Transport(_) => ErrorClass::Transport,
            Socks5Error::UnsupportedVersion(_)
            | Socks5Error::NoMethods
            | Socks5Error::NonZeroReserved(_)
            | Socks5Error::NoAcceptableMethod => ErrorClass::Protocol,
            Socks5Error::UnsupportedCommand(_) | Socks5Error::UnsupportedAddressType(_) => {
                ErrorClass::Unsupported
            }
            Socks5Error::InvalidDomain(_) | Socks5Error::Resolution { .. } => {
                ErrorClass::Resolution
            }
            Socks5Error::Dial { .. } => ErrorClass::Dial,
        }
    }

    /// Reply code the client should see for this error, if any.
    ///
    /// Resolution failures carry a code here; whether it is actually written
    /// is up to the negotiation configuration.
    pub fn reply_code(&self) -> Option<Socks5ReplyCode> {
        match self {
            Socks5Error::UnsupportedCommand(_) => Some(Socks5ReplyCode::CommandNotSupported),
            Socks5Error::UnsupportedAddressType(_) => {
                Some(Socks5ReplyCode::AddressTypeNotSupported)
            }
            Socks5Error::InvalidDomain(_)
            | Socks5Error::Resolution { .. }
            | Socks5Error::Dial { .. } => Some(Socks5ReplyCode::ConnectionRefused),
            _ => None,
        }
    }
}

/// Reply codes for SOCKS5 protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Socks5ReplyCode {
    /// Command succeeded
    Succeeded = 0x00,
    /// General SOCKS server failure; never sent, failures reply `ConnectionRefused`
    GeneralFailure = 0x01,
    /// Connection not allowed by ruleset
    ConnectionNotAllowed = 0x02,
    /// Network unreachable
    NetworkUnreachable = 0x03,
    /// Host unreachable
    HostUnreachable = 0x04,
    /// Connection refused; also the relay's general failure reply for every
    /// failed lookup or outbound dial
    ConnectionRefused = 0x05,
    /// TTL expired
    TtlExpired = 0x06,
    /// Command not supported
    CommandNotSupported = 0x07,
    /// Address type not supported
    AddressTypeNotSupported = 0x08,
}

impl From<Socks5ReplyCode> for u8 {
    fn from(code: Socks5ReplyCode) -> Self {
        code as u8
    }
}

impl TryFrom<u8> for Socks5ReplyCode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Socks5ReplyCode::Succeeded),
            0x01 => Ok(Socks5ReplyCode::GeneralFailure),
            0x02 => Ok(Socks5ReplyCode::ConnectionNotAllowed),
            0x03 => Ok(Socks5ReplyCode::NetworkUnreachable),
            0x04 => Ok(Socks5ReplyCode::HostUnreachable),
            0x05 => Ok(Socks5ReplyCode::ConnectionRefused),
            0x06 => Ok(Socks5ReplyCode::TtlExpired),
            0x07 => Ok(Socks5ReplyCode::CommandNotSupported),
            0x08 => Ok(Socks5ReplyCode::AddressTypeNotSupported),
            other => Err(other),
        }
    }
}
