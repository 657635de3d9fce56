//! SOCKS5 protocol constants
//!
//! Defines all constants used in the SOCKS5 protocol implementation.

/// SOCKS5 protocol version
pub const SOCKS5_VERSION: u8 = 0x05;

// Authentication methods
/// No authentication required
pub const SOCKS5_AUTH_METHOD_NONE: u8 = 0x00;
/// No acceptable methods
pub const SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE: u8 = 0xFF;

// Commands
/// TCP CONNECT command
pub const SOCKS5_CMD_TCP_CONNECT: u8 = 0x01;
/// TCP BIND command (rejected)
pub const SOCKS5_CMD_TCP_BIND: u8 = 0x02;
/// UDP ASSOCIATE command (rejected)
pub const SOCKS5_CMD_UDP_ASSOCIATE: u8 = 0x03;

// Address types
/// Placeholder address type used by abbreviated and zero-filled replies
pub const SOCKS5_ADDR_TYPE_NONE: u8 = 0x00;
/// IPv4 address
pub const SOCKS5_ADDR_TYPE_IPV4: u8 = 0x01;
/// Domain name
pub const SOCKS5_ADDR_TYPE_DOMAIN: u8 = 0x03;
/// IPv6 address
pub const SOCKS5_ADDR_TYPE_IPV6: u8 = 0x04;

// Reserved byte
/// Reserved byte value (always 0x00)
pub const SOCKS5_RESERVED: u8 = 0x00;

// Frame sizes
/// VER + NMETHODS
pub const GREETING_HEADER_LEN: usize = 2;
/// VER + CMD + RSV + ATYP
pub const REQUEST_HEADER_LEN: usize = 4;
/// Abbreviated reply: VER + REP + RSV + ATYP(0)
pub const ABBREVIATED_REPLY_LEN: usize = 4;
/// Zero-filled failure reply
pub const ZERO_FILLED_REPLY_LEN: usize = 8;

// Buffer sizes
/// Default buffer size for data transfer
pub const DEFAULT_BUFFER_SIZE: usize = 4096;
/// Largest relay buffer accepted by configuration
pub const MAX_BUFFER_SIZE: usize = 65536;
