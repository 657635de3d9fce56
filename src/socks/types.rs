//! SOCKS5 type definitions
//!
//! Defines the frames and addresses exchanged during negotiation.

use super::consts::*;
use crate::error::Socks5ReplyCode;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

/// SOCKS5 command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocksCommand {
    /// TCP CONNECT - establish a TCP connection to target
    Connect,
    /// TCP BIND - wait for incoming connection (rejected)
    Bind,
    /// UDP ASSOCIATE - establish UDP relay (rejected)
    UdpAssociate,
}

impl SocksCommand {
    /// Parse a command byte into SocksCommand
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            SOCKS5_CMD_TCP_CONNECT => Some(SocksCommand::Connect),
            SOCKS5_CMD_TCP_BIND => Some(SocksCommand::Bind),
            SOCKS5_CMD_UDP_ASSOCIATE => Some(SocksCommand::UdpAssociate),
            _ => None,
        }
    }

    /// Convert SocksCommand to byte
    pub fn to_byte(self) -> u8 {
        match self {
            SocksCommand::Connect => SOCKS5_CMD_TCP_CONNECT,
            SocksCommand::Bind => SOCKS5_CMD_TCP_BIND,
            SocksCommand::UdpAssociate => SOCKS5_CMD_UDP_ASSOCIATE,
        }
    }
}

impl fmt::Display for SocksCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocksCommand::Connect => write!(f, "CONNECT"),
            SocksCommand::Bind => write!(f, "BIND"),
            SocksCommand::UdpAssociate => write!(f, "UDP ASSOCIATE"),
        }
    }
}

/// Address type tag (ATYP)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressType {
    /// 4-byte IPv4 address
    Ipv4,
    /// Length-prefixed domain name
    Domain,
    /// 16-byte IPv6 address
    Ipv6,
}

impl AddressType {
    /// Parse an ATYP byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            SOCKS5_ADDR_TYPE_IPV4 => Some(AddressType::Ipv4),
            SOCKS5_ADDR_TYPE_DOMAIN => Some(AddressType::Domain),
            SOCKS5_ADDR_TYPE_IPV6 => Some(AddressType::Ipv6),
            _ => None,
        }
    }

    /// Convert to ATYP byte
    pub fn to_byte(self) -> u8 {
        match self {
            AddressType::Ipv4 => SOCKS5_ADDR_TYPE_IPV4,
            AddressType::Domain => SOCKS5_ADDR_TYPE_DOMAIN,
            AddressType::Ipv6 => SOCKS5_ADDR_TYPE_IPV6,
        }
    }
}

/// Client greeting: `[VER][NMETHODS][METHODS...]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Greeting {
    /// Offered authentication methods, in client order
    pub methods: Vec<u8>,
}

impl Greeting {
    /// Whether the client offered the given method
    pub fn offers(&self, method: u8) -> bool {
        self.methods.contains(&method)
    }
}

/// Server method selection: `[VER][METHOD]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodSelection {
    /// Chosen method
    pub method: u8,
}

impl MethodSelection {
    /// Pick the method for a greeting.
    ///
    /// Only "no authentication required" is supported, so the result is
    /// either that method or `0xFF`.
    pub fn for_greeting(greeting: &Greeting) -> Self {
        let method = if greeting.offers(SOCKS5_AUTH_METHOD_NONE) {
            SOCKS5_AUTH_METHOD_NONE
        } else {
            SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE
        };
        MethodSelection { method }
    }

    /// Whether negotiation can continue with this selection
    pub fn is_acceptable(&self) -> bool {
        self.method != SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE
    }
}

/// Target address for SOCKS5 requests
///
/// Represents the destination address in a SOCKS5 request.
/// Can be an IP address (v4 or v6) or a domain name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetAddr {
    /// IP address with port
    Ip(SocketAddr),
    /// Domain name with port
    Domain(String, u16),
}

impl TargetAddr {
    /// Create a new TargetAddr from an IPv4 address and port
    pub fn ipv4(ip: Ipv4Addr, port: u16) -> Self {
        TargetAddr::Ip(SocketAddr::new(IpAddr::V4(ip), port))
    }

    /// Create a new TargetAddr from an IPv6 address and port
    pub fn ipv6(ip: Ipv6Addr, port: u16) -> Self {
        TargetAddr::Ip(SocketAddr::new(IpAddr::V6(ip), port))
    }

    /// Create a new TargetAddr from a domain name and port
    pub fn domain(domain: impl Into<String>, port: u16) -> Self {
        TargetAddr::Domain(domain.into(), port)
    }

    /// Get the port number
    pub fn port(&self) -> u16 {
        match self {
            TargetAddr::Ip(addr) => addr.port(),
            TargetAddr::Domain(_, port) => *port,
        }
    }

    /// Get the address type
    pub fn addr_type(&self) -> AddressType {
        match self {
            TargetAddr::Ip(SocketAddr::V4(_)) => AddressType::Ipv4,
            TargetAddr::Ip(SocketAddr::V6(_)) => AddressType::Ipv6,
            TargetAddr::Domain(_, _) => AddressType::Domain,
        }
    }

    /// Serialize ATYP + address + port
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![self.addr_type().to_byte()];

        match self {
            TargetAddr::Ip(SocketAddr::V4(addr)) => bytes.extend_from_slice(&addr.ip().octets()),
            TargetAddr::Ip(SocketAddr::V6(addr)) => bytes.extend_from_slice(&addr.ip().octets()),
            TargetAddr::Domain(domain, _) => {
                bytes.push(domain.len() as u8);
                bytes.extend_from_slice(domain.as_bytes());
            }
        }
        bytes.extend_from_slice(&self.port().to_be_bytes());

        bytes
    }
}

impl fmt::Display for TargetAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetAddr::Ip(addr) => write!(f, "{}", addr),
            TargetAddr::Domain(domain, port) => write!(f, "{}:{}", domain, port),
        }
    }
}

impl From<SocketAddr> for TargetAddr {
    fn from(addr: SocketAddr) -> Self {
        TargetAddr::Ip(addr)
    }
}

/// Parsed CONNECT request: `[VER][CMD][RSV][ATYP][ADDR][PORT]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    /// Requested command; the decoder only lets CONNECT through
    pub command: SocksCommand,
    /// Destination
    pub target: TargetAddr,
}

impl ConnectRequest {
    /// CONNECT to the given target
    pub fn connect(target: TargetAddr) -> Self {
        ConnectRequest {
            command: SocksCommand::Connect,
            target,
        }
    }

    /// Serialize the request as a client would send it
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![SOCKS5_VERSION, self.command.to_byte(), SOCKS5_RESERVED];
        bytes.extend_from_slice(&self.target.to_bytes());
        bytes
    }
}

/// Concrete destination produced by the resolver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedTarget {
    /// Address to dial
    pub addr: SocketAddr,
}

impl fmt::Display for ResolvedTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.addr)
    }
}

/// Address section of a CONNECT reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundAddr {
    /// `[ATYP=0]` and nothing else; used when the request header was rejected
    Abbreviated,
    /// `[ATYP=0]` plus four zero bytes; used for failures after the request
    /// was accepted
    ZeroFilled,
    /// Local address of the outbound socket
    Socket(SocketAddr),
}

/// CONNECT reply: `[VER][REP][RSV][ATYP][BND.ADDR][BND.PORT]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectReply {
    /// Reply code
    pub code: Socks5ReplyCode,
    /// Bound address section
    pub bound: BoundAddr,
}

impl ConnectReply {
    /// Success reply carrying the outbound socket's local address
    pub fn success(bound: SocketAddr) -> Self {
        ConnectReply {
            code: Socks5ReplyCode::Succeeded,
            bound: BoundAddr::Socket(bound),
        }
    }

    /// Early rejection, before any address is known
    pub fn abbreviated(code: Socks5ReplyCode) -> Self {
        ConnectReply {
            code,
            bound: BoundAddr::Abbreviated,
        }
    }

    /// Failure after the request was accepted
    pub fn zero_filled(code: Socks5ReplyCode) -> Self {
        ConnectReply {
            code,
            bound: BoundAddr::ZeroFilled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socks_command_from_byte() {
        assert_eq!(SocksCommand::from_byte(1), Some(SocksCommand::Connect));
        assert_eq!(SocksCommand::from_byte(2), Some(SocksCommand::Bind));
        assert_eq!(SocksCommand::from_byte(3), Some(SocksCommand::UdpAssociate));
        assert_eq!(SocksCommand::from_byte(4), None);
    }

    #[test]
    fn test_socks_command_display() {
        assert_eq!(format!("{}", SocksCommand::Connect), "CONNECT");
        assert_eq!(format!("{}", SocksCommand::UdpAssociate), "UDP ASSOCIATE");
    }

    #[test]
    fn test_address_type_bytes() {
        assert_eq!(AddressType::from_byte(0x01), Some(AddressType::Ipv4));
        assert_eq!(AddressType::from_byte(0x03), Some(AddressType::Domain));
        assert_eq!(AddressType::from_byte(0x04), Some(AddressType::Ipv6));
        assert_eq!(AddressType::from_byte(0x02), None);
        assert_eq!(AddressType::Ipv6.to_byte(), 0x04);
    }

    #[test]
    fn test_method_selection_prefers_no_auth() {
        let greeting = Greeting {
            methods: vec![0x02, SOCKS5_AUTH_METHOD_NONE],
        };
        let selection = MethodSelection::for_greeting(&greeting);
        assert_eq!(selection.method, SOCKS5_AUTH_METHOD_NONE);
        assert!(selection.is_acceptable());
    }

    #[test]
    fn test_method_selection_without_no_auth() {
        let greeting = Greeting {
            methods: vec![0x01, 0x02],
        };
        let selection = MethodSelection::for_greeting(&greeting);
        assert_eq!(selection.method, SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE);
        assert!(!selection.is_acceptable());
    }

    #[test]
    fn test_target_addr_display() {
        let addr = TargetAddr::ipv4(Ipv4Addr::new(127, 0, 0, 1), 8080);
        assert_eq!(format!("{}", addr), "127.0.0.1:8080");

        let addr = TargetAddr::domain("test.com", 443);
        assert_eq!(format!("{}", addr), "test.com:443");
    }

    #[test]
    fn test_target_addr_to_bytes_domain() {
        let addr = TargetAddr::domain("test", 80);
        let bytes = addr.to_bytes();

        assert_eq!(bytes[0], SOCKS5_ADDR_TYPE_DOMAIN);
        assert_eq!(bytes[1], 4);
        assert_eq!(&bytes[2..6], b"test");
        assert_eq!(&bytes[6..8], &80u16.to_be_bytes());
    }

    #[test]
    fn test_connect_request_to_bytes() {
        let request = ConnectRequest::connect(TargetAddr::ipv4(Ipv4Addr::new(10, 0, 0, 1), 443));
        assert_eq!(
            request.to_bytes(),
            vec![0x05, 0x01, 0x00, 0x01, 10, 0, 0, 1, 0x01, 0xBB]
        );
    }
}
