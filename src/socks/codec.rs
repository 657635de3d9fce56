//! SOCKS5 wire codec
//!
//! Pure encode/decode of the negotiation frames over byte buffers. Decoders
//! return `Ok(None)` while a frame is still incomplete, so they can sit
//! behind [`tokio_util::codec::Framed`] and read exactly one frame at a time.
//!
//! ```text
//! greeting          +----+----------+----------+
//!                   |VER | NMETHODS | METHODS  |
//!                   +----+----------+----------+
//! request           +----+-----+-------+------+----------+----------+
//!                   |VER | CMD |  RSV  | ATYP | DST.ADDR | DST.PORT |
//!                   +----+-----+-------+------+----------+----------+
//! reply             +----+-----+-------+------+----------+----------+
//!                   |VER | REP |  RSV  | ATYP | BND.ADDR | BND.PORT |
//!                   +----+-----+-------+------+----------+----------+
//! ```

use super::consts::*;
use super::types::{
    AddressType, BoundAddr, ConnectReply, ConnectRequest, Greeting, MethodSelection, SocksCommand,
    TargetAddr,
};
use crate::error::Socks5Error;
use bytes::{Buf, BufMut, BytesMut};
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio_util::codec::{Decoder, Encoder};

/// Decode a client greeting.
///
/// Fails fast on a bad version byte or an empty method list, before the
/// method bytes arrive.
pub fn decode_greeting(src: &mut BytesMut) -> Result<Option<Greeting>, Socks5Error> {
    if src.is_empty() {
        return Ok(None);
    }

    let version = src[0];
    if version != SOCKS5_VERSION {
        return Err(Socks5Error::UnsupportedVersion(version));
    }

    if src.len() < GREETING_HEADER_LEN {
        return Ok(None);
    }

    let num_methods = src[1] as usize;
    if num_methods == 0 {
        return Err(Socks5Error::NoMethods);
    }

    if src.len() < GREETING_HEADER_LEN + num_methods {
        return Ok(None);
    }

    src.advance(GREETING_HEADER_LEN);
    let methods = src.split_to(num_methods).to_vec();

    Ok(Some(Greeting { methods }))
}

/// Encode the method selection reply
pub fn encode_method_selection(selection: &MethodSelection) -> [u8; 2] {
    [SOCKS5_VERSION, selection.method]
}

/// Decode a CONNECT request.
///
/// The 4-byte header is validated in the order version, reserved, command,
/// address type; the address body is only waited for once the header is
/// acceptable.
pub fn decode_connect_request(src: &mut BytesMut) -> Result<Option<ConnectRequest>, Socks5Error> {
    if src.len() < REQUEST_HEADER_LEN {
        return Ok(None);
    }

    let version = src[0];
    let cmd_byte = src[1];
    let reserved = src[2];
    let atyp = src[3];

    if version != SOCKS5_VERSION {
        return Err(Socks5Error::UnsupportedVersion(version));
    }

    if reserved != SOCKS5_RESERVED {
        return Err(Socks5Error::NonZeroReserved(reserved));
    }

    let command = match SocksCommand::from_byte(cmd_byte) {
        Some(SocksCommand::Connect) => SocksCommand::Connect,
        _ => return Err(Socks5Error::UnsupportedCommand(cmd_byte)),
    };

    let addr_type =
        AddressType::from_byte(atyp).ok_or(Socks5Error::UnsupportedAddressType(atyp))?;

    let body_len = match addr_type {
        AddressType::Ipv4 => 4 + 2,
        AddressType::Ipv6 => 16 + 2,
        AddressType::Domain => {
            if src.len() < REQUEST_HEADER_LEN + 1 {
                return Ok(None);
            }
            1 + src[REQUEST_HEADER_LEN] as usize + 2
        }
    };

    if src.len() < REQUEST_HEADER_LEN + body_len {
        return Ok(None);
    }

    src.advance(REQUEST_HEADER_LEN);
    let mut body = src.split_to(body_len);

    let target = match addr_type {
        AddressType::Ipv4 => {
            let mut octets = [0u8; 4];
            body.copy_to_slice(&mut octets);
            TargetAddr::ipv4(Ipv4Addr::from(octets), body.get_u16())
        }
        AddressType::Ipv6 => {
            let mut octets = [0u8; 16];
            body.copy_to_slice(&mut octets);
            TargetAddr::ipv6(Ipv6Addr::from(octets), body.get_u16())
        }
        AddressType::Domain => {
            let len = body.get_u8() as usize;
            if len == 0 {
                return Err(Socks5Error::InvalidDomain("empty domain name".to_string()));
            }
            let name = body.split_to(len);
            let domain = String::from_utf8(name.to_vec())
                .map_err(|_| Socks5Error::InvalidDomain("domain is not valid UTF-8".to_string()))?;
            TargetAddr::domain(domain, body.get_u16())
        }
    };

    Ok(Some(ConnectRequest { command, target }))
}

/// Encode a CONNECT reply
pub fn encode_connect_reply(reply: &ConnectReply) -> Vec<u8> {
    let mut buf = vec![SOCKS5_VERSION, reply.code.into(), SOCKS5_RESERVED];

    match reply.bound {
        BoundAddr::Abbreviated => buf.push(SOCKS5_ADDR_TYPE_NONE),
        BoundAddr::ZeroFilled => {
            buf.push(SOCKS5_ADDR_TYPE_NONE);
            buf.extend_from_slice(&[0u8; ZERO_FILLED_REPLY_LEN - ABBREVIATED_REPLY_LEN]);
        }
        BoundAddr::Socket(SocketAddr::V4(addr)) => {
            buf.push(SOCKS5_ADDR_TYPE_IPV4);
            buf.extend_from_slice(&addr.ip().octets());
            buf.extend_from_slice(&addr.port().to_be_bytes());
        }
        BoundAddr::Socket(SocketAddr::V6(addr)) => {
            buf.push(SOCKS5_ADDR_TYPE_IPV6);
            buf.extend_from_slice(&addr.ip().octets());
            buf.extend_from_slice(&addr.port().to_be_bytes());
        }
    }

    buf
}

fn truncated(remaining: usize, frame: &str) -> Socks5Error {
    Socks5Error::Transport(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("stream closed with {} bytes of a partial {}", remaining, frame),
    ))
}

/// Codec for the greeting phase
#[derive(Debug, Default, Clone, Copy)]
pub struct GreetingCodec;

impl Decoder for GreetingCodec {
    type Item = Greeting;
    type Error = Socks5Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        decode_greeting(src)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => Err(truncated(src.len(), "greeting")),
        }
    }
}

impl Encoder<MethodSelection> for GreetingCodec {
    type Error = Socks5Error;

    fn encode(&mut self, item: MethodSelection, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.put_slice(&encode_method_selection(&item));
        Ok(())
    }
}

/// Codec for the request/reply phase
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestCodec;

impl Decoder for RequestCodec {
    type Item = ConnectRequest;
    type Error = Socks5Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        decode_connect_request(src)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => Err(truncated(src.len(), "request")),
        }
    }
}

impl Encoder<ConnectReply> for RequestCodec {
    type Error = Socks5Error;

    fn encode(&mut self, item: ConnectReply, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.put_slice(&encode_connect_reply(&item));
        Ok(())
    }
}
