//! SOCKS5 module for Socksrelay
//!
//! Implements the CONNECT subset of RFC 1928 with the "no authentication"
//! method only: wire codec, target resolution, the negotiation state
//! machine and the bidirectional relay.

mod codec;
mod consts;
mod handler;
mod negotiation;
mod resolver;
mod tcp_relay;
mod types;

pub use codec::{
    decode_connect_request, decode_greeting, encode_connect_reply, encode_method_selection,
    GreetingCodec, RequestCodec,
};
pub use consts::*;
pub use handler::{handle_socks5_on_stream, SessionContext};
pub use negotiation::{
    negotiate, Established, NegotiationError, NegotiationOptions, NegotiationState,
};
pub use resolver::{resolve, Resolve, SystemResolver};
pub use tcp_relay::{relay_tcp, Direction, RelayOptions, RelayStats};
pub use types::{
    AddressType, BoundAddr, ConnectReply, ConnectRequest, Greeting, MethodSelection,
    ResolvedTarget, SocksCommand, TargetAddr,
};
