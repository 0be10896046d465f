//! Binding request encoding and binding response decoding.

use crate::attrs::address_attr::AddressAttr;
use crate::attrs::xor_address::XorMappedAddress;
use crate::attrs::RawAttr;
use crate::constants::*;
use crate::error::DecodeError;
use crate::header::{Header, TransId};
use crate::packet::Packet;
use bytes::Bytes;
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

/// The address and port a NAT maps the local socket to, as seen by a STUN
/// server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExternalEndpoint {
    pub ip: Ipv4Addr,
    pub port: u16,
}

impl ExternalEndpoint {
    pub fn new(ip: Ipv4Addr, port: u16) -> Self {
        Self { ip, port }
    }
}

impl From<SocketAddrV4> for ExternalEndpoint {
    fn from(addr: SocketAddrV4) -> Self {
        Self::new(*addr.ip(), addr.port())
    }
}

impl From<ExternalEndpoint> for SocketAddrV4 {
    fn from(ep: ExternalEndpoint) -> Self {
        SocketAddrV4::new(ep.ip, ep.port)
    }
}

impl From<ExternalEndpoint> for SocketAddr {
    fn from(ep: ExternalEndpoint) -> Self {
        SocketAddr::V4(ep.into())
    }
}

impl fmt::Display for ExternalEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

/// A 20-byte Binding Request without attributes.
pub fn encode_binding_request(trans_id: TransId) -> Bytes {
    let header = Header::new(MESSAGE_TYPE_BIND_REQ, 0, trans_id);
    Packet::new(header, vec![]).pack()
}

/// Extracts the mapped endpoint from a Binding Success Response.
///
/// The first MAPPED-ADDRESS or XOR-MAPPED-ADDRESS attribute wins. Every other
/// attribute is skipped by its padded length; the walk is bounded by the
/// header's length field, so trailing bytes after it are ignored and an
/// attribute running past it is `TruncatedAttribute`.
pub fn decode_binding_response(
    buf: &[u8],
    trans_id: &TransId,
) -> Result<ExternalEndpoint, DecodeError> {
    let header = Header::unpack(buf)?;

    if header.msg_type != MESSAGE_TYPE_BIND_RES {
        return Err(DecodeError::WrongMessageType(header.msg_type));
    }
    if header.magic_cookie != MAGIC_COOKIE {
        return Err(DecodeError::BadMagicCookie(header.magic_cookie));
    }
    if header.trans_id != *trans_id {
        return Err(DecodeError::WrongTransactionId);
    }

    let mut remaining = header.msg_len as usize;
    let mut cursor = HEADER_LEN;
    // an attribute may not reach past the declared message length
    let end = (HEADER_LEN + remaining).min(buf.len());

    while remaining > 0 {
        let attr = RawAttr::unpack(buf.get(cursor..end).unwrap_or(&[]))?;
        let consumed = attr.len();

        match attr.attr_type {
            ATTR_MAPPED_ADDRESS => {
                let attr: AddressAttr = attr.try_into()?;
                return Ok(attr.address.into());
            }
            ATTR_XOR_MAPPED_ADDRESS => {
                let attr: XorMappedAddress = attr.try_into()?;
                return Ok(attr.address.into());
            }
            _ => {}
        }

        cursor += consumed;
        remaining = remaining.saturating_sub(consumed);
    }

    Err(DecodeError::NoAddressAttribute)
}
