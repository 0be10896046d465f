use crate::attrs::RawAttr;
use crate::constants::*;
use crate::error::DecodeError;
use bytes::{BufMut, BytesMut};
use std::net::{Ipv4Addr, SocketAddrV4};

// mapped-address value:
// 1 byte reserved, 1 byte family, 2 bytes port, 4 bytes ipv4
// ipv6 (family 0x02) is rejected

const IPV4_VALUE_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressAttr {
    pub attr_type: u16,
    pub address: SocketAddrV4,
}

impl AddressAttr {
    pub fn new(attr_type: u16, address: SocketAddrV4) -> Self {
        Self { attr_type, address }
    }
}

impl From<AddressAttr> for RawAttr {
    fn from(attr: AddressAttr) -> Self {
        let mut bytes_buf = BytesMut::with_capacity(IPV4_VALUE_LEN);

        bytes_buf.put_u8(0);
        bytes_buf.put_u8(ATTR_FAMILY_IPV4);
        bytes_buf.put_u16(attr.address.port());
        bytes_buf.put_slice(&attr.address.ip().octets());

        RawAttr::new(attr.attr_type, bytes_buf.freeze())
    }
}

impl TryFrom<RawAttr> for AddressAttr {
    type Error = DecodeError;

    fn try_from(base_attr: RawAttr) -> Result<Self, Self::Error> {
        let attr_type = base_attr.attr_type;
        let value = &base_attr.value[..];

        // family byte first, a v6 address must not be reported as truncated
        if value.len() < 2 {
            return Err(DecodeError::TruncatedAttribute {
                attr_type,
                needed: IPV4_VALUE_LEN,
                available: value.len(),
            });
        }

        let family = value[1];
        if family != ATTR_FAMILY_IPV4 {
            return Err(DecodeError::UnsupportedFamily(family));
        }

        if value.len() < IPV4_VALUE_LEN {
            return Err(DecodeError::TruncatedAttribute {
                attr_type,
                needed: IPV4_VALUE_LEN,
                available: value.len(),
            });
        }

        let port = u16::from_be_bytes([value[2], value[3]]);
        let ip = Ipv4Addr::new(value[4], value[5], value[6], value[7]);

        Ok(Self {
            attr_type,
            address: SocketAddrV4::new(ip, port),
        })
    }
}
