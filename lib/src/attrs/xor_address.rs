use crate::attrs::address_attr::AddressAttr;
use crate::attrs::RawAttr;
use crate::constants::*;
use crate::error::DecodeError;
use crate::util;
use std::net::SocketAddrV4;

// xor-mapped-address hides the port and ip from NATs rewriting payloads
// port xor the high 16 bits of the magic cookie
// address(ipv4) xor the magic cookie

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XorMappedAddress {
    pub address: SocketAddrV4,
}

impl XorMappedAddress {
    pub fn new(address: SocketAddrV4) -> Self {
        Self { address }
    }
}

impl From<XorMappedAddress> for RawAttr {
    fn from(attr: XorMappedAddress) -> Self {
        let obfuscated = util::xor_address_v4(attr.address);
        AddressAttr::new(ATTR_XOR_MAPPED_ADDRESS, obfuscated).into()
    }
}

impl TryFrom<RawAttr> for XorMappedAddress {
    type Error = DecodeError;

    fn try_from(base_attr: RawAttr) -> Result<Self, Self::Error> {
        let address_attr: AddressAttr = base_attr.try_into()?;

        Ok(Self {
            address: util::xor_address_v4(address_attr.address),
        })
    }
}
