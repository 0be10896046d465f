#![allow(clippy::vec_init_then_push)]

use std::net::SocketAddrV4;
use punch_rs::attrs::address_attr::AddressAttr;
use punch_rs::attrs::xor_address::XorMappedAddress;
use punch_rs::attrs::RawAttr;

use bytes::Bytes;
use punch_rs::constants::*;
use punch_rs::error::DecodeError;
use punch_rs::header::Header;
use punch_rs::packet::Packet;
use punch_rs::util;

#[test]
pub fn test_new_trans_id() {
    let trans_id = util::new_trans_id();
    assert_eq!(trans_id.len(), TRANS_ID_LEN);
    println!("{}", util::print_bytes(&trans_id, " ", 8));
}

#[test]
pub fn test_header_pack_unpack() {
    let trans_id = util::new_trans_id();
    let header = Header::new(MESSAGE_TYPE_BIND_RES, 12, trans_id);
    let buf = header.pack();

    assert_eq!(buf.len(), HEADER_LEN);
    assert_eq!(&buf[4..8], &MAGIC_COOKIE_BYTES);

    let unpacked = Header::unpack(&buf).unwrap();
    assert_eq!(unpacked, header);
}

#[test]
pub fn test_raw_attr_padding() {
    let attr = RawAttr::new(0x8022, Bytes::from_static(b"hello"));
    assert_eq!(attr.len(), 12);

    let buf = attr.pack();
    assert_eq!(buf.len(), 12);
    assert_eq!(&buf[..4], &[0x80, 0x22, 0x00, 0x05]);
    assert_eq!(&buf[9..], &[0, 0, 0]);

    let unpacked = RawAttr::unpack(&buf).unwrap();
    assert_eq!(unpacked, attr);
}

#[test]
pub fn test_unpack_response() {
    let trans_id = util::new_trans_id();

    let header = Header::new(MESSAGE_TYPE_BIND_RES, 0, trans_id);
    let mut attr_list = Vec::new();

    let mapped_addr: SocketAddrV4 = "192.168.8.100:5678".parse().expect("unable to parse");

    attr_list.push(RawAttr::new(0x8022, Bytes::from_static(b"srv")));
    attr_list.push(AddressAttr::new(ATTR_MAPPED_ADDRESS, mapped_addr).into());
    attr_list.push(XorMappedAddress::new(mapped_addr).into());

    let packet = Packet::new(header, attr_list);
    assert_eq!(packet.header.msg_len, 8 + 12 + 12);

    let buf = packet.pack();
    println!("{}", util::print_bytes(&buf, " ", 8));

    let unpacked = Packet::unpack(&buf).unwrap();
    assert_eq!(unpacked, packet);

    let xor_attr = unpacked.find_attr(ATTR_XOR_MAPPED_ADDRESS).unwrap().clone();
    let xor: XorMappedAddress = xor_attr.try_into().unwrap();
    assert_eq!(xor.address, mapped_addr);
}

#[test]
pub fn test_unpack_length_mismatch() {
    let trans_id = util::new_trans_id();
    let packet = Packet::new(Header::new(MESSAGE_TYPE_BIND_REQ, 0, trans_id), vec![]);
    let mut buf = packet.pack().to_vec();
    buf.extend_from_slice(&[0, 0, 0, 0]);

    assert_eq!(
        Packet::unpack(&buf),
        Err(DecodeError::LengthMismatch {
            declared: 0,
            actual: 4
        })
    );
}

#[test]
pub fn test_address_attr_rejects_ipv6() {
    let mut value = vec![0_u8, ATTR_FAMILY_IPV6, 0x1f, 0x90];
    value.extend_from_slice(&[0_u8; 16]);
    let attr = RawAttr::new(ATTR_MAPPED_ADDRESS, Bytes::from(value));

    let parsed: Result<AddressAttr, _> = attr.try_into();
    assert_eq!(parsed, Err(DecodeError::UnsupportedFamily(ATTR_FAMILY_IPV6)));
}
