use bytes::Bytes;
use std::net::{Ipv4Addr, SocketAddrV4};

use punch_rs::attrs::address_attr::AddressAttr;
use punch_rs::attrs::xor_address::XorMappedAddress;
use punch_rs::attrs::RawAttr;
use punch_rs::constants::*;
use punch_rs::header::{Header, TransId};
use punch_rs::packet::Packet;
use punch_rs::{decode_binding_response, encode_binding_request, DecodeError, ExternalEndpoint};

const TRANS_ID: TransId = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12];

fn mapped() -> SocketAddrV4 {
    SocketAddrV4::new(Ipv4Addr::new(203, 0, 113, 5), 54321)
}

fn response(msg_type: u16, trans_id: TransId, attrs: Vec<RawAttr>) -> Bytes {
    Packet::new(Header::new(msg_type, 0, trans_id), attrs).pack()
}

#[test]
fn test_decode_xor_mapped_address() {
    let request = encode_binding_request(TRANS_ID);
    assert_eq!(&request[8..], &TRANS_ID);

    let buf = response(
        MESSAGE_TYPE_BIND_RES,
        TRANS_ID,
        vec![XorMappedAddress::new(mapped()).into()],
    );

    let ep = decode_binding_response(&buf, &TRANS_ID).unwrap();
    assert_eq!(ep, ExternalEndpoint::new(Ipv4Addr::new(203, 0, 113, 5), 54321));
}

#[test]
fn test_decode_hand_built_xor_bytes() {
    let mut buf = vec![0x01, 0x01, 0x00, 0x0c, 0x21, 0x12, 0xA4, 0x42];
    buf.extend_from_slice(&TRANS_ID);
    // XOR-MAPPED-ADDRESS, len 8, family v4
    buf.extend_from_slice(&[0x00, 0x20, 0x00, 0x08, 0x00, 0x01]);
    buf.extend_from_slice(&(54321_u16 ^ 0x2112).to_be_bytes());
    buf.extend_from_slice(&[203 ^ 0x21, 0x12, 113 ^ 0xA4, 5 ^ 0x42]);

    let ep = decode_binding_response(&buf, &TRANS_ID).unwrap();
    assert_eq!(SocketAddrV4::from(ep), mapped());
}

#[test]
fn test_decode_mapped_address() {
    let buf = response(
        MESSAGE_TYPE_BIND_RES,
        TRANS_ID,
        vec![AddressAttr::new(ATTR_MAPPED_ADDRESS, mapped()).into()],
    );

    let ep = decode_binding_response(&buf, &TRANS_ID).unwrap();
    assert_eq!(SocketAddrV4::from(ep), mapped());
}

#[test]
fn test_first_address_attr_wins() {
    let other = SocketAddrV4::new(Ipv4Addr::new(198, 51, 100, 1), 1000);
    let buf = response(
        MESSAGE_TYPE_BIND_RES,
        TRANS_ID,
        vec![
            AddressAttr::new(ATTR_MAPPED_ADDRESS, other).into(),
            XorMappedAddress::new(mapped()).into(),
        ],
    );

    let ep = decode_binding_response(&buf, &TRANS_ID).unwrap();
    assert_eq!(SocketAddrV4::from(ep), other);
}

#[test]
fn test_too_short() {
    let buf = response(MESSAGE_TYPE_BIND_RES, TRANS_ID, vec![]);
    for len in 0..HEADER_LEN {
        assert_eq!(
            decode_binding_response(&buf[..len], &TRANS_ID),
            Err(DecodeError::TooShort { len })
        );
    }
}

#[test]
fn test_wrong_message_type() {
    let buf = response(
        MESSAGE_TYPE_BIND_ERR_RES,
        TRANS_ID,
        vec![XorMappedAddress::new(mapped()).into()],
    );

    assert_eq!(
        decode_binding_response(&buf, &TRANS_ID),
        Err(DecodeError::WrongMessageType(0x0111))
    );
}

#[test]
fn test_bad_magic_cookie() {
    let mut buf = response(MESSAGE_TYPE_BIND_RES, TRANS_ID, vec![]).to_vec();
    buf[4] = 0;

    assert_eq!(
        decode_binding_response(&buf, &TRANS_ID),
        Err(DecodeError::BadMagicCookie(0x0012_A442))
    );
}

#[test]
fn test_wrong_transaction_id() {
    let mut other = TRANS_ID;
    other[11] ^= 0xff;
    let buf = response(
        MESSAGE_TYPE_BIND_RES,
        other,
        vec![XorMappedAddress::new(mapped()).into()],
    );

    assert_eq!(
        decode_binding_response(&buf, &TRANS_ID),
        Err(DecodeError::WrongTransactionId)
    );
}

#[test]
fn test_attribute_padding_is_skipped() {
    let dummy = RawAttr::new(0x8022, Bytes::from_static(b"abcde"));
    assert_eq!(dummy.len(), 12);

    let buf = response(
        MESSAGE_TYPE_BIND_RES,
        TRANS_ID,
        vec![dummy, XorMappedAddress::new(mapped()).into()],
    );
    assert_eq!(buf.len(), HEADER_LEN + 12 + 12);

    let ep = decode_binding_response(&buf, &TRANS_ID).unwrap();
    assert_eq!(SocketAddrV4::from(ep), mapped());
}

#[test]
fn test_truncated_attribute() {
    let buf = response(
        MESSAGE_TYPE_BIND_RES,
        TRANS_ID,
        vec![XorMappedAddress::new(mapped()).into()],
    );
    let cut = &buf[..buf.len() - 3];

    assert!(matches!(
        decode_binding_response(cut, &TRANS_ID),
        Err(DecodeError::TruncatedAttribute {
            attr_type: ATTR_XOR_MAPPED_ADDRESS,
            needed: 12,
            available: 9
        })
    ));
}

#[test]
fn test_length_field_past_buffer() {
    let mut buf = response(MESSAGE_TYPE_BIND_RES, TRANS_ID, vec![]).to_vec();
    buf[3] = 8;

    assert!(matches!(
        decode_binding_response(&buf, &TRANS_ID),
        Err(DecodeError::TruncatedAttribute { available: 0, .. })
    ));
}

#[test]
fn test_attribute_past_message_length() {
    // length field covers only the attribute header, the value follows it
    let mut buf = Header::new(MESSAGE_TYPE_BIND_RES, 4, TRANS_ID).pack().to_vec();
    buf.extend_from_slice(&RawAttr::from(XorMappedAddress::new(mapped())).pack());

    assert_eq!(
        decode_binding_response(&buf, &TRANS_ID),
        Err(DecodeError::TruncatedAttribute {
            attr_type: ATTR_XOR_MAPPED_ADDRESS,
            needed: 12,
            available: 4
        })
    );
}

#[test]
fn test_no_address_attribute() {
    let buf = response(
        MESSAGE_TYPE_BIND_RES,
        TRANS_ID,
        vec![RawAttr::new(0x8022, Bytes::from_static(b"server"))],
    );

    assert_eq!(
        decode_binding_response(&buf, &TRANS_ID),
        Err(DecodeError::NoAddressAttribute)
    );
}

#[test]
fn test_ipv6_family_rejected() {
    let mut value = vec![0_u8, ATTR_FAMILY_IPV6, 0x1f, 0x90];
    value.extend_from_slice(&[0_u8; 16]);
    let buf = response(
        MESSAGE_TYPE_BIND_RES,
        TRANS_ID,
        vec![
            RawAttr::new(ATTR_XOR_MAPPED_ADDRESS, Bytes::from(value)),
            AddressAttr::new(ATTR_MAPPED_ADDRESS, mapped()).into(),
        ],
    );

    assert_eq!(
        decode_binding_response(&buf, &TRANS_ID),
        Err(DecodeError::UnsupportedFamily(ATTR_FAMILY_IPV6))
    );
}

#[test]
fn test_bytes_after_message_length_ignored() {
    let mut buf = response(MESSAGE_TYPE_BIND_RES, TRANS_ID, vec![]).to_vec();
    buf.extend_from_slice(&RawAttr::from(XorMappedAddress::new(mapped())).pack());

    assert_eq!(
        decode_binding_response(&buf, &TRANS_ID),
        Err(DecodeError::NoAddressAttribute)
    );
}
