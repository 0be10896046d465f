// 0x2112A442
pub const MAGIC_COOKIE: u32 = 0x2112_A442;
pub const MAGIC_COOKIE_BYTES: [u8; 4] = MAGIC_COOKIE.to_be_bytes();

pub const TRANS_ID_LEN: usize = 12;
pub const HEADER_LEN: usize = 20;
pub const ATTR_HEADER_LEN: usize = 4;

pub const MESSAGE_TYPE_BIND_REQ: u16 = 0x0001;
pub const MESSAGE_TYPE_BIND_RES: u16 = 0x0101;
pub const MESSAGE_TYPE_BIND_ERR_RES: u16 = 0x0111;

pub const ATTR_FAMILY_IPV4: u8 = 0x01;
pub const ATTR_FAMILY_IPV6: u8 = 0x02;

pub const ATTR_MAPPED_ADDRESS: u16 = 0x0001;
pub const ATTR_XOR_MAPPED_ADDRESS: u16 = 0x0020;

// reserved hole punch datagrams, never delivered as chat messages
pub const PUNCH_TOKEN: &[u8] = b"PUNCH";
pub const PUNCH_ACK_TOKEN: &[u8] = b"K_PUNCH";
pub const KEEPALIVE_TOKEN: &[u8] = b"KEEP";

pub fn is_reserved_token(data: &[u8]) -> bool {
    data == PUNCH_TOKEN || data == PUNCH_ACK_TOKEN
}
