use crate::constants::{MAGIC_COOKIE, MAGIC_COOKIE_BYTES, TRANS_ID_LEN};
use crate::header::TransId;
use rand::prelude::*;
use std::fmt::Write as _;
use std::io;
use std::net::{Ipv4Addr, SocketAddrV4};

pub fn print_bytes(buf: &[u8], separator: &str, row_width: usize) -> String {
    let mut hex = String::new();
    buf.iter().enumerate().for_each(|(x, y)| {
        let _ = write!(hex, "{:02X}", y);
        if (x + 1) % row_width == 0 {
            hex.push('\n');
        } else {
            hex.push_str(separator);
        }
    });

    hex
}

// only a correlation aid, thread_rng is enough
pub fn new_trans_id() -> TransId {
    let mut trans_id = [0u8; TRANS_ID_LEN];
    rand::thread_rng().fill_bytes(&mut trans_id);
    trans_id
}

// the same operation obfuscates and restores
pub fn xor_address_v4(addr: SocketAddrV4) -> SocketAddrV4 {
    let magic_prefix = (MAGIC_COOKIE >> 16) as u16;
    let port = addr.port() ^ magic_prefix;

    let src_buf = addr.ip().octets();
    let mut buf = [0_u8; 4];
    for i in 0..buf.len() {
        buf[i] = src_buf[i] ^ MAGIC_COOKIE_BYTES[i];
    }

    SocketAddrV4::new(Ipv4Addr::from(buf), port)
}

// icmp feedback some platforms surface on udp sockets
pub fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionRefused
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_print_bytes_rows() {
        let hex = print_bytes(&[0x21, 0x12, 0xA4, 0x42, 0x01], " ", 4);
        assert_eq!(hex, "21 12 A4 42\n01 ");
    }

    #[test]
    fn test_xor_address_v4() {
        let addr = SocketAddrV4::new(Ipv4Addr::new(203, 0, 113, 5), 54321);
        let xor = xor_address_v4(addr);

        assert_eq!(xor.port(), 54321 ^ 0x2112);
        assert_eq!(xor.ip().octets(), [203 ^ 0x21, 0x12, 113 ^ 0xA4, 5 ^ 0x42]);
        assert_eq!(xor_address_v4(xor), addr);
    }

    #[test]
    fn test_new_trans_id_differs() {
        assert_ne!(new_trans_id(), new_trans_id());
    }
}
