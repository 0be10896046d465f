#![allow(clippy::len_without_is_empty)]

use crate::constants::*;
use bytes::{BufMut, Bytes, BytesMut};

use crate::error::DecodeError;

pub type TransId = [u8; TRANS_ID_LEN];

// rfc 5389, 6
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub msg_type: u16,

    // attributes only, without the 20 header bytes
    pub msg_len: u16,

    pub magic_cookie: u32,

    pub trans_id: TransId,
}

impl Header {
    pub fn new(msg_type: u16, msg_len: u16, trans_id: TransId) -> Self {
        Self {
            msg_type,
            msg_len,
            magic_cookie: MAGIC_COOKIE,
            trans_id,
        }
    }

    pub fn len(&self) -> usize {
        HEADER_LEN
    }

    pub fn pack(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_LEN);
        buf.put_u16(self.msg_type);
        buf.put_u16(self.msg_len);
        buf.put_u32(self.magic_cookie);
        buf.put_slice(&self.trans_id);
        buf.freeze()
    }

    // length only, the field values are checked by the caller
    pub fn unpack(buf: &[u8]) -> Result<Self, DecodeError> {
        if buf.len() < HEADER_LEN {
            return Err(DecodeError::TooShort { len: buf.len() });
        }

        let mut index = 0_usize;
        let msg_type = u16::from_be_bytes([buf[index], buf[index + 1]]);

        index += 2;
        let msg_len = u16::from_be_bytes([buf[index], buf[index + 1]]);

        index += 2;
        let magic_cookie =
            u32::from_be_bytes([buf[index], buf[index + 1], buf[index + 2], buf[index + 3]]);

        index += 4;
        let mut trans_id = [0_u8; TRANS_ID_LEN];
        trans_id.copy_from_slice(&buf[index..HEADER_LEN]);

        Ok(Self {
            msg_type,
            msg_len,
            magic_cookie,
            trans_id,
        })
    }
}
