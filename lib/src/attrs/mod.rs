#![allow(clippy::len_without_is_empty)]

use crate::constants::ATTR_HEADER_LEN;
use crate::error::DecodeError;
use bytes::{BufMut, Bytes, BytesMut};

pub mod address_attr;
pub mod xor_address;

// value length rounded up to the next multiple of 4
pub fn pad4(len: usize) -> usize {
    (len + 3) & !3
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAttr {
    pub attr_type: u16,
    pub attr_len: u16,
    pub value: Bytes,
}

impl RawAttr {
    pub fn new(attr_type: u16, value: Bytes) -> Self {
        Self {
            attr_type,
            attr_len: value.len() as u16,
            value,
        }
    }

    /// Bytes taken on the wire, header and padding included.
    pub fn len(&self) -> usize {
        ATTR_HEADER_LEN + pad4(self.attr_len as usize)
    }

    pub fn pack(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.len());

        buf.put_u16(self.attr_type);
        buf.put_u16(self.attr_len);
        buf.put_slice(&self.value);
        buf.put_bytes(0, pad4(self.value.len()) - self.value.len());

        buf.freeze()
    }

    /// Reads one attribute from the front of `buf`. Trailing padding is not
    /// required to be present, the caller advances by `len()`.
    pub fn unpack(buf: &[u8]) -> Result<Self, DecodeError> {
        if buf.len() < ATTR_HEADER_LEN {
            let attr_type = match buf {
                [a, b, ..] => u16::from_be_bytes([*a, *b]),
                _ => 0,
            };
            return Err(DecodeError::TruncatedAttribute {
                attr_type,
                needed: ATTR_HEADER_LEN,
                available: buf.len(),
            });
        }

        let attr_type = u16::from_be_bytes([buf[0], buf[1]]);
        let attr_len = u16::from_be_bytes([buf[2], buf[3]]);

        let end = ATTR_HEADER_LEN + attr_len as usize;
        if buf.len() < end {
            return Err(DecodeError::TruncatedAttribute {
                attr_type,
                needed: end,
                available: buf.len(),
            });
        }

        Ok(Self {
            attr_type,
            attr_len,
            value: Bytes::copy_from_slice(&buf[ATTR_HEADER_LEN..end]),
        })
    }
}
