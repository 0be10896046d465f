use crate::attrs::RawAttr;
use crate::constants::*;
use crate::error::DecodeError;
use crate::header::Header;
use bytes::{BufMut, Bytes, BytesMut};

const MAX_ATTRS: usize = 32;

// a whole stun message, header length kept in sync with the attributes

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub header: Header,
    pub attrs: Vec<RawAttr>,
}

impl Packet {
    pub fn new(header: Header, attrs: Vec<RawAttr>) -> Self {
        let mut packet = Self { header, attrs };
        packet.update_header_len();
        packet
    }

    fn update_header_len(&mut self) {
        let total = self.attrs.iter().fold(0_usize, |acc, x| acc + x.len());
        self.header.msg_len = total as u16;
    }

    pub fn add_attr(&mut self, attr: RawAttr) {
        self.attrs.push(attr);
        self.update_header_len();
    }

    pub fn find_attr(&self, attr_type: u16) -> Option<&RawAttr> {
        self.attrs.iter().find(|x| x.attr_type == attr_type)
    }

    pub fn pack(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_LEN + self.header.msg_len as usize);
        buf.put_slice(&self.header.pack());
        for v in self.attrs.iter() {
            buf.put_slice(&v.pack());
        }

        buf.freeze()
    }

    /// Strict parse: the header length must match the buffer exactly.
    pub fn unpack(buf: &[u8]) -> Result<Self, DecodeError> {
        let header = Header::unpack(buf)?;
        let mut body = &buf[HEADER_LEN..];

        if header.msg_len as usize != body.len() {
            return Err(DecodeError::LengthMismatch {
                declared: header.msg_len as usize,
                actual: body.len(),
            });
        }

        let mut attr_list = vec![];

        while !body.is_empty() {
            if attr_list.len() == MAX_ATTRS {
                return Err(DecodeError::TooManyAttrs);
            }

            let attr = RawAttr::unpack(body)?;
            body = body.get(attr.len()..).unwrap_or(&[]);
            attr_list.push(attr);
        }

        Ok(Self {
            header,
            attrs: attr_list,
        })
    }
}
