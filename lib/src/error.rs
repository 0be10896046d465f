use crate::punch::PunchState;
use std::io;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("buf len:{len} < stun header len")]
    TooShort { len: usize },

    #[error("not a binding success response, message type: {0:#06x}")]
    WrongMessageType(u16),

    #[error("bad magic cookie: {0:#010x}")]
    BadMagicCookie(u32),

    #[error("response transaction id does not match the request")]
    WrongTransactionId,

    // attribute header or value runs past the end of the buffer
    #[error("attr {attr_type:#06x} needs {needed} bytes, only {available} left")]
    TruncatedAttribute {
        attr_type: u16,
        needed: usize,
        available: usize,
    },

    #[error("unsupported address family: {0:#04x}")]
    UnsupportedFamily(u8),

    #[error("no mapped address attribute in response")]
    NoAddressAttribute,

    #[error("header len:{declared} != {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("too many attributes")]
    TooManyAttrs,
}

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("can't resolve stun server {0}")]
    Resolution(String),

    #[error("no response from {server} within {waited_ms}ms")]
    Timeout { server: String, waited_ms: u128 },

    #[error("bad stun response: {0}")]
    Protocol(#[from] DecodeError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Error, Debug)]
pub enum PunchError {
    #[error("invalid peer address: {0}")]
    InvalidPeer(String),

    #[error("invalid punch config: {0}")]
    InvalidConfig(String),

    #[error("session already started, state: {0}")]
    AlreadyStarted(PunchState),

    #[error(transparent)]
    Io(#[from] io::Error),
}
