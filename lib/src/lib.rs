//! STUN binding discovery and UDP hole punching.
//!
//! [`client::discover`] learns the external endpoint of a fresh socket,
//! [`punch::PunchSession`] punches from that same socket toward a peer and
//! [`duplex::DuplexTransport`] carries messages once the path is open.

pub mod attrs;
pub mod binding;
pub mod client;
pub mod constants;
pub mod duplex;
pub mod error;
pub mod header;
pub mod packet;
pub mod punch;
pub mod util;

pub use binding::{decode_binding_response, encode_binding_request, ExternalEndpoint};
pub use client::{discover, Discovery};
pub use duplex::{DuplexSender, DuplexTransport};
pub use error::{DecodeError, DiscoveryError, PunchError};
pub use punch::{punch, AbortHandle, FailReason, PunchConfig, PunchOutcome, PunchSession, PunchState};
