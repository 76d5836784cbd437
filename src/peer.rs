//! Peer wire protocol framing (BEP-3)
//!
//! A connection opens with a fixed 68-byte handshake and then carries
//! length-prefixed frames. [`WireProtocol`] turns arbitrarily chunked input
//! into a handshake plus an ordered list of [`RawMessage`]s without
//! interpreting message payloads. [`PeerTransport`] drives it from any
//! tokio byte stream.

mod error;
mod message;
mod peer_id;
mod transport;
mod wire;

pub use error::{PeerError, ProtocolViolation};
pub use message::{Handshake, RawMessage};
pub use peer_id::PeerId;
pub use transport::PeerTransport;
pub use wire::{WireProtocol, WireState};

#[cfg(test)]
mod tests;
