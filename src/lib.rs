//! bitpaito - BitTorrent DHT and peer wire plumbing
//!
//! The pieces a BitTorrent node needs to talk to the DHT and to other peers,
//! following BEP (BitTorrent Enhancement Proposals) specifications.
//!
//! # Modules
//!
//! - [`bencode`] - BEP-3 Bencode encoding/decoding
//! - [`dht`] - BEP-5 KRPC transaction engine, BEP-42 node id checks
//! - [`peer`] - BEP-3 Peer wire handshake and message framing
//! - [`constants`] - Protocol constants and defaults

pub mod bencode;
pub mod constants;
pub mod dht;
pub mod peer;

pub use bencode::{decode, encode, BencodeError, Dict, Value};
pub use dht::{DhtConfig, DhtError, KrpcEngine, KrpcMessage, NodeId};
pub use peer::{Handshake, PeerError, PeerId, PeerTransport, RawMessage, WireProtocol, WireState};
