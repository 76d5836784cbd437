//! KRPC over UDP for the Distributed Hash Table (BEP-5)
//!
//! This module implements the transaction-correlated request/response
//! engine that DHT nodes use to talk to each other, plus the BEP-42
//! node id consistency check consumed by higher layers.

mod config;
mod error;
mod message;
mod node;
pub mod node_id_security;
mod server;
mod transaction;

pub use config::DhtConfig;
pub use error::DhtError;
pub use message::{KrpcBody, KrpcMessage, TransactionId};
pub use node::{decode_compact_addr, encode_compact_addr, NodeId, Peer, NODE_ID_LEN};
pub use server::{DatagramTransport, KrpcEngine};
pub use transaction::TransactionIds;
