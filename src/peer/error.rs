use thiserror::Error;

/// Why a wire protocol state machine gave up on a connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolViolation {
    /// The first 20 bytes were not the BitTorrent protocol marker.
    #[error("bad handshake marker")]
    BadHandshake,

    /// A frame announced a payload larger than we accept.
    #[error("frame of {0} bytes exceeds the maximum frame length")]
    FrameTooLarge(usize),
}

/// Errors that can occur during peer communication.
#[derive(Debug, Error)]
pub enum PeerError {
    /// Network I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The bytes handed to [`Handshake::decode`](super::Handshake::decode) are not a handshake.
    #[error("invalid handshake")]
    InvalidHandshake,

    /// The peer's info hash doesn't match ours.
    #[error("info hash mismatch")]
    InfoHashMismatch,

    /// The connection's wire state machine entered its error state.
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolViolation),

    /// The connection was closed by the peer.
    #[error("connection closed")]
    ConnectionClosed,

    /// Operation timed out.
    #[error("timeout")]
    Timeout,
}
