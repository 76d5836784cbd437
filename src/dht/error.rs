use thiserror::Error;

#[derive(Debug, Error)]
pub enum DhtError {
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bencode error: {0}")]
    Bencode(#[from] crate::bencode::BencodeError),

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("invalid node id length")]
    InvalidNodeId,

    #[error("timeout")]
    Timeout,

    /// The queried node answered with a KRPC error.
    #[error("remote error {code}: {message}")]
    Remote { code: i64, message: String },

    /// Every transaction id towards this peer, or the global pending limit, is in use.
    #[error("too many pending queries")]
    TooManyPending,
}
