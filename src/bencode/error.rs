use thiserror::Error;

/// Structural errors raised while decoding bencode.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BencodeError {
    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("invalid integer: {0}")]
    InvalidInteger(String),

    #[error("invalid string length")]
    InvalidStringLength,

    #[error("byte string declares {declared} bytes but only {available} remain")]
    TruncatedString { declared: usize, available: usize },

    #[error("unexpected character {0:?} at offset {1}")]
    UnexpectedChar(char, usize),

    #[error("dictionary key without a value")]
    MissingDictValue,

    #[error("trailing data after value")]
    TrailingData,
}
