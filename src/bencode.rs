//! Bencode encoding and decoding ([BEP-3]).
//!
//! Bencode is the serialization format behind every KRPC message exchanged on
//! the DHT.
//!
//! # Data Types
//!
//! | Type | Format | Example |
//! |------|--------|---------|
//! | Integer | `i<number>e` | `i42e` → 42 |
//! | Byte String | `<length>:<data>` | `4:spam` → "spam" |
//! | List | `l<items>e` | `l4:spami42ee` → ["spam", 42] |
//! | Dictionary | `d<key><value>...e` | `d3:foo3:bare` → {"foo": "bar"} |
//!
//! Integers are arbitrary precision. Dictionaries keep the order their keys were
//! inserted (or decoded) in, and are written back in that same order.
//!
//! # Examples
//!
//! ```
//! use bitpaito::bencode::{decode, encode, Dict, Value};
//!
//! let mut rec = Dict::new();
//! rec.insert(1i64, vec![Value::from(1i64), Value::from(2i64)]);
//! rec.insert("3", 4i64);
//!
//! let mut root = Dict::new();
//! root.insert("pota", "to");
//! root.insert("rec", rec);
//!
//! let encoded = encode(&Value::Dict(root.clone()));
//! assert_eq!(encoded, b"d4:pota2:to3:recdi1eli1ei2ee1:3i4eee");
//! assert_eq!(decode(&encoded).unwrap(), Value::Dict(root));
//! ```
//!
//! # Error Handling
//!
//! - [`BencodeError::UnexpectedEof`] - Input ended inside a value
//! - [`BencodeError::TruncatedString`] - Length prefix exceeds the remaining input
//! - [`BencodeError::InvalidInteger`] - Non-digit, empty, or non-canonical integer
//! - [`BencodeError::UnexpectedChar`] - Byte that cannot start or continue a token
//! - [`BencodeError::TrailingData`] - Extra data after the value
//!
//! [BEP-3]: http://bittorrent.org/beps/bep_0003.html

mod decode;
mod encode;
mod error;
mod value;

pub use decode::decode;
pub use encode::encode;
pub use error::BencodeError;
pub use value::{Dict, Value};
