//! Protocol constants and tuning parameters.

use std::time::Duration;

// ============================================================================
// Client identification
// ============================================================================

/// Client ID prefix for peer ID generation (Azureus-style)
pub const CLIENT_PREFIX: &[u8; 8] = b"-BP0001-";

/// KRPC `v` tag: two-letter client code followed by a two-byte version
pub const CLIENT_VERSION: &[u8] = b"BP01";

// ============================================================================
// DHT (BEP-5)
// ============================================================================

/// Default DHT UDP port
pub const DEFAULT_DHT_PORT: u16 = 6881;

/// How long a KRPC query waits for a reply
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(15);

/// Outstanding queries allowed across all peers
pub const MAX_PENDING_QUERIES: usize = 256;

/// Peers remembered by the engine before the least recently heard from is evicted
pub const MAX_PEERS: usize = 4096;

/// Number of distinct single-byte transaction ids; 255 itself is never issued
pub const TRANSACTION_ID_SPACE: u16 = 255;

/// Largest datagram read from the socket
pub const MAX_DATAGRAM_SIZE: usize = 65535;

/// KRPC error code for an unsupported query method
pub const ERROR_METHOD_UNKNOWN: i64 = 204;

// ============================================================================
// Peer wire protocol (BEP-3)
// ============================================================================

/// Protocol label following the length byte of the handshake
pub const PROTOCOL_LABEL: &[u8; 19] = b"BitTorrent protocol";

/// Handshake size: 1 + 19 + 8 + 20 + 20
pub const HANDSHAKE_LEN: usize = 68;

/// Size of the big-endian length prefix of every frame
pub const FRAME_HEADER_LEN: usize = 4;

/// Frames announcing a larger payload are rejected
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Bytes requested from the peer stream per read
pub const READ_CHUNK_SIZE: usize = 32 * 1024;

/// TCP connect timeout for outbound peer connections
pub const PEER_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Time allowed for the peer's handshake to arrive after ours is sent
pub const PEER_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Peer stream read timeout
pub const PEER_READ_TIMEOUT: Duration = Duration::from_secs(120);

/// Peer stream write timeout
pub const PEER_WRITE_TIMEOUT: Duration = Duration::from_secs(30);
