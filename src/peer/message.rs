use super::error::PeerError;
use crate::constants::{FRAME_HEADER_LEN, HANDSHAKE_LEN, PROTOCOL_LABEL};
use bytes::{BufMut, Bytes, BytesMut};

/// The opening message of a peer connection.
///
/// Layout: `0x13`, `"BitTorrent protocol"`, 8 reserved bytes, info hash, peer id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub reserved: [u8; 8],
    pub info_hash: [u8; 20],
    pub peer_id: [u8; 20],
}

impl Handshake {
    /// Creates a handshake with every reserved bit cleared.
    pub fn new(info_hash: [u8; 20], peer_id: [u8; 20]) -> Self {
        Self {
            reserved: [0u8; 8],
            info_hash,
            peer_id,
        }
    }

    pub fn with_reserved(mut self, reserved: [u8; 8]) -> Self {
        self.reserved = reserved;
        self
    }

    pub fn supports_extension_protocol(&self) -> bool {
        (self.reserved[5] & 0x10) != 0
    }

    pub fn supports_fast_extension(&self) -> bool {
        (self.reserved[7] & 0x04) != 0
    }

    pub fn supports_dht(&self) -> bool {
        (self.reserved[7] & 0x01) != 0
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HANDSHAKE_LEN);
        buf.put_u8(PROTOCOL_LABEL.len() as u8);
        buf.put_slice(PROTOCOL_LABEL);
        buf.put_slice(&self.reserved);
        buf.put_slice(&self.info_hash);
        buf.put_slice(&self.peer_id);
        buf.freeze()
    }

    /// Decodes the first [`HANDSHAKE_LEN`] bytes of `data`.
    pub fn decode(data: &[u8]) -> Result<Self, PeerError> {
        if data.len() < HANDSHAKE_LEN {
            return Err(PeerError::InvalidHandshake);
        }

        if !has_protocol_marker(data) {
            return Err(PeerError::InvalidHandshake);
        }

        let mut reserved = [0u8; 8];
        reserved.copy_from_slice(&data[20..28]);

        let mut info_hash = [0u8; 20];
        info_hash.copy_from_slice(&data[28..48]);

        let mut peer_id = [0u8; 20];
        peer_id.copy_from_slice(&data[48..68]);

        Ok(Self {
            reserved,
            info_hash,
            peer_id,
        })
    }
}

fn has_protocol_marker(data: &[u8]) -> bool {
    data.len() >= 20 && data[0] as usize == PROTOCOL_LABEL.len() && &data[1..20] == PROTOCOL_LABEL
}

/// One length-prefixed frame, kept exactly as it arrived.
///
/// The payload is not interpreted beyond exposing its first byte as the
/// message id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    frame: Bytes,
}

impl RawMessage {
    pub fn keep_alive() -> Self {
        Self {
            frame: Bytes::from_static(&[0, 0, 0, 0]),
        }
    }

    /// Frames a message with the given id and body.
    ///
    /// ```
    /// use bitpaito::peer::RawMessage;
    ///
    /// let have = RawMessage::new(4, &7u32.to_be_bytes());
    /// assert_eq!(have.as_bytes(), &[0, 0, 0, 5, 4, 0, 0, 0, 7]);
    /// assert_eq!(have.id(), Some(4));
    /// ```
    pub fn new(id: u8, body: &[u8]) -> Self {
        let mut buf = BytesMut::with_capacity(FRAME_HEADER_LEN + 1 + body.len());
        buf.put_u32(1 + body.len() as u32);
        buf.put_u8(id);
        buf.put_slice(body);
        Self {
            frame: buf.freeze(),
        }
    }

    /// Wraps a complete frame whose prefix matches its length.
    pub(crate) fn from_frame(frame: Bytes) -> Self {
        debug_assert!(frame.len() >= FRAME_HEADER_LEN);
        Self { frame }
    }

    pub fn is_keep_alive(&self) -> bool {
        self.frame.len() == FRAME_HEADER_LEN
    }

    pub fn id(&self) -> Option<u8> {
        self.payload().first().copied()
    }

    /// Everything after the length prefix.
    pub fn payload(&self) -> &[u8] {
        &self.frame[FRAME_HEADER_LEN..]
    }

    /// The payload without its id byte.
    pub fn body(&self) -> &[u8] {
        self.payload().get(1..).unwrap_or_default()
    }

    /// The frame including its length prefix.
    pub fn as_bytes(&self) -> &[u8] {
        &self.frame
    }

    pub fn len(&self) -> usize {
        self.frame.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.is_empty()
    }
}
