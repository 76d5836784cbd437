use bytes::{Buf, BytesMut};
use tracing::{debug, trace, warn};

use super::error::ProtocolViolation;
use super::message::{Handshake, RawMessage};
use crate::constants::{FRAME_HEADER_LEN, HANDSHAKE_LEN, MAX_FRAME_LEN};

/// Where a [`WireProtocol`] is in the life of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireState {
    /// Waiting for the 68-byte handshake.
    WantHandshake,
    /// Handshake accepted; parsing length-prefixed frames.
    Connected,
    /// Terminal. All further input is ignored.
    Error,
}

/// Incremental parser for the inbound half of a peer connection.
///
/// Bytes can be fed in chunks of any size; the recorded handshake, the
/// message sequence, and the final state depend only on the concatenation
/// of everything consumed.
///
/// ```
/// use bitpaito::peer::{Handshake, RawMessage, WireProtocol, WireState};
///
/// let mut stream = Handshake::new([1; 20], [2; 20]).encode().to_vec();
/// stream.extend_from_slice(RawMessage::new(2, &[]).as_bytes());
///
/// let mut wire = WireProtocol::new();
/// for byte in &stream {
///     wire.consume(std::slice::from_ref(byte));
/// }
///
/// assert_eq!(wire.state(), WireState::Connected);
/// assert_eq!(wire.messages().len(), 1);
/// ```
#[derive(Debug)]
pub struct WireProtocol {
    state: WireState,
    buffer: BytesMut,
    handshake: Option<Handshake>,
    messages: Vec<RawMessage>,
    violation: Option<ProtocolViolation>,
}

impl Default for WireProtocol {
    fn default() -> Self {
        Self::new()
    }
}

impl WireProtocol {
    pub fn new() -> Self {
        Self {
            state: WireState::WantHandshake,
            buffer: BytesMut::new(),
            handshake: None,
            messages: Vec::new(),
            violation: None,
        }
    }

    /// Appends `data` and parses as far as the buffered bytes allow.
    pub fn consume(&mut self, data: &[u8]) {
        if self.state == WireState::Error {
            return;
        }

        self.buffer.extend_from_slice(data);

        loop {
            match self.state {
                WireState::WantHandshake => {
                    if self.buffer.len() < HANDSHAKE_LEN {
                        return;
                    }
                    let Ok(handshake) = Handshake::decode(&self.buffer[..HANDSHAKE_LEN]) else {
                        self.fail(ProtocolViolation::BadHandshake);
                        return;
                    };
                    self.buffer.advance(HANDSHAKE_LEN);
                    debug!(
                        "Handshake received from peer {}",
                        String::from_utf8_lossy(&handshake.peer_id)
                    );
                    self.handshake = Some(handshake);
                    self.state = WireState::Connected;
                }
                WireState::Connected => {
                    if self.buffer.len() < FRAME_HEADER_LEN {
                        return;
                    }
                    let length = u32::from_be_bytes([
                        self.buffer[0],
                        self.buffer[1],
                        self.buffer[2],
                        self.buffer[3],
                    ]) as usize;

                    if length > MAX_FRAME_LEN {
                        self.fail(ProtocolViolation::FrameTooLarge(length));
                        return;
                    }

                    let total = FRAME_HEADER_LEN + length;
                    if self.buffer.len() < total {
                        return;
                    }

                    let frame = self.buffer.split_to(total).freeze();
                    let message = RawMessage::from_frame(frame);
                    trace!("Parsed frame {:?} of {} bytes", message.id(), length);
                    self.messages.push(message);
                }
                WireState::Error => return,
            }
        }
    }

    fn fail(&mut self, violation: ProtocolViolation) {
        warn!("Peer wire protocol error: {}", violation);
        self.state = WireState::Error;
        self.violation = Some(violation);
        self.buffer.clear();
    }

    pub fn state(&self) -> WireState {
        self.state
    }

    pub fn handshake(&self) -> Option<&Handshake> {
        self.handshake.as_ref()
    }

    /// Every frame parsed so far that hasn't been taken.
    pub fn messages(&self) -> &[RawMessage] {
        &self.messages
    }

    pub fn take_messages(&mut self) -> Vec<RawMessage> {
        std::mem::take(&mut self.messages)
    }

    /// The reason the machine entered [`WireState::Error`], if it has.
    pub fn error(&self) -> Option<&ProtocolViolation> {
        self.violation.as_ref()
    }

    /// Bytes held back waiting for the rest of a handshake or frame.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}
