use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use super::error::PeerError;
use super::message::{Handshake, RawMessage};
use super::wire::WireProtocol;
use crate::constants::{
    PEER_CONNECT_TIMEOUT, PEER_HANDSHAKE_TIMEOUT, PEER_READ_TIMEOUT, PEER_WRITE_TIMEOUT,
    READ_CHUNK_SIZE,
};

/// Drives a [`WireProtocol`] from a byte stream.
///
/// Reads land in the state machine chunk by chunk as the stream hands them
/// over; writes go straight to the stream.
pub struct PeerTransport<S> {
    stream: S,
    protocol: WireProtocol,
    ready: VecDeque<RawMessage>,
    read_buf: Vec<u8>,
}

impl PeerTransport<TcpStream> {
    /// Connects to `addr`, exchanges handshakes, and checks the info hash.
    ///
    /// ```no_run
    /// use bitpaito::peer::{Handshake, PeerId, PeerTransport};
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let addr = "192.168.1.100:6881".parse()?;
    /// let ours = Handshake::new([0u8; 20], *PeerId::generate().as_bytes());
    ///
    /// let (mut transport, theirs) = PeerTransport::connect(addr, &ours).await?;
    /// println!("connected to {:?}", theirs.peer_id);
    /// let message = transport.receive_message().await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(
        addr: SocketAddr,
        handshake: &Handshake,
    ) -> Result<(Self, Handshake), PeerError> {
        Self::connect_within(addr, handshake, PEER_CONNECT_TIMEOUT, PEER_HANDSHAKE_TIMEOUT).await
    }

    /// [`connect`](Self::connect) with explicit limits for the TCP connect and for
    /// the handshake exchange that follows it.
    pub async fn connect_within(
        addr: SocketAddr,
        handshake: &Handshake,
        connect_timeout: Duration,
        handshake_timeout: Duration,
    ) -> Result<(Self, Handshake), PeerError> {
        let stream = timeout(connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| PeerError::Timeout)??;
        stream.set_nodelay(true)?;

        let mut transport = Self::new(stream);
        let theirs = timeout(handshake_timeout, async {
            transport.send_handshake(handshake).await?;
            transport.receive_handshake().await
        })
        .await
        .map_err(|_| {
            debug!("Handshake with {} timed out", addr);
            PeerError::Timeout
        })??;

        if theirs.info_hash != handshake.info_hash {
            return Err(PeerError::InfoHashMismatch);
        }

        debug!("Connected to peer {}", addr);
        Ok((transport, theirs))
    }

    pub fn peer_addr(&self) -> std::io::Result<SocketAddr> {
        self.stream.peer_addr()
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> PeerTransport<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            protocol: WireProtocol::new(),
            ready: VecDeque::new(),
            read_buf: vec![0u8; READ_CHUNK_SIZE],
        }
    }

    pub async fn send_handshake(&mut self, handshake: &Handshake) -> Result<(), PeerError> {
        self.write(&handshake.encode()).await
    }

    pub async fn send_message(&mut self, message: &RawMessage) -> Result<(), PeerError> {
        self.write(message.as_bytes()).await
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), PeerError> {
        timeout(PEER_WRITE_TIMEOUT, self.stream.write_all(data))
            .await
            .map_err(|_| PeerError::Timeout)??;
        Ok(())
    }

    /// Waits until the peer's handshake has been parsed.
    pub async fn receive_handshake(&mut self) -> Result<Handshake, PeerError> {
        loop {
            if let Some(handshake) = self.protocol.handshake() {
                return Ok(handshake.clone());
            }
            self.fill().await?;
        }
    }

    /// Returns the next framed message, reading as much as needed.
    pub async fn receive_message(&mut self) -> Result<RawMessage, PeerError> {
        loop {
            if let Some(message) = self.ready.pop_front() {
                return Ok(message);
            }
            self.fill().await?;
        }
    }

    /// Performs one read and feeds it to the state machine.
    async fn fill(&mut self) -> Result<(), PeerError> {
        if let Some(violation) = self.protocol.error() {
            return Err(violation.clone().into());
        }

        let n = timeout(PEER_READ_TIMEOUT, self.stream.read(&mut self.read_buf))
            .await
            .map_err(|_| PeerError::Timeout)??;

        if n == 0 {
            return Err(PeerError::ConnectionClosed);
        }

        self.protocol.consume(&self.read_buf[..n]);
        self.ready.extend(self.protocol.take_messages());

        match self.protocol.error() {
            Some(violation) => Err(violation.clone().into()),
            None => Ok(()),
        }
    }

    pub fn protocol(&self) -> &WireProtocol {
        &self.protocol
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}
