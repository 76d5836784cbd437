use super::error::DhtError;
use rand::Rng;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

pub const NODE_ID_LEN: usize = 20;

/// A 20-byte DHT node identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub [u8; NODE_ID_LEN]);

impl NodeId {
    /// Generates a random node id from the thread-local generator.
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::rng())
    }

    /// Generates a node id from the given source of randomness.
    ///
    /// ```
    /// use bitpaito::dht::NodeId;
    /// use rand::{rngs::StdRng, SeedableRng};
    ///
    /// let a = NodeId::generate_with(&mut StdRng::seed_from_u64(7));
    /// let b = NodeId::generate_with(&mut StdRng::seed_from_u64(7));
    /// assert_eq!(a, b);
    /// ```
    pub fn generate_with<R: Rng>(rng: &mut R) -> Self {
        let mut id = [0u8; NODE_ID_LEN];
        rng.fill(&mut id);
        Self(id)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DhtError> {
        let id: [u8; NODE_ID_LEN] = bytes.try_into().map_err(|_| DhtError::InvalidNodeId)?;
        Ok(Self(id))
    }

    pub fn as_bytes(&self) -> &[u8; NODE_ID_LEN] {
        &self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({:02x}{:02x}..)", self.0[0], self.0[1])
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// A remote DHT participant.
///
/// The node id stays `None` until the peer has identified itself in a query
/// or in a reply to one of ours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Peer {
    pub addr: SocketAddr,
    pub node_id: Option<NodeId>,
}

impl Peer {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            node_id: None,
        }
    }
}

/// Packs an address into the compact form: 4 or 16 address bytes followed by
/// the big-endian port.
pub fn encode_compact_addr(addr: &SocketAddr) -> Vec<u8> {
    let mut buf = match addr.ip() {
        IpAddr::V4(v4) => {
            let mut buf = Vec::with_capacity(6);
            buf.extend_from_slice(&v4.octets());
            buf
        }
        IpAddr::V6(v6) => {
            let mut buf = Vec::with_capacity(18);
            buf.extend_from_slice(&v6.octets());
            buf
        }
    };
    buf.extend_from_slice(&addr.port().to_be_bytes());
    buf
}

/// Unpacks a 6-byte (IPv4) or 18-byte (IPv6) compact address.
pub fn decode_compact_addr(data: &[u8]) -> Option<SocketAddr> {
    match data.len() {
        6 => {
            let ip = Ipv4Addr::new(data[0], data[1], data[2], data[3]);
            let port = u16::from_be_bytes([data[4], data[5]]);
            Some(SocketAddr::new(IpAddr::V4(ip), port))
        }
        18 => {
            let mut octets = [0u8; 16];
            octets.copy_from_slice(&data[..16]);
            let port = u16::from_be_bytes([data[16], data[17]]);
            Some(SocketAddr::new(IpAddr::V6(Ipv6Addr::from(octets)), port))
        }
        _ => None,
    }
}
