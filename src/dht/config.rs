use super::node::NodeId;
use crate::constants::{
    CLIENT_VERSION, DEFAULT_DHT_PORT, DEFAULT_QUERY_TIMEOUT, MAX_PEERS, MAX_PENDING_QUERIES,
};
use bytes::Bytes;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Settings for a [`KrpcEngine`](super::KrpcEngine).
///
/// ```
/// use bitpaito::dht::DhtConfig;
/// use std::time::Duration;
///
/// let config = DhtConfig::default()
///     .with_bind_addr("127.0.0.1:0".parse().unwrap())
///     .with_query_timeout(Duration::from_millis(500));
/// assert_eq!(config.query_timeout, Duration::from_millis(500));
/// ```
#[derive(Debug, Clone)]
pub struct DhtConfig {
    pub bind_addr: SocketAddr,
    /// How long a query waits for its reply.
    pub query_timeout: Duration,
    /// Sent as `v` in every outgoing message.
    pub client_version: Bytes,
    /// Fixed own node id; a random one is generated when unset.
    pub node_id: Option<NodeId>,
    /// Upper bound on outstanding queries across all peers.
    pub max_pending: usize,
    /// Upper bound on remembered peers.
    pub max_peers: usize,
}

impl Default for DhtConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_DHT_PORT)),
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            client_version: Bytes::from_static(CLIENT_VERSION),
            node_id: None,
            max_pending: MAX_PENDING_QUERIES,
            max_peers: MAX_PEERS,
        }
    }
}

impl DhtConfig {
    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    pub fn with_client_version(mut self, version: impl Into<Bytes>) -> Self {
        self.client_version = version.into();
        self
    }

    pub fn with_node_id(mut self, id: NodeId) -> Self {
        self.node_id = Some(id);
        self
    }

    pub fn with_max_pending(mut self, max: usize) -> Self {
        self.max_pending = max;
        self
    }

    pub fn with_max_peers(mut self, max: usize) -> Self {
        self.max_peers = max;
        self
    }
}
