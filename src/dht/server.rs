use super::config::DhtConfig;
use super::error::DhtError;
use super::message::{KrpcBody, KrpcMessage, TransactionId};
use super::node::{NodeId, Peer};
use super::transaction::{PendingQuery, TransactionTable};
use crate::bencode::{Dict, Value};
use crate::constants::{ERROR_METHOD_UNKNOWN, MAX_DATAGRAM_SIZE};
use bytes::Bytes;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tracing::{debug, info, trace, warn};

/// Outbound datagram sending.
///
/// The engine never opens sockets itself; inbound datagrams are handed to
/// [`KrpcEngine::handle_incoming`] by whoever owns the receiving side.
/// A send resolves once the datagram has been handed to the network; there
/// is no delivery guarantee.
pub trait DatagramTransport: Send + Sync {
    fn send_to(
        &self,
        data: &[u8],
        addr: SocketAddr,
    ) -> impl Future<Output = io::Result<()>> + Send;
}

impl DatagramTransport for UdpSocket {
    async fn send_to(&self, data: &[u8], addr: SocketAddr) -> io::Result<()> {
        UdpSocket::send_to(self, data, addr).await.map(|_| ())
    }
}

impl<T: DatagramTransport + ?Sized> DatagramTransport for Arc<T> {
    async fn send_to(&self, data: &[u8], addr: SocketAddr) -> io::Result<()> {
        (**self).send_to(data, addr).await
    }
}

/// KRPC transaction engine.
///
/// `KrpcEngine` sends queries, correlates replies to them by
/// `(transaction id, peer address)` and answers incoming queries ([BEP-5]).
///
/// # Examples
///
/// ```no_run
/// use bitpaito::dht::{DhtConfig, KrpcEngine};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let engine = Arc::new(KrpcEngine::bind(DhtConfig::default()).await?);
///
/// let receiver = engine.clone();
/// tokio::spawn(async move { receiver.run().await });
///
/// let node_id = engine.ping("67.215.246.10:6881".parse()?).await?;
/// println!("router answered as {}", node_id);
/// # Ok(())
/// # }
/// ```
///
/// [BEP-5]: http://bittorrent.org/beps/bep_0005.html
pub struct KrpcEngine<T = UdpSocket> {
    transport: T,
    our_id: NodeId,
    config: DhtConfig,
    transactions: Mutex<TransactionTable>,
    /// Least recently heard from first.
    peers: Mutex<IndexMap<SocketAddr, Peer>>,
    external_addr: Mutex<Option<SocketAddr>>,
}

impl KrpcEngine<UdpSocket> {
    pub async fn bind(config: DhtConfig) -> Result<Self, DhtError> {
        let socket = UdpSocket::bind(config.bind_addr).await?;
        let engine = Self::new(socket, config);

        info!(
            "DHT engine bound to {} with id {}",
            engine.transport.local_addr()?,
            engine.our_id
        );

        Ok(engine)
    }

    pub fn local_addr(&self) -> Result<SocketAddr, DhtError> {
        Ok(self.transport.local_addr()?)
    }

    /// Receives datagrams forever, feeding each to [`handle_incoming`](Self::handle_incoming).
    pub async fn run(&self) {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

        loop {
            match self.transport.recv_from(&mut buf).await {
                Ok((n, addr)) => self.handle_incoming(&buf[..n], addr).await,
                Err(e) => warn!("DHT receive failed: {}", e),
            }
        }
    }
}

impl<T: DatagramTransport> KrpcEngine<T> {
    pub fn new(transport: T, config: DhtConfig) -> Self {
        let our_id = config.node_id.unwrap_or_else(NodeId::generate);

        Self {
            transport,
            our_id,
            transactions: Mutex::new(TransactionTable::new(config.max_pending)),
            peers: Mutex::new(IndexMap::new()),
            external_addr: Mutex::new(None),
            config,
        }
    }

    pub fn our_id(&self) -> &NodeId {
        &self.our_id
    }

    pub fn config(&self) -> &DhtConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn peer(&self, addr: &SocketAddr) -> Option<Peer> {
        self.peers.lock().get(addr).copied()
    }

    pub fn peers(&self) -> Vec<Peer> {
        self.peers.lock().values().copied().collect()
    }

    /// The most recent address a replying node claims to see us at.
    ///
    /// This is an unauthenticated hint and must not back any security decision.
    pub fn external_addr(&self) -> Option<SocketAddr> {
        *self.external_addr.lock()
    }

    pub fn pending_count(&self) -> usize {
        self.transactions.lock().len()
    }

    pub fn is_pending(&self, transaction_id: u8, addr: SocketAddr) -> bool {
        self.transactions.lock().contains(transaction_id, addr)
    }

    /// Pings `addr` and returns the node id it answers with.
    pub async fn ping(&self, addr: SocketAddr) -> Result<NodeId, DhtError> {
        let values = self.query(addr, "ping", Dict::new()).await?;

        values
            .get(b"id")
            .and_then(Value::as_bytes)
            .ok_or_else(|| DhtError::InvalidMessage("missing id in response".into()))
            .and_then(|id| NodeId::from_bytes(id))
    }

    /// Sends `method` to `addr` and waits for the matching reply.
    ///
    /// Our node id is added to `args` as `id`. The call resolves with the `r`
    /// dictionary of the reply, [`DhtError::Remote`] for an error reply, or
    /// [`DhtError::Timeout`] once the configured timeout elapses.
    pub async fn query(
        &self,
        addr: SocketAddr,
        method: &str,
        args: Dict,
    ) -> Result<Dict, DhtError> {
        let pending = PendingQuery::register(&self.transactions, addr)?;
        let tid = pending.transaction_id();

        let mut query_args = Dict::new();
        query_args.insert("id", Bytes::copy_from_slice(self.our_id.as_bytes()));
        for (key, value) in args {
            if key != Value::string("id") {
                query_args.insert(key, value);
            }
        }

        let msg = KrpcMessage::query(Bytes::copy_from_slice(&[tid]), method, query_args)
            .with_version(self.config.client_version.clone());

        debug!("Sending {} query {} to {}", method, tid, addr);
        self.send(&msg, addr).await;

        let outcome = pending.wait(self.config.query_timeout).await;
        if matches!(outcome, Err(DhtError::Timeout)) {
            debug!("{} query {} to {} timed out", method, tid, addr);
        }
        outcome
    }

    /// Processes one inbound datagram.
    ///
    /// Malformed messages, unsolicited replies and duplicates are logged and
    /// dropped; nothing here fails towards the caller. The only await is the
    /// send of the answer to an incoming query.
    pub async fn handle_incoming(&self, data: &[u8], from: SocketAddr) {
        let msg = match KrpcMessage::parse(data) {
            Ok(msg) => msg,
            Err(e) => {
                debug!("Dropping malformed KRPC message from {}: {}", from, e);
                return;
            }
        };

        trace!(
            "Received {} message {:02x?} from {}",
            msg.kind(),
            msg.transaction_id,
            from
        );

        match msg.body {
            KrpcBody::Query { method, args } => {
                self.handle_query(msg.transaction_id, &method, &args, from)
                    .await
            }
            KrpcBody::Response { values } => {
                self.handle_reply(&msg.transaction_id, msg.ip, Ok(values), from)
            }
            KrpcBody::Error { code, message } => self.handle_reply(
                &msg.transaction_id,
                msg.ip,
                Err(DhtError::Remote { code, message }),
                from,
            ),
        }
    }

    fn handle_reply(
        &self,
        tid: &[u8],
        ip: Option<SocketAddr>,
        outcome: Result<Dict, DhtError>,
        from: SocketAddr,
    ) {
        let sender = match tid {
            [id] => self.transactions.lock().resolve(*id, from),
            _ => None,
        };

        let Some(sender) = sender else {
            debug!(
                "Dropping unsolicited or duplicate reply {:02x?} from {}",
                tid, from
            );
            return;
        };

        if let Ok(values) = &outcome {
            if let Some(id) = values
                .get(b"id")
                .and_then(Value::as_bytes)
                .and_then(|b| NodeId::from_bytes(b).ok())
            {
                self.learn_peer(from, id);
            }
        }

        if let Some(ip) = ip {
            self.note_external_addr(ip, from);
        }

        if sender.send(outcome).is_err() {
            debug!("Reply from {} arrived after its query was abandoned", from);
        }
    }

    async fn handle_query(
        &self,
        tid: TransactionId,
        method: &str,
        args: &Dict,
        from: SocketAddr,
    ) {
        if let Some(id) = args
            .get(b"id")
            .and_then(Value::as_bytes)
            .and_then(|b| NodeId::from_bytes(b).ok())
        {
            self.learn_peer(from, id);
        }

        let reply = match method {
            "ping" => KrpcMessage::response(tid, self.on_ping()),
            _ => {
                debug!("Unknown query method {:?} from {}", method, from);
                KrpcMessage::error(tid, ERROR_METHOD_UNKNOWN, "Method Unknown")
            }
        };

        let reply = reply
            .with_version(self.config.client_version.clone())
            .with_ip(from);

        self.send(&reply, from).await;
    }

    fn on_ping(&self) -> Dict {
        let mut values = Dict::new();
        values.insert("id", Bytes::copy_from_slice(self.our_id.as_bytes()));
        values
    }

    /// Records `id` for `addr` and marks it most recently heard from.
    ///
    /// Once the table holds more than `max_peers` entries the least recently
    /// heard from peers are evicted.
    fn learn_peer(&self, addr: SocketAddr, id: NodeId) {
        let mut peers = self.peers.lock();

        let mut peer = peers.shift_remove(&addr).unwrap_or_else(|| Peer::new(addr));
        peer.node_id = Some(id);
        peers.insert(addr, peer);

        while peers.len() > self.config.max_peers {
            if let Some((evicted, _)) = peers.shift_remove_index(0) {
                trace!("Evicted peer {} from a full peer table", evicted);
            }
        }
    }

    fn note_external_addr(&self, ip: SocketAddr, reporter: SocketAddr) {
        let mut external = self.external_addr.lock();
        if *external != Some(ip) {
            info!("{} reports our external address as {}", reporter, ip);
            *external = Some(ip);
        }
    }

    async fn send(&self, msg: &KrpcMessage, addr: SocketAddr) {
        let data = msg.encode();
        if let Err(e) = self.transport.send_to(&data, addr).await {
            warn!("Failed to send KRPC message to {}: {}", addr, e);
        }
    }
}
