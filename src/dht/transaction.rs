use super::error::DhtError;
use crate::bencode::Dict;
use crate::constants::TRANSACTION_ID_SPACE;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::timeout;

pub(crate) type Outcome = Result<Dict, DhtError>;

type Key = (u8, SocketAddr);

/// Cyclic single-byte transaction id generator.
///
/// Yields `0, 1, .., 254` and then starts over, so an id is handed out again
/// only after the other 254 have been.
#[derive(Debug, Default)]
pub struct TransactionIds {
    next: u8,
}

impl TransactionIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> u8 {
        let id = self.next;
        self.next = ((self.next as u16 + 1) % TRANSACTION_ID_SPACE) as u8;
        id
    }
}

struct Slot {
    seq: u64,
    sender: oneshot::Sender<Outcome>,
}

/// Outstanding queries keyed by `(transaction id, peer address)`.
pub(crate) struct TransactionTable {
    ids: TransactionIds,
    pending: HashMap<Key, Slot>,
    next_seq: u64,
    max_pending: usize,
}

impl TransactionTable {
    pub(crate) fn new(max_pending: usize) -> Self {
        Self {
            ids: TransactionIds::new(),
            pending: HashMap::new(),
            next_seq: 0,
            max_pending,
        }
    }

    /// Allocates the next id not already outstanding towards `addr`.
    fn register(
        &mut self,
        addr: SocketAddr,
    ) -> Result<(Key, u64, oneshot::Receiver<Outcome>), DhtError> {
        if self.pending.len() >= self.max_pending {
            return Err(DhtError::TooManyPending);
        }

        for _ in 0..TRANSACTION_ID_SPACE {
            let key = (self.ids.next_id(), addr);
            if self.pending.contains_key(&key) {
                continue;
            }

            let (sender, receiver) = oneshot::channel();
            let seq = self.next_seq;
            self.next_seq += 1;
            self.pending.insert(key, Slot { seq, sender });
            return Ok((key, seq, receiver));
        }

        Err(DhtError::TooManyPending)
    }

    /// Removes the slot so the caller can complete it. A second call for the same
    /// key finds nothing, which is how duplicate replies get dropped.
    pub(crate) fn resolve(&mut self, id: u8, addr: SocketAddr) -> Option<oneshot::Sender<Outcome>> {
        self.pending.remove(&(id, addr)).map(|slot| slot.sender)
    }

    fn cancel(&mut self, key: &Key, seq: u64) -> bool {
        match self.pending.get(key) {
            Some(slot) if slot.seq == seq => {
                self.pending.remove(key);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn contains(&self, id: u8, addr: SocketAddr) -> bool {
        self.pending.contains_key(&(id, addr))
    }
}

/// A registered query waiting for its reply.
///
/// Dropping it before completion removes its slot from the table.
pub(crate) struct PendingQuery<'a> {
    table: &'a Mutex<TransactionTable>,
    key: Key,
    seq: u64,
    receiver: oneshot::Receiver<Outcome>,
    done: bool,
}

impl<'a> PendingQuery<'a> {
    pub(crate) fn register(
        table: &'a Mutex<TransactionTable>,
        addr: SocketAddr,
    ) -> Result<Self, DhtError> {
        let (key, seq, receiver) = table.lock().register(addr)?;
        Ok(Self {
            table,
            key,
            seq,
            receiver,
            done: false,
        })
    }

    pub(crate) fn transaction_id(&self) -> u8 {
        self.key.0
    }

    pub(crate) async fn wait(mut self, limit: Duration) -> Outcome {
        let result = timeout(limit, &mut self.receiver).await;
        self.done = true;

        match result {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(DhtError::Timeout),
            Err(_) => {
                // Remove the slot before reporting, so a late reply is treated as unsolicited.
                // If it is already gone a reply has claimed the sender and is about to send.
                let cancelled = self.table.lock().cancel(&self.key, self.seq);
                if cancelled {
                    Err(DhtError::Timeout)
                } else {
                    (&mut self.receiver).await.unwrap_or(Err(DhtError::Timeout))
                }
            }
        }
    }
}

impl Drop for PendingQuery<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.table.lock().cancel(&self.key, self.seq);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn test_ids_cycle_over_255_values() {
        let mut ids = TransactionIds::new();
        let first: Vec<u8> = (0..255).map(|_| ids.next_id()).collect();

        assert_eq!(first[0], 0);
        assert_eq!(first[254], 254);
        assert!(!first.contains(&255));
        assert_eq!(ids.next_id(), 0);
    }

    #[test]
    fn test_register_skips_outstanding_ids() {
        let mut table = TransactionTable::new(1024);
        let (k0, _, _r0) = table.register(addr(1)).unwrap();
        assert_eq!(k0.0, 0);

        // Wrap the generator around without completing id 0.
        for _ in 1..TRANSACTION_ID_SPACE {
            table.ids.next_id();
        }

        let (k1, _, _r1) = table.register(addr(1)).unwrap();
        assert_eq!(k1.0, 1);

        // Another peer may reuse an id that is outstanding elsewhere.
        for _ in 2..TRANSACTION_ID_SPACE {
            table.ids.next_id();
        }
        let (k2, _, _r2) = table.register(addr(2)).unwrap();
        assert_eq!(k2.0, 0);
    }

    #[test]
    fn test_register_exhausts_id_space() {
        let mut table = TransactionTable::new(1024);
        let mut receivers = Vec::new();
        for _ in 0..TRANSACTION_ID_SPACE {
            receivers.push(table.register(addr(1)).unwrap());
        }

        assert!(matches!(
            table.register(addr(1)),
            Err(DhtError::TooManyPending)
        ));
        assert!(table.register(addr(2)).is_ok());
    }

    #[test]
    fn test_global_pending_limit() {
        let mut table = TransactionTable::new(2);
        let _a = table.register(addr(1)).unwrap();
        let _b = table.register(addr(2)).unwrap();

        assert!(matches!(
            table.register(addr(3)),
            Err(DhtError::TooManyPending)
        ));
    }

    #[test]
    fn test_resolve_is_one_shot() {
        let mut table = TransactionTable::new(16);
        let ((id, peer), _, _rx) = table.register(addr(1)).unwrap();

        assert!(table.resolve(id, addr(2)).is_none());
        assert!(table.resolve(id, peer).is_some());
        assert!(table.resolve(id, peer).is_none());
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn test_stale_cancel_keeps_newer_slot() {
        let mut table = TransactionTable::new(16);
        let (key, old_seq, _old) = table.register(addr(1)).unwrap();
        table.resolve(key.0, key.1);

        for _ in 1..TRANSACTION_ID_SPACE {
            table.ids.next_id();
        }
        let (again, _, _new) = table.register(addr(1)).unwrap();
        assert_eq!(again, key);

        assert!(!table.cancel(&key, old_seq));
        assert!(table.contains(key.0, key.1));
    }

    #[test]
    fn test_dropping_pending_query_frees_slot() {
        let table = Mutex::new(TransactionTable::new(16));
        let pending = PendingQuery::register(&table, addr(1)).unwrap();
        let id = pending.transaction_id();
        assert!(table.lock().contains(id, addr(1)));

        drop(pending);
        assert_eq!(table.lock().len(), 0);
    }

    #[tokio::test]
    async fn test_wait_times_out_and_clears_slot() {
        let table = Mutex::new(TransactionTable::new(16));
        let pending = PendingQuery::register(&table, addr(1)).unwrap();

        let outcome = pending.wait(Duration::from_millis(20)).await;
        assert!(matches!(outcome, Err(DhtError::Timeout)));
        assert_eq!(table.lock().len(), 0);
    }

    #[tokio::test]
    async fn test_wait_receives_resolution() {
        let table = Mutex::new(TransactionTable::new(16));
        let pending = PendingQuery::register(&table, addr(1)).unwrap();
        let id = pending.transaction_id();

        let sender = table.lock().resolve(id, addr(1)).unwrap();
        let mut values = Dict::new();
        values.insert("id", "x");
        sender.send(Ok(values.clone())).unwrap();

        let outcome = pending.wait(Duration::from_secs(1)).await.unwrap();
        assert_eq!(outcome, values);
    }

    #[tokio::test]
    async fn test_wait_keeps_reply_claimed_before_deadline() {
        let table = Mutex::new(TransactionTable::new(16));
        let pending = PendingQuery::register(&table, addr(1)).unwrap();
        let id = pending.transaction_id();

        // The reply takes the slot in time but completes it after the deadline.
        let sender = table.lock().resolve(id, addr(1)).unwrap();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(40)).await;
            let mut values = Dict::new();
            values.insert("id", "late");
            let _ = sender.send(Ok(values));
        });

        let outcome = pending.wait(Duration::from_millis(10)).await.unwrap();
        assert_eq!(outcome.get(b"id").and_then(|v| v.as_str()), Some("late"));
    }

    #[tokio::test]
    async fn test_wait_times_out_when_claimed_reply_is_abandoned() {
        let table = Mutex::new(TransactionTable::new(16));
        let pending = PendingQuery::register(&table, addr(1)).unwrap();
        let id = pending.transaction_id();

        let sender = table.lock().resolve(id, addr(1)).unwrap();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(40)).await;
            drop(sender);
        });

        let outcome = pending.wait(Duration::from_millis(10)).await;
        assert!(matches!(outcome, Err(DhtError::Timeout)));
    }
}
