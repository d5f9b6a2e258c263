use crate::network::peer::{Peer, PeerId};
use log::{debug, error, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// The live connections of one node. Sends happen on a snapshot, never under the
/// set's own lock.
pub struct PeerSet {
    inner: RwLock<Vec<Arc<Peer>>>,
    next_id: AtomicU64,
}

impl Default for PeerSet {
    fn default() -> Self {
        Self::new()
    }
}

impl PeerSet {
    pub fn new() -> PeerSet {
        PeerSet {
            inner: RwLock::new(vec![]),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn next_id(&self) -> PeerId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn add(&self, peer: Arc<Peer>) {
        match self.inner.write() {
            Ok(mut inner) => {
                if !inner.iter().any(|p| p.get_id() == peer.get_id()) {
                    debug!("Registered peer {} at {}", peer.get_id(), peer.get_addr());
                    inner.push(peer);
                }
            }
            Err(_) => error!("Failed to acquire write lock on peer set"),
        }
    }

    /// Remove the peer and hand it back so the caller can close it.
    pub fn remove(&self, id: PeerId) -> Option<Arc<Peer>> {
        match self.inner.write() {
            Ok(mut inner) => {
                let idx = inner.iter().position(|p| p.get_id() == id)?;
                Some(inner.remove(idx))
            }
            Err(_) => {
                error!("Failed to acquire write lock on peer set");
                None
            }
        }
    }

    pub fn get(&self, id: PeerId) -> Option<Arc<Peer>> {
        match self.inner.read() {
            Ok(inner) => inner.iter().find(|p| p.get_id() == id).cloned(),
            Err(_) => {
                error!("Failed to acquire read lock on peer set");
                None
            }
        }
    }

    pub fn snapshot(&self) -> Vec<Arc<Peer>> {
        match self.inner.read() {
            Ok(inner) => inner.clone(),
            Err(_) => {
                error!("Failed to acquire read lock on peer set");
                vec![]
            }
        }
    }

    /// Remove every peer, returning them for closing.
    pub fn drain(&self) -> Vec<Arc<Peer>> {
        match self.inner.write() {
            Ok(mut inner) => inner.drain(..).collect(),
            Err(_) => {
                error!("Failed to acquire write lock on peer set");
                vec![]
            }
        }
    }

    /// Send `payload` to every peer except `exclude`. Peers whose send fails are
    /// evicted and closed. Returns the number of successful deliveries.
    pub fn broadcast(&self, payload: &[u8], exclude: Option<PeerId>) -> usize {
        let mut delivered = 0;
        for peer in self.snapshot() {
            if Some(peer.get_id()) == exclude {
                continue;
            }
            match peer.send(payload) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(
                        "Dropping peer {} at {} after failed send: {e}",
                        peer.get_id(),
                        peer.get_addr()
                    );
                    if let Some(peer) = self.remove(peer.get_id()) {
                        peer.close();
                    }
                }
            }
        }
        delivered
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::peer::Direction;
    use crate::testnet::MockTransport;

    fn mock_peer(set: &PeerSet, transport: MockTransport) -> Arc<Peer> {
        let id = set.next_id();
        let addr = format!("127.0.0.1:{}", 10_000 + id).parse().unwrap();
        let peer = Arc::new(Peer::new(id, addr, Direction::Inbound, Box::new(transport)));
        set.add(Arc::clone(&peer));
        peer
    }

    #[test]
    fn test_broadcast_skips_excluded_peer() {
        let set = PeerSet::new();
        let transports: Vec<MockTransport> = (0..3).map(|_| MockTransport::new()).collect();
        let peers: Vec<Arc<Peer>> = transports
            .iter()
            .map(|t| mock_peer(&set, t.clone()))
            .collect();

        let delivered = set.broadcast(b"block", Some(peers[1].get_id()));

        assert_eq!(delivered, 2);
        assert_eq!(transports[0].sent(), vec![b"block".to_vec()]);
        assert!(transports[1].sent().is_empty());
        assert_eq!(transports[2].sent(), vec![b"block".to_vec()]);
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_failing_peer_is_evicted() {
        let set = PeerSet::new();
        let healthy = MockTransport::new();
        let broken = MockTransport::failing();
        mock_peer(&set, healthy.clone());
        let dead = mock_peer(&set, broken.clone());

        assert_eq!(set.broadcast(b"hello", None), 1);
        assert_eq!(set.len(), 1);
        assert!(set.get(dead.get_id()).is_none());
        assert!(broken.is_closed());

        // The next broadcast only reaches the survivor.
        assert_eq!(set.broadcast(b"again", None), 1);
        assert_eq!(healthy.sent().len(), 2);
    }

    #[test]
    fn test_ids_are_unique_and_remove_is_idempotent() {
        let set = PeerSet::new();
        let a = mock_peer(&set, MockTransport::new());
        let b = mock_peer(&set, MockTransport::new());
        assert_ne!(a.get_id(), b.get_id());

        assert!(set.remove(a.get_id()).is_some());
        assert!(set.remove(a.get_id()).is_none());
        assert_eq!(set.len(), 1);

        assert_eq!(set.drain().len(), 1);
        assert!(set.is_empty());
        assert_eq!(set.broadcast(b"nobody", None), 0);
    }
}
