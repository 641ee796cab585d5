use crate::error::{BlockchainError, Result};
use crate::network::Peer;
use log::{info, warn};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Registry of live peers
///
/// Peers are inserted from the accept/dial path and read from the
/// broadcast/reply path, so the map sits behind its own lock:
/// - Connection tracking keyed by remote address
/// - A hard connection limit
/// - Explicit removal when a peer fails
pub struct PeerManager {
    peers: RwLock<HashMap<String, Arc<Peer>>>,
    max_connections: usize,
}

impl PeerManager {
    pub fn new(max_connections: usize) -> Self {
        Self {
            peers: RwLock::new(HashMap::new()),
            max_connections,
        }
    }

    /// Register a peer unless the limit is reached.
    pub fn add(&self, peer: Arc<Peer>) -> Result<()> {
        let mut peers = self.peers.write().unwrap_or_else(PoisonError::into_inner);
        if peers.len() >= self.max_connections {
            return Err(BlockchainError::Network(format!(
                "Rejecting {}: connection limit {} reached",
                peer.addr(),
                self.max_connections
            )));
        }
        info!(
            "Connected to peer: {} (outgoing: {})",
            peer.addr(),
            peer.is_outgoing()
        );
        peers.insert(peer.id(), peer);
        Ok(())
    }

    /// Drop a peer and close its connection. Returns whether it was known.
    pub fn remove(&self, id: &str) -> bool {
        let removed = self
            .peers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        match removed {
            Some(peer) => {
                peer.close();
                info!("Disconnected from peer: {id}");
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &str) -> Result<Arc<Peer>> {
        self.peers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| BlockchainError::UnknownPeer(id.to_string()))
    }

    /// Snapshot of the current peers, so sends happen without the lock held.
    pub fn peers(&self) -> Vec<Arc<Peer>> {
        self.peers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.peers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Send `payload` to every peer except `skip`. A failing peer is
    /// logged and removed; the rest still receive the message.
    pub fn broadcast(&self, payload: &[u8], skip: Option<&str>) -> usize {
        let mut delivered = 0;
        for peer in self.peers() {
            let id = peer.id();
            if skip == Some(id.as_str()) {
                continue;
            }
            match peer.send(payload) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!("Broadcast to {id} failed: {e}");
                    self.remove(&id);
                }
            }
        }
        delivered
    }

    /// Close every connection, e.g. on shutdown.
    pub fn close_all(&self) {
        let peers: Vec<Arc<Peer>> = self
            .peers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, peer)| peer)
            .collect();
        for peer in peers {
            peer.close();
        }
    }
}
