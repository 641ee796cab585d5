use crate::core::Transaction;
use crate::error::{BlockchainError, Result};
use crate::types::Hash;
use crate::utils::current_timestamp;
use log::debug;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub const DEFAULT_MEMPOOL_CAPACITY: usize = 1000;

#[derive(Default)]
struct PoolInner {
    txs: HashMap<Hash, Transaction>,
    // strictly increasing first-seen stamps, so ties never happen
    last_seen: u64,
}

/// ( K -> tx hash, V => Transaction )
///
/// Admitted transactions waiting for a block. Once `capacity` is reached
/// new transactions are rejected; nothing already admitted is evicted.
pub struct TxPool {
    inner: RwLock<PoolInner>,
    capacity: usize,
}

impl Default for TxPool {
    fn default() -> Self {
        Self::new(DEFAULT_MEMPOOL_CAPACITY)
    }
}

impl TxPool {
    pub fn new(capacity: usize) -> TxPool {
        TxPool {
            inner: RwLock::new(PoolInner::default()),
            capacity,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, PoolInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, PoolInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// `Ok(false)` if the transaction was already present.
    pub fn add(&self, mut tx: Transaction) -> Result<bool> {
        let hash = tx.hash();
        if self.contains(&hash) {
            return Ok(false);
        }
        tx.verify()?;

        let now = current_timestamp()?;
        let mut pool = self.write();
        if pool.txs.contains_key(&hash) {
            return Ok(false);
        }
        if pool.txs.len() >= self.capacity {
            return Err(BlockchainError::MempoolFull {
                capacity: self.capacity,
            });
        }

        let first_seen = now.max(pool.last_seen + 1);
        pool.last_seen = first_seen;
        tx.set_first_seen(first_seen);
        pool.txs.insert(hash, tx);
        debug!("Added transaction {hash} to pool ({} pending)", pool.txs.len());
        Ok(true)
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.read().txs.contains_key(hash)
    }

    pub fn get(&self, hash: &Hash) -> Option<Transaction> {
        self.read().txs.get(hash).cloned()
    }

    /// All admitted transactions, earliest seen first.
    pub fn pending(&self) -> Vec<Transaction> {
        let mut txs: Vec<Transaction> = self.read().txs.values().cloned().collect();
        txs.sort_by_key(|tx| (tx.first_seen(), tx.hash()));
        txs
    }

    /// Called once the pending transactions are committed in a block.
    pub fn clear_pending(&self) {
        self.write().txs.clear();
    }

    /// Drop the given transactions, e.g. those included in a received block.
    pub fn prune(&self, included: &[Transaction]) -> usize {
        let mut pool = self.write();
        included
            .iter()
            .filter(|tx| pool.txs.remove(&tx.hash()).is_some())
            .count()
    }

    pub fn len(&self) -> usize {
        self.read().txs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().txs.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
