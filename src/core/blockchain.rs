// The chain is an in-memory, height-indexed log of blocks with hash lookup maps.
// Every append goes through the validator while the write lock is held, so the
// check and the append are one atomic step. Reads only take the read lock.

use crate::core::{Block, BlockValidator, Header, Transaction, Validator};
use crate::error::{BlockchainError, Result};
use crate::storage::{MemoryStore, Storage};
use crate::types::Hash;
use log::info;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Snapshot-able chain contents, handed to validators.
#[derive(Default)]
pub struct ChainState {
    headers: Vec<Header>,
    blocks: Vec<Arc<Block>>,
    block_index: HashMap<Hash, Arc<Block>>,
    tx_index: HashMap<Hash, Transaction>,
}

impl ChainState {
    /// Number of blocks minus one; genesis is height 0.
    pub fn height(&self) -> u32 {
        self.headers.len().saturating_sub(1) as u32
    }

    pub fn has_block(&self, height: u32) -> bool {
        (height as usize) < self.headers.len()
    }

    pub fn header(&self, height: u32) -> Option<&Header> {
        self.headers.get(height as usize)
    }

    fn append(&mut self, block: Block) {
        let block = Arc::new(block);
        for tx in block.transactions() {
            self.tx_index.insert(tx.hash(), tx.clone());
        }
        self.block_index.insert(block.hash(), Arc::clone(&block));
        self.headers.push(block.header().clone());
        self.blocks.push(block);
    }
}

pub struct Blockchain {
    state: RwLock<ChainState>,
    validator: Box<dyn Validator>,
    store: Box<dyn Storage>,
}

impl Blockchain {
    /// Install `genesis` without validation on an in-memory store.
    pub fn new(genesis: Block) -> Result<Blockchain> {
        Self::with_storage(genesis, Box::new(MemoryStore::new()))
    }

    /// Install `genesis` on `store`. Blocks already persisted there are
    /// replayed through the validator, so a reopened store resumes at its tip.
    /// A store that already holds a chain is only read, never written.
    pub fn with_storage(genesis: Block, store: Box<dyn Storage>) -> Result<Blockchain> {
        let stored = match store.tip()? {
            Some(tip) => Self::stored_blocks(&genesis, store.as_ref(), tip)?,
            None => {
                store.put(&genesis)?;
                Vec::new()
            }
        };

        let mut state = ChainState::default();
        info!("Installed genesis block {}", genesis.hash());
        state.append(genesis);

        let chain = Blockchain {
            state: RwLock::new(state),
            validator: Box::new(BlockValidator),
            store,
        };
        if !stored.is_empty() {
            info!("Restoring {} blocks from storage", stored.len());
            for block in stored {
                chain.restore_block(block)?;
            }
        }
        Ok(chain)
    }

    // Walk back from the stored tip to genesis, oldest block first.
    fn stored_blocks(genesis: &Block, store: &dyn Storage, tip: Hash) -> Result<Vec<Block>> {
        let mut blocks = Vec::new();
        let mut cursor = tip;
        while cursor != genesis.hash() {
            let block = store.get(&cursor)?.ok_or_else(|| {
                BlockchainError::Database(format!("stored block {cursor} is missing"))
            })?;
            if block.height() == 0 {
                return Err(BlockchainError::Database(format!(
                    "stored chain starts at {cursor}, expected genesis {}",
                    genesis.hash()
                )));
            }
            cursor = block.prev_block_hash();
            blocks.push(block);
        }
        blocks.reverse();
        Ok(blocks)
    }

    pub fn set_validator(&mut self, validator: Box<dyn Validator>) {
        self.validator = validator;
    }

    fn read(&self) -> RwLockReadGuard<'_, ChainState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ChainState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn height(&self) -> u32 {
        self.read().height()
    }

    pub fn has_block(&self, height: u32) -> bool {
        self.read().has_block(height)
    }

    /// The only way the chain grows after genesis. On error nothing changes.
    pub fn add_block(&self, block: Block) -> Result<()> {
        let mut state = self.write();
        self.validator.validate_block(&state, &block)?;
        self.store.put(&block)?;

        info!(
            "Added block {} at height {} with {} transactions",
            block.hash(),
            block.height(),
            block.transactions().len()
        );
        state.append(block);
        Ok(())
    }

    // Same checks as `add_block`, for a block that is already in the store.
    fn restore_block(&self, block: Block) -> Result<()> {
        let mut state = self.write();
        self.validator.validate_block(&state, &block)?;
        state.append(block);
        Ok(())
    }

    pub fn get_header(&self, height: u32) -> Result<Header> {
        let state = self.read();
        state.header(height).cloned().ok_or_else(|| {
            BlockchainError::NotFound(format!(
                "given height {height} is greater than the blockchain height {}",
                state.height()
            ))
        })
    }

    pub fn get_block(&self, height: u32) -> Result<Arc<Block>> {
        let state = self.read();
        state
            .blocks
            .get(height as usize)
            .cloned()
            .ok_or_else(|| BlockchainError::NotFound(format!("block at height {height}")))
    }

    pub fn get_block_by_hash(&self, hash: &Hash) -> Result<Arc<Block>> {
        self.read()
            .block_index
            .get(hash)
            .cloned()
            .ok_or_else(|| BlockchainError::NotFound(format!("block with hash {hash}")))
    }

    pub fn get_tx_by_hash(&self, hash: &Hash) -> Result<Transaction> {
        self.read()
            .tx_index
            .get(hash)
            .cloned()
            .ok_or_else(|| BlockchainError::NotFound(format!("transaction with hash {hash}")))
    }

    pub fn has_transaction(&self, hash: &Hash) -> bool {
        self.read().tx_index.contains_key(hash)
    }

    /// Blocks `from..=to`, where `to == 0` means the tip at call time.
    /// Bounds past the tip are clamped; an empty range yields no blocks.
    pub fn blocks_range(&self, from: u32, to: u32) -> Vec<Arc<Block>> {
        let state = self.read();
        let tip = state.height();
        let last = if to == 0 { tip } else { to.min(tip) };
        if from > last {
            return Vec::new();
        }
        state.blocks[from as usize..=last as usize].to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::PrivateKey;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn next_block(chain: &Blockchain, key: &PrivateKey, txs: Vec<Transaction>) -> Block {
        let head = chain.get_header(chain.height()).unwrap();
        let mut block = Block::from_prev_header(&head, txs).unwrap();
        block.sign(key).unwrap();
        block
    }

    fn signed_tx(key: &PrivateKey, data: &[u8]) -> Transaction {
        let mut tx = Transaction::new(data.to_vec());
        tx.sign(key).unwrap();
        tx
    }

    #[test]
    fn test_new_chain_has_genesis_only() {
        let chain = Blockchain::new(Block::genesis()).unwrap();
        assert_eq!(chain.height(), 0);
        assert!(chain.has_block(0));
        assert!(!chain.has_block(1));
        assert_eq!(chain.get_block(0).unwrap().hash(), Block::genesis().hash());
    }

    #[test]
    fn test_add_block_indexes_block_and_transactions() {
        let key = PrivateKey::generate().unwrap();
        let chain = Blockchain::new(Block::genesis()).unwrap();
        let tx = signed_tx(&key, b"indexed");
        let block = next_block(&chain, &key, vec![tx.clone()]);
        let hash = block.hash();

        chain.add_block(block).unwrap();

        assert_eq!(chain.height(), 1);
        assert_eq!(chain.get_block_by_hash(&hash).unwrap().height(), 1);
        assert_eq!(chain.get_tx_by_hash(&tx.hash()).unwrap(), tx);
        assert!(chain.has_transaction(&tx.hash()));
        assert_eq!(chain.get_header(1).unwrap().hash(), hash);
    }

    #[test]
    fn test_lookups_fail_with_not_found() {
        let chain = Blockchain::new(Block::genesis()).unwrap();
        assert!(matches!(chain.get_header(1), Err(BlockchainError::NotFound(_))));
        assert!(matches!(chain.get_block(5), Err(BlockchainError::NotFound(_))));
        assert!(matches!(
            chain.get_block_by_hash(&Hash::new([1; 32])),
            Err(BlockchainError::NotFound(_))
        ));
        assert!(matches!(
            chain.get_tx_by_hash(&Hash::new([1; 32])),
            Err(BlockchainError::NotFound(_))
        ));
    }

    #[test]
    fn test_existing_height_is_already_known() {
        let key = PrivateKey::generate().unwrap();
        let chain = Blockchain::new(Block::genesis()).unwrap();
        let block = next_block(&chain, &key, vec![]);
        chain.add_block(block.clone()).unwrap();

        let err = chain.add_block(block).unwrap_err();
        assert!(err.is_already_known());
        assert_eq!(chain.height(), 1);
    }

    #[test]
    fn test_genesis_resubmission_is_already_known() {
        let chain = Blockchain::new(Block::genesis()).unwrap();
        assert!(chain.add_block(Block::genesis()).unwrap_err().is_already_known());
    }

    #[test]
    fn test_invalid_block_leaves_chain_unchanged() {
        let chain = Blockchain::new(Block::genesis()).unwrap();
        let unsigned = Block::from_prev_header(Block::genesis().header(), vec![]).unwrap();
        let hash = unsigned.hash();

        assert!(chain.add_block(unsigned).is_err());
        assert_eq!(chain.height(), 0);
        assert!(chain.get_block_by_hash(&hash).is_err());
    }

    #[test]
    fn test_blocks_range_bounds() {
        let key = PrivateKey::generate().unwrap();
        let chain = Blockchain::new(Block::genesis()).unwrap();
        for _ in 0..5 {
            let block = next_block(&chain, &key, vec![]);
            chain.add_block(block).unwrap();
        }

        let heights = |blocks: Vec<Arc<Block>>| -> Vec<u32> {
            blocks.iter().map(|b| b.height()).collect()
        };
        assert_eq!(heights(chain.blocks_range(0, 0)), vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(heights(chain.blocks_range(3, 0)), vec![3, 4, 5]);
        assert_eq!(heights(chain.blocks_range(1, 2)), vec![1, 2]);
        assert_eq!(heights(chain.blocks_range(4, 99)), vec![4, 5]);
        assert!(chain.blocks_range(6, 0).is_empty());
        assert!(chain.blocks_range(3, 2).is_empty());
    }

    /// Accepts a fixed number of writes, then fails every one after.
    struct FailingStore {
        inner: Arc<MemoryStore>,
        puts_left: AtomicUsize,
    }

    impl FailingStore {
        fn new(inner: &Arc<MemoryStore>, puts: usize) -> FailingStore {
            FailingStore {
                inner: Arc::clone(inner),
                puts_left: AtomicUsize::new(puts),
            }
        }
    }

    impl Storage for FailingStore {
        fn put(&self, block: &Block) -> Result<()> {
            let left = self.puts_left.load(Ordering::SeqCst);
            if left == 0 {
                return Err(BlockchainError::Database("disk full".to_string()));
            }
            self.puts_left.store(left - 1, Ordering::SeqCst);
            self.inner.put(block)
        }

        fn get(&self, hash: &Hash) -> Result<Option<Block>> {
            self.inner.get(hash)
        }

        fn tip(&self) -> Result<Option<Hash>> {
            self.inner.tip()
        }
    }

    #[test]
    fn test_reopening_store_does_not_write() {
        let key = PrivateKey::generate().unwrap();
        let store = Arc::new(MemoryStore::new());
        let tip = {
            let chain =
                Blockchain::with_storage(Block::genesis(), Box::new(Arc::clone(&store))).unwrap();
            for _ in 0..3 {
                let block = next_block(&chain, &key, vec![]);
                chain.add_block(block).unwrap();
            }
            chain.get_block(3).unwrap().hash()
        };

        // no writes allowed at all, and the chain still comes back whole
        let reopened =
            Blockchain::with_storage(Block::genesis(), Box::new(FailingStore::new(&store, 0)))
                .unwrap();
        assert_eq!(reopened.height(), 3);
        assert_eq!(store.tip().unwrap(), Some(tip));

        // a failed append after reopening leaves the stored chain intact
        let block = next_block(&reopened, &key, vec![]);
        assert!(matches!(
            reopened.add_block(block),
            Err(BlockchainError::Database(_))
        ));
        assert_eq!(reopened.height(), 3);

        let again =
            Blockchain::with_storage(Block::genesis(), Box::new(Arc::clone(&store))).unwrap();
        assert_eq!(again.height(), 3);
        assert_eq!(again.get_block(3).unwrap().hash(), tip);
    }

    #[test]
    fn test_empty_store_gets_genesis() {
        let store = Arc::new(MemoryStore::new());
        let chain =
            Blockchain::with_storage(Block::genesis(), Box::new(Arc::clone(&store))).unwrap();
        assert_eq!(chain.height(), 0);
        assert_eq!(store.tip().unwrap(), Some(Block::genesis().hash()));
        assert_eq!(store.len(), 1);
    }

    struct RejectAll;

    impl Validator for RejectAll {
        fn validate_block(&self, _chain: &ChainState, block: &Block) -> Result<()> {
            Err(BlockchainError::InvalidSignature(format!(
                "rejecting {}",
                block.height()
            )))
        }
    }

    #[test]
    fn test_custom_validator_is_used() {
        let key = PrivateKey::generate().unwrap();
        let mut chain = Blockchain::new(Block::genesis()).unwrap();
        chain.set_validator(Box::new(RejectAll));
        let block = next_block(&chain, &key, vec![]);
        assert!(chain.add_block(block).is_err());
        assert_eq!(chain.height(), 0);
    }
}
