use crate::core::Block;
use crate::error::{BlockchainError, Result};
use crate::types::Hash;
use log::debug;
use sled::{Db, Tree};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

const TIP_BLOCK_HASH_KEY: &str = "tip_block_hash";
const BLOCKS_TREE: &str = "blocks";

/// Where appended blocks are persisted.
pub trait Storage: Send + Sync {
    fn put(&self, block: &Block) -> Result<()>;
    fn get(&self, hash: &Hash) -> Result<Option<Block>>;
    /// Hash of the most recently stored block, if any.
    fn tip(&self) -> Result<Option<Hash>>;
}

impl<S: Storage + ?Sized> Storage for Arc<S> {
    fn put(&self, block: &Block) -> Result<()> {
        (**self).put(block)
    }

    fn get(&self, hash: &Hash) -> Result<Option<Block>> {
        (**self).get(hash)
    }

    fn tip(&self) -> Result<Option<Hash>> {
        (**self).tip()
    }
}

#[derive(Default)]
struct MemoryInner {
    blocks: HashMap<Hash, Block>,
    tip: Option<Hash>,
}

/// Default store: a map from block hash to block.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .blocks
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Storage for MemoryStore {
    fn put(&self, block: &Block) -> Result<()> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.blocks.insert(block.hash(), block.clone());
        inner.tip = Some(block.hash());
        Ok(())
    }

    fn get(&self, hash: &Hash) -> Result<Option<Block>> {
        Ok(self
            .inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .blocks
            .get(hash)
            .cloned())
    }

    fn tip(&self) -> Result<Option<Hash>> {
        Ok(self.inner.read().unwrap_or_else(PoisonError::into_inner).tip)
    }
}

/// Sled-backed store. Blocks are keyed by hash; the last put is the tip.
pub struct SledStore {
    db: Db,
    blocks: Tree,
}

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<SledStore> {
        let db = sled::open(path.as_ref())
            .map_err(|e| BlockchainError::Database(format!("Failed to open database: {e}")))?;
        let blocks = db
            .open_tree(BLOCKS_TREE)
            .map_err(|e| BlockchainError::Database(format!("Failed to open blocks tree: {e}")))?;
        Ok(SledStore { db, blocks })
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

impl Storage for SledStore {
    fn put(&self, block: &Block) -> Result<()> {
        let block_hash = block.hash();
        let block_data = block.serialize()?;

        self.blocks
            .transaction(|tx_db| {
                tx_db.insert(block_hash.as_bytes().as_slice(), block_data.as_slice())?;
                tx_db.insert(TIP_BLOCK_HASH_KEY, block_hash.as_bytes().as_slice())?;
                Ok(())
            })
            .map_err(|e: sled::transaction::TransactionError| {
                BlockchainError::Database(format!("Failed to update blocks tree: {e}"))
            })?;

        debug!("Persisted block {block_hash}");
        Ok(())
    }

    fn get(&self, hash: &Hash) -> Result<Option<Block>> {
        let data = self
            .blocks
            .get(hash.as_bytes())
            .map_err(|e| BlockchainError::Database(format!("Failed to get block: {e}")))?;
        data.map(|bytes| Block::deserialize(bytes.as_ref())).transpose()
    }

    fn tip(&self) -> Result<Option<Hash>> {
        let data = self
            .blocks
            .get(TIP_BLOCK_HASH_KEY)
            .map_err(|e| BlockchainError::Database(format!("Failed to get tip hash: {e}")))?;
        data.map(|bytes| Hash::from_bytes(bytes.as_ref())).transpose()
    }
}
