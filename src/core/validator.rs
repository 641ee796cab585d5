use crate::core::{Block, ChainState};
use crate::error::{BlockchainError, Result};

/// Decides whether a block may be appended next.
pub trait Validator: Send + Sync {
    fn validate_block(&self, chain: &ChainState, block: &Block) -> Result<()>;
}

/// Strictly sequential, hash-linked, signed blocks. There is no fork choice:
/// the first valid block at a height wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockValidator;

impl Validator for BlockValidator {
    fn validate_block(&self, chain: &ChainState, block: &Block) -> Result<()> {
        let height = block.height();
        if chain.has_block(height) {
            return Err(BlockchainError::BlockAlreadyKnown {
                height,
                hash: block.hash().to_string(),
            });
        }

        let expected = chain.height() + 1;
        if height != expected {
            return Err(BlockchainError::HeightMismatch {
                expected,
                got: height,
            });
        }

        let prev_header = chain.header(height - 1).ok_or_else(|| {
            BlockchainError::NotFound(format!("header at height {}", height - 1))
        })?;
        let prev_hash = prev_header.hash();
        if prev_hash != block.prev_block_hash() {
            return Err(BlockchainError::PrevHashMismatch {
                height,
                expected: prev_hash.to_string(),
                got: block.prev_block_hash().to_string(),
            });
        }

        block.verify()
    }
}
