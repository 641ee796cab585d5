//! JSON-facing views of chain data
//!
//! Builders for whatever serves chain data to clients (an HTTP front end,
//! a debugging tool). Everything is rendered as lowercase hex; bad input
//! and misses come back as errors the caller maps to a client error.

use crate::core::{Block, Blockchain, Transaction};
use crate::error::Result;
use crate::types::Hash;
use data_encoding::HEXLOWER;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockView {
    pub hash: String,
    pub version: u32,
    pub data_hash: String,
    pub prev_block_hash: String,
    pub height: u32,
    pub timestamp: u64,
    /// Producer address; absent on genesis.
    pub validator: Option<String>,
    pub signature: Option<String>,
    pub tx_count: usize,
    pub tx_hashes: Vec<String>,
}

impl From<&Block> for BlockView {
    fn from(block: &Block) -> Self {
        let header = block.header();
        BlockView {
            hash: block.hash().to_string(),
            version: header.version(),
            data_hash: header.data_hash().to_string(),
            prev_block_hash: header.prev_block_hash().to_string(),
            height: header.height(),
            timestamp: header.timestamp(),
            validator: block.validator().map(|key| key.address().to_string()),
            signature: block.signature().map(|sig| HEXLOWER.encode(&sig.to_bytes())),
            tx_count: block.transactions().len(),
            tx_hashes: block
                .transactions()
                .iter()
                .map(|tx| tx.hash().to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxView {
    pub hash: String,
    pub data: String,
    pub from: Option<String>,
    pub signature: Option<String>,
}

impl From<&Transaction> for TxView {
    fn from(tx: &Transaction) -> Self {
        TxView {
            hash: tx.hash().to_string(),
            data: HEXLOWER.encode(tx.data()),
            from: tx.sender().map(|key| key.address().to_string()),
            signature: tx.signature().map(|sig| HEXLOWER.encode(&sig.to_bytes())),
        }
    }
}

/// Look a block up by decimal height or by hex block hash.
pub fn get_block(chain: &Blockchain, height_or_hash: &str) -> Result<BlockView> {
    let block = match height_or_hash.parse::<u32>() {
        Ok(height) => chain.get_block(height)?,
        Err(_) => chain.get_block_by_hash(&Hash::from_hex(height_or_hash)?)?,
    };
    Ok(BlockView::from(block.as_ref()))
}

pub fn get_tx(chain: &Blockchain, hash: &str) -> Result<TxView> {
    let tx = chain.get_tx_by_hash(&Hash::from_hex(hash)?)?;
    Ok(TxView::from(&tx))
}
