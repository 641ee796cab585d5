//! # Linkchain - A Minimal Signed-Block Node
//!
//! A hash-linked chain with one trusted producer, gossiped over plain TCP.
//! When I come back to this code, here's what I need to remember:
//!
//! ## What I Built
//! - **Chain**: append-only log of signed blocks, strictly sequential heights
//! - **Validator**: pluggable policy; the default checks height, linkage,
//!   producer signature, transaction signatures and the data hash
//! - **Mempool**: signature-checked pending transactions, earliest seen first
//! - **P2P Network**: tagged bincode envelopes over TCP, status/range sync
//! - **Producer**: a node with a key builds and signs a block every interval
//!
//! ## How I Organized My Code
//! - `types/`: 32-byte hashes and 20-byte addresses
//! - `crypto/`: P-256 keys, signatures, address derivation
//! - `core/`: transactions, blocks, hashers, the chain and its validator
//! - `storage/`: block store (memory or sled) and the transaction pool
//! - `network/`: envelope codec, peers, transport, the node's dispatch loop
//! - `api/`: JSON views of blocks and transactions
//! - `config/`, `cli/`: node settings and the command line
//! - `utils/`: digest, clock and codec helpers
//!
//! ## Key Design Decisions I Made
//! - One dispatch loop owns every state change; other threads only send events
//! - Content hashes are computed once, at construction or decode
//! - Genesis is fixed, so every node starts from the same block
//!
//! ## When I Need to Understand Something
//! 1. Start with `network/server.rs` for the message handlers and producer
//! 2. Look at `core/blockchain.rs` and `core/validator.rs` for what gets appended
//! 3. Check `core/block.rs` for the canonical header bytes that get signed

pub mod api;
pub mod cli;
pub mod config;
pub mod core;
pub mod crypto;
pub mod error;
pub mod network;
pub mod storage;
pub mod types;
pub mod utils;

// Re-export commonly used types for convenience
pub use cli::{Command, Opt};
pub use config::NodeConfig;
pub use core::{Block, BlockValidator, Blockchain, Header, Transaction, Validator};
pub use crypto::{PrivateKey, PublicKey, Signature};
pub use error::{BlockchainError, Result};
pub use network::{Server, ServerHandle, ServerOptions};
pub use storage::{MemoryStore, SledStore, Storage, TxPool};
pub use types::{Address, Hash};
