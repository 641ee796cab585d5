//! Data storage
//!
//! The storage interface behind the chain (in-memory by default, sled when a
//! data directory is configured) and the pool of pending transactions.

pub mod memory_pool;
pub mod store;

pub use memory_pool::{TxPool, DEFAULT_MEMPOOL_CAPACITY};
pub use store::{MemoryStore, SledStore, Storage};
