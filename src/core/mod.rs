//! Core chain functionality
//!
//! Transactions, blocks and headers, content hashing, the chain itself and
//! the validation policy that decides what may be appended.

pub mod block;
pub mod blockchain;
pub mod hasher;
pub mod transaction;
pub mod validator;

pub use block::{calculate_data_hash, Block, Header, BLOCK_VERSION, HEADER_BYTES_LEN};
pub use blockchain::{Blockchain, ChainState};
pub use hasher::{BlockHasher, Hasher, TxHasher};
pub use transaction::Transaction;
pub use validator::{BlockValidator, Validator};
