use crate::core::Header;
use crate::types::Hash;
use crate::utils::sha256_digest;

/// Pure, deterministic content hashing.
pub trait Hasher<T: ?Sized> {
    fn hash(&self, value: &T) -> Hash;
}

/// Hashes the canonical header bytes. The result is both the block's
/// identity and the `prev_block_hash` its child must carry.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockHasher;

impl Hasher<Header> for BlockHasher {
    fn hash(&self, header: &Header) -> Hash {
        Hash::new(sha256_digest(&header.bytes()))
    }
}

/// Hashes a transaction's raw payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct TxHasher;

impl Hasher<[u8]> for TxHasher {
    fn hash(&self, data: &[u8]) -> Hash {
        Hash::new(sha256_digest(data))
    }
}
