use crate::error::{BlockchainError, Result};
use data_encoding::{HEXLOWER, HEXLOWER_PERMISSIVE};
use std::fmt;
use std::str::FromStr;

pub const HASH_LEN: usize = 32;

/// 32-byte content identifier. The all-zero value means "unset".
#[derive(
    Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, bincode::Encode, bincode::Decode,
)]
pub struct Hash([u8; HASH_LEN]);

impl Hash {
    pub const fn new(bytes: [u8; HASH_LEN]) -> Hash {
        Hash(bytes)
    }

    /// Build a hash from an externally supplied slice.
    pub fn from_bytes(bytes: &[u8]) -> Result<Hash> {
        let array: [u8; HASH_LEN] = bytes.try_into().map_err(|_| BlockchainError::InvalidLength {
            expected: HASH_LEN,
            got: bytes.len(),
        })?;
        Ok(Hash(array))
    }

    pub fn from_hex(s: &str) -> Result<Hash> {
        let bytes = HEXLOWER_PERMISSIVE
            .decode(s.as_bytes())
            .map_err(|e| BlockchainError::Serialization(format!("Invalid hex hash: {e}")))?;
        Hash::from_bytes(&bytes)
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

impl From<[u8; HASH_LEN]> for Hash {
    fn from(bytes: [u8; HASH_LEN]) -> Self {
        Hash(bytes)
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl FromStr for Hash {
    type Err = BlockchainError;

    fn from_str(s: &str) -> Result<Self> {
        Hash::from_hex(s)
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&HEXLOWER.encode(&self.0))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({self})")
    }
}
