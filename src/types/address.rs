use crate::error::{BlockchainError, Result};
use data_encoding::HEXLOWER;
use std::fmt;

pub const ADDRESS_LEN: usize = 20;

/// 20-byte account identifier derived from a public key.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, bincode::Encode, bincode::Decode)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    pub const fn new(bytes: [u8; ADDRESS_LEN]) -> Address {
        Address(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Address> {
        let array: [u8; ADDRESS_LEN] = bytes.try_into().map_err(|_| BlockchainError::InvalidLength {
            expected: ADDRESS_LEN,
            got: bytes.len(),
        })?;
        Ok(Address(array))
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&HEXLOWER.encode(&self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}
