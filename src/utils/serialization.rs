// Thin wrappers over bincode 2 so every codec call site shares one configuration
use crate::error::{BlockchainError, Result};
use std::io::Read;

/// Upper bound on a single decoded value read from a peer.
pub const MAX_DECODE_SIZE: usize = 32 * 1024 * 1024;

/// Serialize data using bincode 2.0 with standard configuration
pub fn serialize<T: bincode::Encode>(data: &T) -> Result<Vec<u8>> {
    let config = bincode::config::standard();
    bincode::encode_to_vec(data, config)
        .map_err(|e| BlockchainError::Serialization(format!("Serialization failed: {e}")))
}

/// Deserialize data using bincode 2.0 with standard configuration
pub fn deserialize<T>(bytes: &[u8]) -> Result<T>
where
    T: bincode::Decode<()>,
{
    let config = bincode::config::standard().with_limit::<MAX_DECODE_SIZE>();
    let (data, _) = bincode::decode_from_slice(bytes, config)
        .map_err(|e| BlockchainError::Serialization(format!("Deserialization failed: {e}")))?;
    Ok(data)
}

/// Read exactly one value from a byte stream, leaving the rest unread
pub fn read_from<T, R>(reader: &mut R) -> std::result::Result<T, bincode::error::DecodeError>
where
    T: bincode::Decode<()>,
    R: Read,
{
    let config = bincode::config::standard().with_limit::<MAX_DECODE_SIZE>();
    bincode::decode_from_std_read(reader, config)
}
