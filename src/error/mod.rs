//! Error handling for the node
//!
//! One error type covers decoding, chain validation, lookups, storage and
//! networking so that every layer can propagate with `?`.

use std::fmt;

/// Result type alias for node operations
pub type Result<T> = std::result::Result<T, BlockchainError>;

/// Error types for node operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockchainError {
    /// Storage backend errors
    Database(String),
    /// Key handling and signing errors
    Crypto(String),
    /// Connection and peer errors
    Network(String),
    /// Configuration errors
    Config(String),
    /// Serialization/deserialization errors
    Serialization(String),
    /// File and socket I/O errors
    Io(String),
    /// A block already occupies this height
    BlockAlreadyKnown { height: u32, hash: String },
    /// The block is not the next one in the chain
    HeightMismatch { expected: u32, got: u32 },
    /// The block does not reference the hash of its predecessor
    PrevHashMismatch {
        height: u32,
        expected: String,
        got: String,
    },
    /// Missing or invalid block/transaction signature
    InvalidSignature(String),
    /// Recomputed data hash differs from the header's
    DataHashMismatch { height: u32 },
    /// Lookup by height or hash failed
    NotFound(String),
    /// A fixed-width value was built from a slice of the wrong length
    InvalidLength { expected: usize, got: usize },
    /// The transaction pool is at capacity
    MempoolFull { capacity: usize },
    /// Wire tag does not name a known message
    UnknownMessageType(u8),
    /// Reply addressed to a peer that is not connected
    UnknownPeer(String),
}

impl BlockchainError {
    /// Whether the error only says "we already have this", which callers
    /// may treat as success.
    pub fn is_already_known(&self) -> bool {
        matches!(self, BlockchainError::BlockAlreadyKnown { .. })
    }
}

impl fmt::Display for BlockchainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockchainError::Database(msg) => write!(f, "Database error: {msg}"),
            BlockchainError::Crypto(msg) => write!(f, "Cryptographic error: {msg}"),
            BlockchainError::Network(msg) => write!(f, "Network error: {msg}"),
            BlockchainError::Config(msg) => write!(f, "Configuration error: {msg}"),
            BlockchainError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            BlockchainError::Io(msg) => write!(f, "I/O error: {msg}"),
            BlockchainError::BlockAlreadyKnown { height, hash } => {
                write!(f, "Block {height} already known with hash {hash}")
            }
            BlockchainError::HeightMismatch { expected, got } => {
                write!(
                    f,
                    "Block height {got} is not the next block in the chain (expected {expected})"
                )
            }
            BlockchainError::PrevHashMismatch {
                height,
                expected,
                got,
            } => write!(
                f,
                "Block {height} has invalid prev block hash {got} (expected {expected})"
            ),
            BlockchainError::InvalidSignature(msg) => write!(f, "Invalid signature: {msg}"),
            BlockchainError::DataHashMismatch { height } => {
                write!(f, "Block {height} data hash is invalid")
            }
            BlockchainError::NotFound(msg) => write!(f, "Not found: {msg}"),
            BlockchainError::InvalidLength { expected, got } => {
                write!(f, "Invalid length: expected {expected} bytes, got {got}")
            }
            BlockchainError::MempoolFull { capacity } => {
                write!(f, "Transaction pool is full ({capacity} entries)")
            }
            BlockchainError::UnknownMessageType(tag) => {
                write!(f, "Invalid message type: {tag:#04x}")
            }
            BlockchainError::UnknownPeer(addr) => write!(f, "Peer {addr} not known"),
        }
    }
}

impl std::error::Error for BlockchainError {}

impl From<std::io::Error> for BlockchainError {
    fn from(err: std::io::Error) -> Self {
        BlockchainError::Io(err.to_string())
    }
}

impl From<sled::Error> for BlockchainError {
    fn from(err: sled::Error) -> Self {
        BlockchainError::Database(err.to_string())
    }
}

impl From<bincode::error::EncodeError> for BlockchainError {
    fn from(err: bincode::error::EncodeError) -> Self {
        BlockchainError::Serialization(err.to_string())
    }
}

impl From<bincode::error::DecodeError> for BlockchainError {
    fn from(err: bincode::error::DecodeError) -> Self {
        BlockchainError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for BlockchainError {
    fn from(err: toml::de::Error) -> Self {
        BlockchainError::Config(err.to_string())
    }
}
