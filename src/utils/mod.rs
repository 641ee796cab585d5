//! Utility functions and helpers
//!
//! Digest, clock and codec helpers shared by the rest of the node.

pub mod crypto;
pub mod serialization;

pub use crypto::{current_timestamp, sha256_digest};

pub use serialization::{deserialize, read_from, serialize, MAX_DECODE_SIZE};
