//! Fixed-width identifiers used as map keys and linkage values.

pub mod address;
pub mod hash;

pub use address::{Address, ADDRESS_LEN};
pub use hash::{Hash, HASH_LEN};
