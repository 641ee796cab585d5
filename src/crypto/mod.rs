//! Cryptographic identity
//!
//! NIST P-256 key pairs, ECDSA signatures and address derivation. Keys come
//! from `ring`; the public key travels on the chain as an uncompressed point
//! and the address is derived from its compressed form.

pub mod keypair;

pub use keypair::{
    PrivateKey, PublicKey, Signature, COMPRESSED_PUBLIC_KEY_LEN, PUBLIC_KEY_LEN, SIGNATURE_LEN,
};
