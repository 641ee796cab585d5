// A transaction is an opaque payload signed by its sender.
// Its identity is the SHA-256 of the payload alone, computed once at construction.

use crate::core::{Hasher, TxHasher};
use crate::crypto::{PrivateKey, PublicKey, Signature};
use crate::error::{BlockchainError, Result};
use crate::types::Hash;
use crate::utils::{deserialize, serialize};
use bincode::error::{DecodeError, EncodeError};

#[derive(Debug, Clone)]
pub struct Transaction {
    data: Vec<u8>,
    from: Option<PublicKey>,
    signature: Option<Signature>,
    hash: Hash,
    // set by the pool on admission, never signed or sent
    first_seen: u64,
}

impl Transaction {
    pub fn new(data: Vec<u8>) -> Transaction {
        let hash = TxHasher.hash(&data);
        Transaction {
            data,
            from: None,
            signature: None,
            hash,
            first_seen: 0,
        }
    }

    pub fn sign(&mut self, key: &PrivateKey) -> Result<()> {
        let signature = key.sign(&self.data)?;
        self.from = Some(key.public_key());
        self.signature = Some(signature);
        Ok(())
    }

    /// Attach a signature produced elsewhere.
    pub fn with_signature(mut self, from: PublicKey, signature: Signature) -> Transaction {
        self.from = Some(from);
        self.signature = Some(signature);
        self
    }

    pub fn verify(&self) -> Result<()> {
        let (from, signature) = match (&self.from, &self.signature) {
            (Some(from), Some(signature)) => (from, signature),
            _ => {
                return Err(BlockchainError::InvalidSignature(format!(
                    "transaction {} is not signed",
                    self.hash
                )))
            }
        };
        if !signature.verify(&self.data, from) {
            return Err(BlockchainError::InvalidSignature(format!(
                "transaction {} signature is invalid",
                self.hash
            )));
        }
        Ok(())
    }

    pub fn hash(&self) -> Hash {
        self.hash
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn sender(&self) -> Option<&PublicKey> {
        self.from.as_ref()
    }

    pub fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    pub fn first_seen(&self) -> u64 {
        self.first_seen
    }

    pub(crate) fn set_first_seen(&mut self, timestamp: u64) {
        self.first_seen = timestamp;
    }

    /// Bytes committed to by a block's data hash: payload, sender and signature.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + self.data.len() + 1 + 65 + 1 + 64);
        out.extend_from_slice(&(self.data.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.data);
        match &self.from {
            Some(from) => {
                out.push(1);
                out.extend_from_slice(from.as_bytes());
            }
            None => out.push(0),
        }
        match &self.signature {
            Some(signature) => {
                out.push(1);
                out.extend_from_slice(&signature.to_bytes());
            }
            None => out.push(0),
        }
        out
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Transaction> {
        deserialize::<Transaction>(bytes)
    }
}

impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data && self.from == other.from && self.signature == other.signature
    }
}

impl Eq for Transaction {}

impl bincode::Encode for Transaction {
    fn encode<E: bincode::enc::Encoder>(
        &self,
        encoder: &mut E,
    ) -> std::result::Result<(), EncodeError> {
        bincode::Encode::encode(&self.data, encoder)?;
        bincode::Encode::encode(&self.from, encoder)?;
        bincode::Encode::encode(&self.signature, encoder)
    }
}

impl<Context> bincode::Decode<Context> for Transaction {
    fn decode<D: bincode::de::Decoder<Context = Context>>(
        decoder: &mut D,
    ) -> std::result::Result<Self, DecodeError> {
        let data: Vec<u8> = bincode::Decode::decode(decoder)?;
        let from: Option<PublicKey> = bincode::Decode::decode(decoder)?;
        let signature: Option<Signature> = bincode::Decode::decode(decoder)?;
        let mut tx = Transaction::new(data);
        tx.from = from;
        tx.signature = signature;
        Ok(tx)
    }
}
bincode::impl_borrow_decode!(Transaction);
