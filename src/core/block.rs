use crate::core::{BlockHasher, Hasher, Transaction};
use crate::crypto::{PrivateKey, PublicKey, Signature};
use crate::error::{BlockchainError, Result};
use crate::types::Hash;
use crate::utils::{current_timestamp, deserialize, serialize, sha256_digest};
use bincode::error::{DecodeError, EncodeError};
use log::debug;

pub const BLOCK_VERSION: u32 = 1;

/// version(4) + data hash(32) + prev hash(32) + timestamp(8) + height(4)
pub const HEADER_BYTES_LEN: usize = 80;

#[derive(Debug, Clone, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct Header {
    version: u32,
    data_hash: Hash,
    prev_block_hash: Hash,
    timestamp: u64,
    height: u32,
}

impl Header {
    pub fn new(
        version: u32,
        data_hash: Hash,
        prev_block_hash: Hash,
        timestamp: u64,
        height: u32,
    ) -> Header {
        Header {
            version,
            data_hash,
            prev_block_hash,
            timestamp,
            height,
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn data_hash(&self) -> Hash {
        self.data_hash
    }

    pub fn prev_block_hash(&self) -> Hash {
        self.prev_block_hash
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Canonical big-endian layout. This is what gets hashed and signed.
    pub fn bytes(&self) -> [u8; HEADER_BYTES_LEN] {
        let mut out = [0u8; HEADER_BYTES_LEN];
        out[0..4].copy_from_slice(&self.version.to_be_bytes());
        out[4..36].copy_from_slice(self.data_hash.as_bytes());
        out[36..68].copy_from_slice(self.prev_block_hash.as_bytes());
        out[68..76].copy_from_slice(&self.timestamp.to_be_bytes());
        out[76..80].copy_from_slice(&self.height.to_be_bytes());
        out
    }

    pub fn hash(&self) -> Hash {
        BlockHasher.hash(self)
    }
}

/// A header, its ordered transactions and the producer's signature over
/// the header. The content hash is computed once, when the block is built
/// or decoded.
#[derive(Debug, Clone)]
pub struct Block {
    header: Header,
    transactions: Vec<Transaction>,
    validator: Option<PublicKey>,
    signature: Option<Signature>,
    hash: Hash,
}

impl Block {
    pub fn new(header: Header, transactions: Vec<Transaction>) -> Block {
        let hash = header.hash();
        Block {
            header,
            transactions,
            validator: None,
            signature: None,
            hash,
        }
    }

    /// Build the successor of `prev` carrying `transactions`.
    pub fn from_prev_header(prev: &Header, transactions: Vec<Transaction>) -> Result<Block> {
        let data_hash = calculate_data_hash(&transactions);
        let header = Header::new(
            BLOCK_VERSION,
            data_hash,
            prev.hash(),
            current_timestamp()?,
            prev.height() + 1,
        );
        Ok(Block::new(header, transactions))
    }

    /// The trusted height-0 block. Identical on every node.
    pub fn genesis() -> Block {
        let header = Header::new(BLOCK_VERSION, Hash::default(), Hash::default(), 0, 0);
        Block::new(header, Vec::new())
    }

    pub fn sign(&mut self, key: &PrivateKey) -> Result<()> {
        let signature = key.sign(&self.header.bytes())?;
        self.validator = Some(key.public_key());
        self.signature = Some(signature);
        debug!("Signed block {} at height {}", self.hash, self.header.height);
        Ok(())
    }

    /// Attach a signature produced elsewhere.
    pub fn with_signature(mut self, validator: PublicKey, signature: Signature) -> Block {
        self.validator = Some(validator);
        self.signature = Some(signature);
        self
    }

    /// Producer signature, every transaction signature, then the data hash.
    pub fn verify(&self) -> Result<()> {
        let height = self.header.height;
        let (validator, signature) = match (&self.validator, &self.signature) {
            (Some(validator), Some(signature)) => (validator, signature),
            _ => {
                return Err(BlockchainError::InvalidSignature(format!(
                    "block {height} is not signed"
                )))
            }
        };
        if !signature.verify(&self.header.bytes(), validator) {
            return Err(BlockchainError::InvalidSignature(format!(
                "block {height} signature is invalid"
            )));
        }

        for tx in &self.transactions {
            tx.verify()?;
        }

        if calculate_data_hash(&self.transactions) != self.header.data_hash {
            return Err(BlockchainError::DataHashMismatch { height });
        }

        Ok(())
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn height(&self) -> u32 {
        self.header.height
    }

    pub fn prev_block_hash(&self) -> Hash {
        self.header.prev_block_hash
    }

    pub fn hash(&self) -> Hash {
        self.hash
    }

    pub fn transactions(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }

    pub fn validator(&self) -> Option<&PublicKey> {
        self.validator.as_ref()
    }

    pub fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Block> {
        deserialize::<Block>(bytes)
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.header == other.header
            && self.transactions == other.transactions
            && self.validator == other.validator
            && self.signature == other.signature
    }
}

impl Eq for Block {}

impl bincode::Encode for Block {
    fn encode<E: bincode::enc::Encoder>(
        &self,
        encoder: &mut E,
    ) -> std::result::Result<(), EncodeError> {
        bincode::Encode::encode(&self.header, encoder)?;
        bincode::Encode::encode(&self.transactions, encoder)?;
        bincode::Encode::encode(&self.validator, encoder)?;
        bincode::Encode::encode(&self.signature, encoder)
    }
}

impl<Context> bincode::Decode<Context> for Block {
    fn decode<D: bincode::de::Decoder<Context = Context>>(
        decoder: &mut D,
    ) -> std::result::Result<Self, DecodeError> {
        let header: Header = bincode::Decode::decode(decoder)?;
        let transactions: Vec<Transaction> = bincode::Decode::decode(decoder)?;
        let validator: Option<PublicKey> = bincode::Decode::decode(decoder)?;
        let signature: Option<Signature> = bincode::Decode::decode(decoder)?;
        let mut block = Block::new(header, transactions);
        block.validator = validator;
        block.signature = signature;
        Ok(block)
    }
}
bincode::impl_borrow_decode!(Block);

/// SHA-256 over the canonical bytes of every transaction, in order.
pub fn calculate_data_hash(transactions: &[Transaction]) -> Hash {
    let mut buf = Vec::new();
    for tx in transactions {
        buf.extend_from_slice(&tx.canonical_bytes());
    }
    Hash::new(sha256_digest(&buf))
}
