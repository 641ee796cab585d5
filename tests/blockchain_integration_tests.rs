//! Blockchain integration tests
//!
//! Drives the public chain API end to end: building and linking signed
//! blocks, each way a block can be refused, and the mempool rules.

use linkchain::core::{calculate_data_hash, BLOCK_VERSION};
use linkchain::utils::{deserialize, serialize};
use linkchain::{
    Block, Blockchain, BlockchainError, Hash, Header, PrivateKey, Signature, Transaction, TxPool,
};

fn next_block(chain: &Blockchain, key: &PrivateKey, txs: Vec<Transaction>) -> Block {
    let head = chain.get_header(chain.height()).unwrap();
    let mut block = Block::from_prev_header(&head, txs).unwrap();
    block.sign(key).unwrap();
    block
}

fn signed_tx(key: &PrivateKey, data: &[u8]) -> Transaction {
    let mut tx = Transaction::new(data.to_vec());
    tx.sign(key).unwrap();
    tx
}

#[test]
fn test_hundred_linked_blocks() {
    let key = PrivateKey::generate().unwrap();
    let genesis = Block::genesis();
    assert_eq!(genesis.height(), 0);
    assert!(genesis.prev_block_hash().is_zero());

    let chain = Blockchain::new(genesis).unwrap();
    for i in 0..100u32 {
        let tx = signed_tx(&key, format!("tx {i}").as_bytes());
        chain.add_block(next_block(&chain, &key, vec![tx])).unwrap();
    }

    assert_eq!(chain.height(), 100);
    for height in 1..=100 {
        let header = chain.get_header(height).unwrap();
        let prev = chain.get_header(height - 1).unwrap();
        assert_eq!(header.height(), height);
        assert_eq!(header.prev_block_hash(), prev.hash());
    }
}

#[test]
fn test_gap_is_a_sequence_error() {
    let key = PrivateKey::generate().unwrap();
    let chain = Blockchain::new(Block::genesis()).unwrap();
    chain.add_block(next_block(&chain, &key, vec![])).unwrap();
    assert_eq!(chain.height(), 1);

    let head = chain.get_header(1).unwrap();
    let skipped = Header::new(
        BLOCK_VERSION,
        calculate_data_hash(&[]),
        head.hash(),
        head.timestamp() + 1,
        3,
    );
    let mut block = Block::new(skipped, vec![]);
    block.sign(&key).unwrap();

    assert_eq!(
        chain.add_block(block).unwrap_err(),
        BlockchainError::HeightMismatch {
            expected: 2,
            got: 3
        }
    );
    assert_eq!(chain.height(), 1);
}

#[test]
fn test_unrelated_prev_hash_is_a_linkage_error() {
    let key = PrivateKey::generate().unwrap();
    let chain = Blockchain::new(Block::genesis()).unwrap();

    let header = Header::new(
        BLOCK_VERSION,
        calculate_data_hash(&[]),
        Hash::new([0xab; 32]),
        1,
        1,
    );
    let mut block = Block::new(header, vec![]);
    block.sign(&key).unwrap();

    assert!(matches!(
        chain.add_block(block),
        Err(BlockchainError::PrevHashMismatch { height: 1, .. })
    ));
    assert_eq!(chain.height(), 0);
}

#[test]
fn test_flipped_signature_bit_fails_verification() {
    let key = PrivateKey::generate().unwrap();
    let tx = signed_tx(&key, b"pay bob");
    assert!(tx.verify().is_ok());

    let mut bytes = tx.signature().unwrap().to_bytes();
    bytes[10] ^= 0x01;
    let flipped = Signature::from_bytes(&bytes).unwrap();
    assert!(!flipped.verify(tx.data(), &key.public_key()));

    let tampered = tx.with_signature(key.public_key(), flipped);
    assert!(matches!(
        tampered.verify(),
        Err(BlockchainError::InvalidSignature(_))
    ));
}

#[test]
fn test_same_transaction_twice_in_mempool() {
    let key = PrivateKey::generate().unwrap();
    let pool = TxPool::default();
    let tx = signed_tx(&key, b"only once");

    pool.add(tx.clone()).unwrap();
    pool.add(tx).unwrap();
    assert_eq!(pool.len(), 1);
}

#[test]
fn test_block_signed_by_other_key_is_rejected() {
    let producer = PrivateKey::generate().unwrap();
    let impostor = PrivateKey::generate().unwrap();
    let chain = Blockchain::new(Block::genesis()).unwrap();

    let block = next_block(&chain, &producer, vec![]);
    let signature = *block.signature().unwrap();
    let forged = block.with_signature(impostor.public_key(), signature);

    assert!(matches!(
        chain.add_block(forged),
        Err(BlockchainError::InvalidSignature(_))
    ));
    assert_eq!(chain.height(), 0);
}

#[test]
fn test_unsigned_block_is_rejected() {
    let chain = Blockchain::new(Block::genesis()).unwrap();
    let head = chain.get_header(0).unwrap();
    let block = Block::from_prev_header(&head, vec![]).unwrap();

    assert!(matches!(
        chain.add_block(block),
        Err(BlockchainError::InvalidSignature(_))
    ));
}

#[test]
fn test_block_with_bad_transaction_is_rejected() {
    let key = PrivateKey::generate().unwrap();
    let other = PrivateKey::generate().unwrap();
    let chain = Blockchain::new(Block::genesis()).unwrap();

    let tx = signed_tx(&key, b"claimed by someone else");
    let signature = *tx.signature().unwrap();
    let bad = tx.with_signature(other.public_key(), signature);

    let block = next_block(&chain, &key, vec![bad]);
    assert!(matches!(
        chain.add_block(block),
        Err(BlockchainError::InvalidSignature(_))
    ));
    assert_eq!(chain.height(), 0);
}

#[test]
fn test_data_hash_mismatch_is_rejected() {
    let key = PrivateKey::generate().unwrap();
    let chain = Blockchain::new(Block::genesis()).unwrap();
    let head = chain.get_header(0).unwrap();

    let txs = vec![signed_tx(&key, b"a"), signed_tx(&key, b"b")];
    let mut reordered = txs.clone();
    reordered.reverse();

    // header commits to one order, the block carries the other
    let header = Header::new(
        BLOCK_VERSION,
        calculate_data_hash(&txs),
        head.hash(),
        1,
        1,
    );
    let mut block = Block::new(header, reordered);
    block.sign(&key).unwrap();

    assert_eq!(
        chain.add_block(block).unwrap_err(),
        BlockchainError::DataHashMismatch { height: 1 }
    );
}

#[test]
fn test_already_known_block() {
    let key = PrivateKey::generate().unwrap();
    let chain = Blockchain::new(Block::genesis()).unwrap();
    let block = next_block(&chain, &key, vec![]);
    chain.add_block(block.clone()).unwrap();

    let err = chain.add_block(block).unwrap_err();
    assert!(err.is_already_known());
    assert_eq!(chain.height(), 1);
}

#[test]
fn test_header_codec_and_hash_sensitivity() {
    let header = Header::new(BLOCK_VERSION, Hash::new([1; 32]), Hash::new([2; 32]), 42, 7);
    let decoded: Header = deserialize(&serialize(&header).unwrap()).unwrap();
    assert_eq!(decoded, header);
    assert_eq!(decoded.hash(), header.hash());

    let later = Header::new(BLOCK_VERSION, Hash::new([1; 32]), Hash::new([2; 32]), 43, 7);
    assert_ne!(later.hash(), header.hash());
    let taller = Header::new(BLOCK_VERSION, Hash::new([1; 32]), Hash::new([2; 32]), 42, 8);
    assert_ne!(taller.hash(), header.hash());

    let a = Transaction::new(b"payload".to_vec());
    let b = Transaction::new(b"payload".to_vec());
    assert_eq!(a.hash(), b.hash());
    assert_ne!(a.hash(), Transaction::new(b"payloae".to_vec()).hash());
}

#[test]
fn test_blocks_survive_the_wire_codec() {
    let key = PrivateKey::generate().unwrap();
    let chain = Blockchain::new(Block::genesis()).unwrap();
    let block = next_block(&chain, &key, vec![signed_tx(&key, b"carried")]);

    let decoded = Block::deserialize(&block.serialize().unwrap()).unwrap();
    assert_eq!(decoded.hash(), block.hash());
    chain.add_block(decoded).unwrap();
    assert_eq!(chain.get_block_by_hash(&block.hash()).unwrap().hash(), block.hash());
}
