use crate::error::{BlockchainError, Result};
use crate::types::{Address, ADDRESS_LEN};
use crate::utils::sha256_digest;
use bincode::error::DecodeError;
use data_encoding::{HEXLOWER, HEXLOWER_PERMISSIVE};
use ring::rand::SystemRandom;
use ring::signature::{
    EcdsaKeyPair, KeyPair, UnparsedPublicKey, ECDSA_P256_SHA256_FIXED,
    ECDSA_P256_SHA256_FIXED_SIGNING,
};
use std::fmt;
use zeroize::Zeroizing;

/// Uncompressed SEC1 point: 0x04 || x || y
pub const PUBLIC_KEY_LEN: usize = 65;
pub const COMPRESSED_PUBLIC_KEY_LEN: usize = 33;
pub const SIGNATURE_LEN: usize = 64;

/// P-256 signing key. The PKCS#8 document is wiped on drop.
pub struct PrivateKey {
    pkcs8: Zeroizing<Vec<u8>>,
    key_pair: EcdsaKeyPair,
}

impl PrivateKey {
    pub fn generate() -> Result<PrivateKey> {
        let rng = SystemRandom::new();
        let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, &rng)
            .map_err(|e| {
                BlockchainError::Crypto(format!("Failed to generate ECDSA key pair: {e}"))
            })?;
        Self::from_pkcs8(pkcs8.as_ref())
    }

    pub fn from_pkcs8(pkcs8: &[u8]) -> Result<PrivateKey> {
        let rng = SystemRandom::new();
        let key_pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, pkcs8, &rng)
            .map_err(|e| {
                BlockchainError::Crypto(format!("Failed to create key pair from PKCS8: {e}"))
            })?;
        Ok(PrivateKey {
            pkcs8: Zeroizing::new(pkcs8.to_vec()),
            key_pair,
        })
    }

    /// Parse a hex-encoded PKCS#8 document, as written by `to_hex`.
    pub fn from_hex(text: &str) -> Result<PrivateKey> {
        let bytes = Zeroizing::new(
            HEXLOWER_PERMISSIVE
                .decode(text.trim().as_bytes())
                .map_err(|e| BlockchainError::Crypto(format!("Invalid key encoding: {e}")))?,
        );
        Self::from_pkcs8(&bytes)
    }

    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(HEXLOWER.encode(&self.pkcs8))
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.key_pair.public_key().as_ref().to_vec())
    }

    /// Sign arbitrary bytes. Only fails if the system RNG does.
    pub fn sign(&self, data: &[u8]) -> Result<Signature> {
        let rng = SystemRandom::new();
        let signature = self
            .key_pair
            .sign(&rng, data)
            .map_err(|e| BlockchainError::Crypto(format!("Failed to sign message: {e}")))?;
        Signature::from_bytes(signature.as_ref())
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

#[derive(Clone, PartialEq, Eq, Hash, bincode::Encode)]
pub struct PublicKey(Vec<u8>);

impl PublicKey {
    /// Accepts an uncompressed SEC1 P-256 point.
    pub fn from_bytes(bytes: &[u8]) -> Result<PublicKey> {
        if bytes.len() != PUBLIC_KEY_LEN {
            return Err(BlockchainError::InvalidLength {
                expected: PUBLIC_KEY_LEN,
                got: bytes.len(),
            });
        }
        if bytes[0] != 0x04 {
            return Err(BlockchainError::Crypto(
                "Public key is not an uncompressed point".to_string(),
            ));
        }
        Ok(PublicKey(bytes.to_vec()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// SEC1 compressed encoding: parity prefix followed by x.
    pub fn to_compressed(&self) -> [u8; COMPRESSED_PUBLIC_KEY_LEN] {
        let mut out = [0u8; COMPRESSED_PUBLIC_KEY_LEN];
        let y_is_odd = self.0[PUBLIC_KEY_LEN - 1] & 1 == 1;
        out[0] = if y_is_odd { 0x03 } else { 0x02 };
        out[1..].copy_from_slice(&self.0[1..33]);
        out
    }

    /// Low 20 bytes of SHA-256 over the compressed key.
    pub fn address(&self) -> Address {
        let digest = sha256_digest(&self.to_compressed());
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes.copy_from_slice(&digest[digest.len() - ADDRESS_LEN..]);
        Address::new(bytes)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", HEXLOWER.encode(&self.to_compressed()))
    }
}

impl<Context> bincode::Decode<Context> for PublicKey {
    fn decode<D: bincode::de::Decoder<Context = Context>>(
        decoder: &mut D,
    ) -> std::result::Result<Self, DecodeError> {
        let bytes: Vec<u8> = bincode::Decode::decode(decoder)?;
        PublicKey::from_bytes(&bytes).map_err(|_| DecodeError::Other("invalid P-256 public key"))
    }
}
bincode::impl_borrow_decode!(PublicKey);

/// ECDSA signature as its two scalars.
#[derive(Clone, Copy, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct Signature {
    r: [u8; 32],
    s: [u8; 32],
}

impl Signature {
    pub fn from_bytes(bytes: &[u8]) -> Result<Signature> {
        if bytes.len() != SIGNATURE_LEN {
            return Err(BlockchainError::InvalidLength {
                expected: SIGNATURE_LEN,
                got: bytes.len(),
            });
        }
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..]);
        Ok(Signature { r, s })
    }

    pub fn to_bytes(&self) -> [u8; SIGNATURE_LEN] {
        let mut out = [0u8; SIGNATURE_LEN];
        out[..32].copy_from_slice(&self.r);
        out[32..].copy_from_slice(&self.s);
        out
    }

    /// Never errors: anything that does not check out is `false`.
    pub fn verify(&self, data: &[u8], public_key: &PublicKey) -> bool {
        let peer_public_key =
            UnparsedPublicKey::new(&ECDSA_P256_SHA256_FIXED, public_key.as_bytes());
        peer_public_key.verify(data, &self.to_bytes()).is_ok()
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", HEXLOWER.encode(&self.to_bytes()))
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&HEXLOWER.encode(&self.to_bytes()))
    }
}
