use crate::core::Transaction;
use crate::error::{NodeError, Result};
use crate::utils::{
    base58_decode, base58_encode, ecdsa_p256_sha256_sign_digest, ecdsa_p256_sha256_sign_verify,
    new_key_pair, ripemd160_digest, sha256_digest,
};
use data_encoding::HEXLOWER;
use ring::rand::SystemRandom;
use ring::signature::{EcdsaKeyPair, KeyPair, ECDSA_P256_SHA256_FIXED_SIGNING};
use serde::{Deserialize, Serialize};

const VERSION: u8 = 0x00;
pub const ADDRESS_CHECK_SUM_LEN: usize = 4;

/// An ECDSA P-256 key pair. The address is derived from the public key, never stored.
#[derive(Clone, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Wallet {
    pkcs8: Vec<u8>,
    public_key: Vec<u8>,
}

impl Wallet {
    pub fn new() -> Result<Wallet> {
        let pkcs8 = new_key_pair()?;
        Self::from_pkcs8(pkcs8)
    }

    pub fn from_pkcs8(pkcs8: Vec<u8>) -> Result<Wallet> {
        let rng = SystemRandom::new();
        let key_pair =
            EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, pkcs8.as_ref(), &rng)
                .map_err(|e| NodeError::Crypto(format!("Failed to create key pair from PKCS8: {e}")))?;
        let public_key = key_pair.public_key().as_ref().to_vec();
        Ok(Wallet { pkcs8, public_key })
    }

    /// Base58 of version byte + RIPEMD160(SHA256(public key)) + 4-byte checksum.
    pub fn get_address(&self) -> String {
        address_from_pub_key_hash(&hash_pub_key(&self.public_key))
    }

    pub fn get_public_key(&self) -> &[u8] {
        self.public_key.as_slice()
    }

    /// Hex-encoded signature over `data`.
    pub fn sign(&self, data: &[u8]) -> Result<String> {
        let signature = ecdsa_p256_sha256_sign_digest(&self.pkcs8, data)?;
        Ok(HEXLOWER.encode(&signature))
    }

    /// Sign the transaction's payload and attach the signature.
    pub fn sign_transaction(&self, tx: &mut Transaction) -> Result<()> {
        let signature = self.sign(&tx.signing_payload())?;
        tx.set_signature(signature);
        Ok(())
    }
}

/// Check a hex signature produced by [`Wallet::sign`]. Malformed hex is a failed check.
pub fn verify(public_key: &[u8], data: &[u8], signature: &str) -> bool {
    match HEXLOWER.decode(signature.as_bytes()) {
        Ok(signature) => ecdsa_p256_sha256_sign_verify(public_key, &signature, data),
        Err(_) => false,
    }
}

pub fn hash_pub_key(pub_key: &[u8]) -> Vec<u8> {
    ripemd160_digest(&sha256_digest(pub_key))
}

fn checksum(payload: &[u8]) -> Vec<u8> {
    let second_sha = sha256_digest(&sha256_digest(payload));
    second_sha[..ADDRESS_CHECK_SUM_LEN].to_vec()
}

pub fn address_from_pub_key_hash(pub_key_hash: &[u8]) -> String {
    let mut payload = Vec::with_capacity(1 + pub_key_hash.len() + ADDRESS_CHECK_SUM_LEN);
    payload.push(VERSION);
    payload.extend_from_slice(pub_key_hash);
    let checksum = checksum(&payload);
    payload.extend_from_slice(&checksum);
    base58_encode(&payload)
}

pub fn validate_address(address: &str) -> bool {
    let payload = match base58_decode(address) {
        Ok(payload) => payload,
        Err(_) => return false,
    };
    if payload.len() <= ADDRESS_CHECK_SUM_LEN + 1 {
        return false;
    }

    let (body, actual_checksum) = payload.split_at(payload.len() - ADDRESS_CHECK_SUM_LEN);
    body[0] == VERSION && checksum(body) == actual_checksum
}
