use crate::core::Transaction;
use crate::error::Result;
use crate::utils::{deserialize, serialize, sha256_hex};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

pub const GENESIS_PREV_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";
pub const GENESIS_DIFFICULTY: u32 = 4;
const GENESIS_MEMO: &str = "Genesis Block";

static GENESIS_BLOCK: Lazy<Block> = Lazy::new(|| {
    Block::new_candidate(
        0,
        GENESIS_PREV_HASH.to_string(),
        vec![Entry::Memo(GENESIS_MEMO.to_string())],
        0,
        GENESIS_DIFFICULTY,
    )
});

/// One item of a block body: a pool transaction or a free-form memo
/// (the genesis marker and the miner's reward line are memos).
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub enum Entry {
    Transaction(Transaction),
    Memo(String),
}

impl Entry {
    /// The synthetic reward line a miner appends to every candidate.
    pub fn reward(mining_address: &str) -> Entry {
        Entry::Memo(format!("Reward Transaction to {mining_address}"))
    }

    pub fn canonical_text(&self) -> String {
        match self {
            Entry::Transaction(tx) => tx.canonical_text(),
            Entry::Memo(text) => text.clone(),
        }
    }

    pub fn as_transaction(&self) -> Option<&Transaction> {
        match self {
            Entry::Transaction(tx) => Some(tx),
            Entry::Memo(_) => None,
        }
    }
}

impl From<Transaction> for Entry {
    fn from(tx: Transaction) -> Self {
        Entry::Transaction(tx)
    }
}

/// A block's `hash` is derived from every other field. The fields are private and
/// every mutator recomputes the hash, so a block built in-process never carries a
/// stale digest. Blocks decoded from bytes keep whatever hash they were sent with;
/// [`Block::has_consistent_hash`] tells the two apart.
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct Block {
    index: u64,
    prev_hash: String,
    transactions: Vec<Entry>,
    timestamp: i64,
    nonce: u64,
    difficulty: u32,
    hash: String,
}

impl Block {
    /// Unmined block with nonce 0 and its hash already computed.
    pub fn new_candidate(
        index: u64,
        prev_hash: String,
        transactions: Vec<Entry>,
        timestamp: i64,
        difficulty: u32,
    ) -> Block {
        let mut block = Block {
            index,
            prev_hash,
            transactions,
            timestamp,
            nonce: 0,
            difficulty,
            hash: String::new(),
        };
        block.hash = block.compute_hash();
        block
    }

    /// The fixed first block of every chain.
    pub fn genesis() -> Block {
        GENESIS_BLOCK.clone()
    }

    /// Everything that feeds the digest up to (not including) nonce and difficulty.
    /// The proof-of-work search reuses it across nonces.
    pub fn hash_prefix(&self) -> String {
        let mut data = String::new();
        let _ = write!(data, "{}{}[", self.index, self.prev_hash);
        for (i, entry) in self.transactions.iter().enumerate() {
            if i > 0 {
                data.push_str(", ");
            }
            data.push_str(&entry.canonical_text());
        }
        let _ = write!(data, "]{}", self.timestamp);
        data
    }

    pub fn hash_with_prefix(prefix: &str, nonce: u64, difficulty: u32) -> String {
        sha256_hex(format!("{prefix}{nonce}{difficulty}").as_bytes())
    }

    pub fn compute_hash(&self) -> String {
        Self::hash_with_prefix(&self.hash_prefix(), self.nonce, self.difficulty)
    }

    pub fn has_consistent_hash(&self) -> bool {
        self.hash == self.compute_hash()
    }

    pub fn set_nonce(&mut self, nonce: u64) {
        self.nonce = nonce;
        self.hash = self.compute_hash();
    }

    /// Advance the nonce by one. Returns false, leaving the block untouched, when the
    /// nonce space is exhausted.
    pub fn increment_nonce(&mut self) -> bool {
        match self.nonce.checked_add(1) {
            Some(next) => {
                self.set_nonce(next);
                true
            }
            None => false,
        }
    }

    /// New timestamp opens a fresh nonce space; the nonce restarts at 0.
    pub fn refresh_timestamp(&mut self, timestamp: i64) {
        self.timestamp = timestamp;
        self.nonce = 0;
        self.hash = self.compute_hash();
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Block> {
        deserialize::<Block>(bytes)
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn get_index(&self) -> u64 {
        self.index
    }

    pub fn get_prev_hash(&self) -> &str {
        self.prev_hash.as_str()
    }

    pub fn get_transactions(&self) -> &[Entry] {
        self.transactions.as_slice()
    }

    pub fn get_timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn get_nonce(&self) -> u64 {
        self.nonce
    }

    pub fn get_difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn get_hash(&self) -> &str {
        self.hash.as_str()
    }

    /// Rebuild a block from raw parts, keeping `hash` exactly as given.
    #[cfg(test)]
    pub fn from_parts_unchecked(
        index: u64,
        prev_hash: String,
        transactions: Vec<Entry>,
        timestamp: i64,
        nonce: u64,
        difficulty: u32,
        hash: String,
    ) -> Block {
        Block {
            index,
            prev_hash,
            transactions,
            timestamp,
            nonce,
            difficulty,
            hash,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_block() -> Block {
        Block::new_candidate(
            1,
            GENESIS_PREV_HASH.to_string(),
            vec![Entry::reward("miner")],
            1_234_567_890,
            1,
        )
    }

    #[test]
    fn test_genesis_is_fixed() {
        let a = Block::genesis();
        let b = Block::genesis();
        assert_eq!(a, b);
        assert_eq!(a.get_index(), 0);
        assert_eq!(a.get_prev_hash(), GENESIS_PREV_HASH);
        assert_eq!(a.get_prev_hash().len(), 64);
        assert_eq!(a.get_difficulty(), GENESIS_DIFFICULTY);
        assert_eq!(a.get_transactions(), &[Entry::Memo("Genesis Block".to_string())]);
        assert!(a.has_consistent_hash());
    }

    #[test]
    fn test_hash_is_64_hex_chars() {
        let block = sample_block();
        assert_eq!(block.get_hash().len(), 64);
        assert!(block.get_hash().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_nonce_change_recomputes_hash() {
        let mut block = sample_block();
        let before = block.get_hash().to_string();
        assert!(block.increment_nonce());
        assert_eq!(block.get_nonce(), 1);
        assert_ne!(block.get_hash(), before);
        assert!(block.has_consistent_hash());
    }

    #[test]
    fn test_nonce_exhaustion_is_reported() {
        let mut block = sample_block();
        block.set_nonce(u64::MAX);
        let hash = block.get_hash().to_string();
        assert!(!block.increment_nonce());
        assert_eq!(block.get_nonce(), u64::MAX);
        assert_eq!(block.get_hash(), hash);
    }

    #[test]
    fn test_refresh_timestamp_resets_nonce() {
        let mut block = sample_block();
        block.set_nonce(99);
        block.refresh_timestamp(1_300_000_000);
        assert_eq!(block.get_nonce(), 0);
        assert_eq!(block.get_timestamp(), 1_300_000_000);
        assert!(block.has_consistent_hash());
    }

    #[test]
    fn test_prefix_hash_matches_full_hash() {
        let block = sample_block();
        let prefix = block.hash_prefix();
        assert_eq!(
            Block::hash_with_prefix(&prefix, block.get_nonce(), block.get_difficulty()),
            block.get_hash()
        );
    }

    #[test]
    fn test_tampered_hash_is_detected() {
        let block = sample_block();
        let forged = Block::from_parts_unchecked(
            block.get_index(),
            block.get_prev_hash().to_string(),
            block.get_transactions().to_vec(),
            block.get_timestamp(),
            block.get_nonce(),
            block.get_difficulty(),
            "0".repeat(64),
        );
        assert!(!forged.has_consistent_hash());
    }

    #[test]
    fn test_bincode_round_trip_keeps_hash() {
        let block = sample_block();
        let bytes = block.serialize().unwrap();
        let decoded = Block::deserialize(&bytes).unwrap();
        assert_eq!(decoded, block);
        assert!(decoded.has_consistent_hash());
    }

    #[test]
    fn test_reward_entry_names_address() {
        let entry = Entry::reward("1Miner");
        assert_eq!(entry.canonical_text(), "Reward Transaction to 1Miner");
        assert!(entry.as_transaction().is_none());
    }
}
