//! Test utilities shared by the unit tests

use crate::core::block::Entry;
use crate::core::{Block, CancelToken, Ledger, ProofOfWork, Transaction};
use crate::error::{NodeError, Result};
use crate::network::Transport;
use crate::utils::current_timestamp;
use crate::wallet::Wallet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const TEST_MINING_ADDRESS: &str = "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa";

pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn create_temp_dir() -> Result<TempDir> {
    tempfile::tempdir().map_err(|e| NodeError::Io(e.to_string()))
}

/// A ledger holding only genesis, stored in a fresh temp dir. Keep the dir alive
/// for as long as the ledger is used.
pub fn create_test_ledger() -> Result<(Ledger, TempDir)> {
    init_test_logging();
    let temp_dir = create_temp_dir()?;
    let ledger = Ledger::open(temp_dir.path().join("chain.dat"))?;
    Ok((ledger, temp_dir))
}

/// A transaction signed by a throwaway wallet.
pub fn signed_transaction(amount: u64) -> Transaction {
    let wallet = Wallet::new().expect("wallet generation");
    let mut tx = Transaction::with_timestamp(
        &wallet.get_address(),
        TEST_MINING_ADDRESS,
        amount,
        0,
        current_timestamp().expect("clock"),
    );
    wallet.sign_transaction(&mut tx).expect("signing");
    tx
}

/// Mine (but do not append) the block that would follow the current tip.
pub fn mine_next_block(ledger: &Ledger, difficulty: u32) -> Result<Block> {
    let tip = ledger.tip()?;
    let candidate = Block::new_candidate(
        tip.get_index() + 1,
        tip.get_hash().to_string(),
        vec![Entry::reward(TEST_MINING_ADDRESS)],
        current_timestamp()?,
        difficulty,
    );
    ProofOfWork::new(difficulty)
        .run(candidate, &CancelToken::new())
        .ok_or_else(|| NodeError::Mining("search cancelled".to_string()))
}

/// In-memory transport that records what was sent. Clones share state.
#[derive(Clone, Default)]
pub struct MockTransport {
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
    closed: Arc<AtomicBool>,
    fail: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport whose every send fails.
    pub fn failing() -> Self {
        MockTransport {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Transport for MockTransport {
    fn send(&mut self, payload: &[u8]) -> Result<()> {
        if self.fail || self.is_closed() {
            return Err(NodeError::Connection("mock transport is down".to_string()));
        }
        self.sent.lock().unwrap().push(payload.to_vec());
        Ok(())
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_transaction_is_valid() {
        let tx = signed_transaction(7);
        assert!(tx.is_valid());
        assert_eq!(tx.get_amount(), 7);
    }

    #[test]
    fn test_mine_next_block_links_to_tip() {
        let (ledger, _dir) = create_test_ledger().unwrap();
        let block = mine_next_block(&ledger, 1).unwrap();
        assert_eq!(block.get_prev_hash(), ledger.tip().unwrap().get_hash());
        assert!(ProofOfWork::validate(&block));
    }

    #[test]
    fn test_mock_transport_records_and_fails() {
        let mut ok = MockTransport::new();
        ok.send(b"x").unwrap();
        assert_eq!(ok.sent(), vec![b"x".to_vec()]);
        ok.close();
        assert!(ok.send(b"y").is_err());

        let mut broken = MockTransport::failing();
        assert!(broken.send(b"z").is_err());
    }
}
