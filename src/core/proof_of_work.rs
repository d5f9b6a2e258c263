use crate::core::Block;
use crate::utils::current_timestamp;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative stop signal shared between a miner and its search loop.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Hex-prefix proof of work: a digest qualifies when it starts with `difficulty`
/// literal '0' characters, so each difficulty step is 16x harder than the last.
pub struct ProofOfWork {
    difficulty: u32,
}

impl ProofOfWork {
    pub fn new(difficulty: u32) -> ProofOfWork {
        ProofOfWork { difficulty }
    }

    pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
        let needed = difficulty as usize;
        hash.len() >= needed && hash.bytes().take(needed).all(|b| b == b'0')
    }

    /// A block passes when its stored hash is the digest of its fields and that
    /// digest meets the block's own difficulty.
    pub fn validate(block: &Block) -> bool {
        block.has_consistent_hash()
            && Self::meets_difficulty(block.get_hash(), block.get_difficulty())
    }

    /// Search for a qualifying nonce, starting from the block's current one.
    /// The token is polled after every nonce increment; `None` means the search was
    /// cancelled and the candidate must be discarded.
    pub fn run(&self, mut block: Block, cancel: &CancelToken) -> Option<Block> {
        if block.get_difficulty() != self.difficulty {
            block = Block::new_candidate(
                block.get_index(),
                block.get_prev_hash().to_string(),
                block.get_transactions().to_vec(),
                block.get_timestamp(),
                self.difficulty,
            );
        }

        debug!(
            "Searching nonce for block {} at difficulty {}",
            block.get_index(),
            self.difficulty
        );

        let mut prefix = block.hash_prefix();
        let mut nonce = block.get_nonce();
        loop {
            let hash = Block::hash_with_prefix(&prefix, nonce, self.difficulty);
            if Self::meets_difficulty(&hash, self.difficulty) {
                block.set_nonce(nonce);
                info!("Found nonce {nonce} for block {}: {hash}", block.get_index());
                return Some(block);
            }

            nonce = match nonce.checked_add(1) {
                Some(next) => next,
                None => {
                    warn!(
                        "Nonce space exhausted for block {}, refreshing timestamp",
                        block.get_index()
                    );
                    let now = current_timestamp()
                        .unwrap_or_else(|_| block.get_timestamp().saturating_add(1));
                    block.refresh_timestamp(now);
                    prefix = block.hash_prefix();
                    0
                }
            };

            if cancel.is_cancelled() {
                debug!("Nonce search for block {} cancelled", block.get_index());
                return None;
            }
        }
    }
}
