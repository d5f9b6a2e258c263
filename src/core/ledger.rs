// The ledger owns the chain: an append-only, hash-linked Vec<Block> behind one RwLock.
// Every mutation persists the whole chain before the lock is released, so readers
// never see a block that is not on disk.

use crate::core::{Block, ProofOfWork};
use crate::error::{NodeError, Result};
use crate::storage::ChainStore;
use log::{error, info, warn};
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

pub struct Ledger {
    chain: RwLock<Vec<Block>>,
    store: ChainStore,
}

impl Ledger {
    /// Open the chain stored at `path`, creating it from genesis when absent.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Ledger> {
        let ledger = Ledger {
            chain: RwLock::new(Vec::new()),
            store: ChainStore::new(path),
        };
        ledger.restore()?;
        Ok(ledger)
    }

    fn read_chain(&self) -> Result<RwLockReadGuard<'_, Vec<Block>>> {
        self.chain.read().map_err(|e| {
            error!("Failed to acquire read lock on chain: {e}");
            NodeError::Storage("chain lock poisoned".to_string())
        })
    }

    fn write_chain(&self) -> Result<RwLockWriteGuard<'_, Vec<Block>>> {
        self.chain.write().map_err(|e| {
            error!("Failed to acquire write lock on chain: {e}");
            NodeError::Storage("chain lock poisoned".to_string())
        })
    }

    /// Reset the chain to the lone genesis block and persist it.
    pub fn genesis(&self) -> Result<()> {
        let mut chain = self.write_chain()?;
        let genesis = Block::genesis();
        info!("Creating genesis block {}", genesis.get_hash());
        self.store.save(std::slice::from_ref(&genesis))?;
        *chain = vec![genesis];
        Ok(())
    }

    pub fn tip(&self) -> Result<Block> {
        self.read_chain()?
            .last()
            .cloned()
            .ok_or(NodeError::EmptyChain)
    }

    /// Commit `candidate` on top of the tip. Rejected candidates and failed writes
    /// both leave the chain exactly as it was.
    pub fn append(&self, candidate: Block) -> Result<()> {
        let mut chain = self.write_chain()?;
        let tip = chain.last().ok_or(NodeError::EmptyChain)?;

        if candidate.get_prev_hash() != tip.get_hash() {
            return Err(NodeError::InvalidLink {
                expected: tip.get_hash().to_string(),
                found: candidate.get_prev_hash().to_string(),
            });
        }
        if !ProofOfWork::validate(&candidate) {
            return Err(NodeError::InvalidProof {
                hash: candidate.get_hash().to_string(),
                difficulty: candidate.get_difficulty(),
            });
        }

        let index = candidate.get_index();
        let hash = candidate.get_hash().to_string();
        chain.push(candidate);
        if let Err(e) = self.store.save(&chain) {
            chain.pop();
            warn!("Dropping block {index} after failed persist: {e}");
            return Err(e);
        }

        info!("Appended block {index}: {hash}");
        Ok(())
    }

    pub fn persist(&self) -> Result<()> {
        let chain = self.read_chain()?;
        self.store.save(&chain)
    }

    /// Reload the chain from disk. A missing store starts a fresh chain; a store that
    /// fails validation is an error and is left untouched.
    pub fn restore(&self) -> Result<()> {
        match self.store.load()? {
            Some(blocks) => {
                Self::verify_chain(&blocks)?;
                let mut chain = self.write_chain()?;
                info!(
                    "Restored chain of {} blocks from {}",
                    blocks.len(),
                    self.store.path().display()
                );
                *chain = blocks;
                Ok(())
            }
            None => self.genesis(),
        }
    }

    /// Check genesis, then every link and every proof after it.
    pub fn verify_chain(blocks: &[Block]) -> Result<()> {
        let genesis = blocks.first().ok_or(NodeError::EmptyChain)?;
        if *genesis != Block::genesis() {
            return Err(NodeError::Storage(format!(
                "Unexpected genesis block {}",
                genesis.get_hash()
            )));
        }

        for pair in blocks.windows(2) {
            let (prev, block) = (&pair[0], &pair[1]);
            if block.get_prev_hash() != prev.get_hash() {
                return Err(NodeError::InvalidLink {
                    expected: prev.get_hash().to_string(),
                    found: block.get_prev_hash().to_string(),
                });
            }
            if !ProofOfWork::validate(block) {
                return Err(NodeError::InvalidProof {
                    hash: block.get_hash().to_string(),
                    difficulty: block.get_difficulty(),
                });
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        match self.read_chain() {
            Ok(chain) => chain.len(),
            Err(_) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index of the tip.
    pub fn height(&self) -> Result<u64> {
        Ok(self.tip()?.get_index())
    }

    /// Copy of the whole chain, genesis first.
    pub fn blocks(&self) -> Result<Vec<Block>> {
        Ok(self.read_chain()?.clone())
    }

    pub fn block(&self, index: u64) -> Option<Block> {
        let chain = self.read_chain().ok()?;
        usize::try_from(index)
            .ok()
            .and_then(|i| chain.get(i))
            .cloned()
    }

    pub fn store_path(&self) -> &Path {
        self.store.path()
    }
}
