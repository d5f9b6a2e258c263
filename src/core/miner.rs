use crate::core::block::Entry;
use crate::core::{Block, CancelToken, Ledger, ProofOfWork};
use crate::error::{NodeError, Result};
use crate::storage::MemoryPool;
use crate::utils::current_timestamp;
use log::{debug, error, info, warn};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const PAUSE_SLICE: Duration = Duration::from_millis(50);

/// Receives every block the miner commits.
pub trait BlockAnnouncer: Send + Sync {
    fn announce(&self, block: &Block);
}

/// Announcer for nodes that keep their blocks to themselves.
pub struct NoopAnnouncer;

impl BlockAnnouncer for NoopAnnouncer {
    fn announce(&self, block: &Block) {
        debug!("Not announcing block {}", block.get_index());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinerSettings {
    pub difficulty: u32,
    pub round_pause: Duration,
}

impl Default for MinerSettings {
    fn default() -> Self {
        MinerSettings {
            difficulty: 4,
            round_pause: Duration::from_secs(1),
        }
    }
}

/// What a single mining round came to.
#[derive(Debug)]
pub enum RoundOutcome {
    Mined(Block),
    Cancelled,
    /// The ledger refused the block (usually because the tip moved); the round's work
    /// is thrown away.
    Stale(NodeError),
}

struct Worker {
    cancel: CancelToken,
    handle: JoinHandle<()>,
}

/// Background block producer. At most one worker thread runs at a time.
pub struct Miner {
    ledger: Arc<Ledger>,
    pool: Arc<MemoryPool>,
    mining_address: String,
    settings: MinerSettings,
    announcer: Arc<dyn BlockAnnouncer>,
    worker: Mutex<Option<Worker>>,
}

impl Miner {
    pub fn new(
        ledger: Arc<Ledger>,
        pool: Arc<MemoryPool>,
        mining_address: &str,
        settings: MinerSettings,
        announcer: Arc<dyn BlockAnnouncer>,
    ) -> Miner {
        Miner {
            ledger,
            pool,
            mining_address: mining_address.to_string(),
            settings,
            announcer,
            worker: Mutex::new(None),
        }
    }

    pub fn get_mining_address(&self) -> &str {
        &self.mining_address
    }

    pub fn get_settings(&self) -> MinerSettings {
        self.settings
    }

    /// Spawn the worker. Fails when one is already running.
    pub fn start(self: &Arc<Self>) -> Result<()> {
        let mut slot = self.lock_worker()?;
        if let Some(worker) = slot.as_ref() {
            if !worker.handle.is_finished() {
                return Err(NodeError::Mining("miner is already running".to_string()));
            }
        }
        // Reap a worker that ended on its own.
        if let Some(old) = slot.take() {
            let _ = old.handle.join();
        }

        let cancel = CancelToken::new();
        let miner = Arc::clone(self);
        let token = cancel.clone();
        let handle = thread::Builder::new()
            .name("miner".to_string())
            .spawn(move || miner.work(&token))
            .map_err(|e| NodeError::Mining(format!("Failed to spawn miner thread: {e}")))?;

        info!(
            "Miner started for {} at difficulty {}",
            self.mining_address, self.settings.difficulty
        );
        *slot = Some(Worker { cancel, handle });
        Ok(())
    }

    /// Ask the worker to stop. Returns immediately; use `wait` to join it.
    pub fn stop(&self) {
        match self.worker.lock() {
            Ok(slot) => {
                if let Some(worker) = slot.as_ref() {
                    info!("Stopping miner");
                    worker.cancel.cancel();
                }
            }
            Err(_) => error!("Failed to acquire miner worker lock"),
        }
    }

    /// Join the worker thread, if any.
    pub fn wait(&self) -> Result<()> {
        let worker = self.lock_worker()?.take();
        if let Some(worker) = worker {
            worker
                .handle
                .join()
                .map_err(|_| NodeError::Mining("miner thread panicked".to_string()))?;
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        match self.worker.lock() {
            Ok(slot) => slot
                .as_ref()
                .map(|w| !w.handle.is_finished())
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    /// One complete round: assemble a candidate on the current tip, search for its
    /// nonce, commit it, clear the pool and announce it.
    pub fn mine_round(&self, cancel: &CancelToken) -> Result<RoundOutcome> {
        let tip = self.ledger.tip()?;

        let mut entries: Vec<Entry> = self
            .pool
            .snapshot()
            .into_iter()
            .map(Entry::from)
            .collect();
        let consumed = entries.len();
        entries.push(Entry::reward(&self.mining_address));

        let candidate = Block::new_candidate(
            tip.get_index() + 1,
            tip.get_hash().to_string(),
            entries,
            current_timestamp()?,
            self.settings.difficulty,
        );
        debug!(
            "Mining block {} with {} entries",
            candidate.get_index(),
            candidate.get_transactions().len()
        );

        let pow = ProofOfWork::new(self.settings.difficulty);
        let block = match pow.run(candidate, cancel) {
            Some(block) => block,
            None => return Ok(RoundOutcome::Cancelled),
        };

        match self.ledger.append(block.clone()) {
            Ok(()) => {}
            Err(NodeError::EmptyChain) => return Err(NodeError::EmptyChain),
            Err(e) => {
                if e.is_rejection() {
                    warn!("Discarding stale block {}: {e}", block.get_index());
                } else {
                    error!("Failed to commit block {}: {e}", block.get_index());
                }
                return Ok(RoundOutcome::Stale(e));
            }
        }

        info!(
            "Block {} consumed {} pooled transactions; clearing {} from the pool",
            block.get_index(),
            consumed,
            self.pool.len()
        );
        self.pool.clear();
        info!("Mined block {}: {}", block.get_index(), block.get_hash());
        self.announcer.announce(&block);
        Ok(RoundOutcome::Mined(block))
    }

    fn work(&self, cancel: &CancelToken) {
        while !cancel.is_cancelled() {
            let result = self.mine_round(cancel);
            match &result {
                Ok(RoundOutcome::Cancelled) => break,
                Err(NodeError::EmptyChain) => {
                    error!("Miner stopped: the chain has no blocks");
                    return;
                }
                Err(e) => error!("Mining round failed: {e}"),
                Ok(_) => {}
            }
            if pauses_after(&result) {
                self.pause(cancel);
            }
        }
        info!("Miner stopped");
    }

    fn pause(&self, cancel: &CancelToken) {
        let deadline = Instant::now() + self.settings.round_pause;
        while !cancel.is_cancelled() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep(PAUSE_SLICE.min(deadline - now));
        }
    }

    fn lock_worker(&self) -> Result<std::sync::MutexGuard<'_, Option<Worker>>> {
        self.worker.lock().map_err(|e| {
            error!("Failed to acquire miner worker lock: {e}");
            NodeError::Mining("miner worker lock poisoned".to_string())
        })
    }
}

/// Whether the worker waits out `round_pause` before its next round. A block
/// refused by the chain rules retries at once; storage failures back off.
fn pauses_after(result: &Result<RoundOutcome>) -> bool {
    match result {
        Ok(RoundOutcome::Mined(_)) => true,
        Ok(RoundOutcome::Cancelled) => false,
        Ok(RoundOutcome::Stale(e)) => !e.is_rejection(),
        Err(_) => true,
    }
}
