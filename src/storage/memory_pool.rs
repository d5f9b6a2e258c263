use crate::core::Transaction;
use crate::error::{NodeError, Result};
use log::{debug, error};
use std::collections::HashMap;
use std::sync::RwLock;

/// Pending transactions awaiting a block. ( K -> txid, V => Transaction )
pub struct MemoryPool {
    inner: RwLock<HashMap<String, Transaction>>,
}

impl Default for MemoryPool {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPool {
    pub fn new() -> MemoryPool {
        MemoryPool {
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Admit a transaction. Unsigned or zero-amount transactions are rejected and the
    /// pool is left as it was. A repeated id replaces the earlier entry.
    pub fn add(&self, tx: Transaction) -> Result<()> {
        tx.validate()?;
        match self.inner.write() {
            Ok(mut pool) => {
                debug!("Pool accepted transaction {}", tx.get_id());
                pool.insert(tx.get_id().to_string(), tx);
            }
            Err(_) => {
                error!("Failed to acquire write lock on memory pool");
                return Err(NodeError::Storage(
                    "memory pool lock poisoned".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn get(&self, txid: &str) -> Option<Transaction> {
        match self.inner.read() {
            Ok(pool) => pool.get(txid).cloned(),
            Err(_) => {
                error!("Failed to acquire read lock on memory pool");
                None
            }
        }
    }

    pub fn contains(&self, txid: &str) -> bool {
        match self.inner.read() {
            Ok(pool) => pool.contains_key(txid),
            Err(_) => {
                error!("Failed to acquire read lock on memory pool");
                false
            }
        }
    }

    /// No-op when the id is absent.
    pub fn remove(&self, txid: &str) {
        match self.inner.write() {
            Ok(mut pool) => {
                pool.remove(txid);
            }
            Err(_) => {
                error!("Failed to acquire write lock on memory pool");
            }
        }
    }

    /// Owned copy for block assembly, ordered by (timestamp, id). Later inserts do
    /// not reach a snapshot that has already been taken.
    pub fn snapshot(&self) -> Vec<Transaction> {
        let mut txs: Vec<Transaction> = match self.inner.read() {
            Ok(pool) => pool.values().cloned().collect(),
            Err(_) => {
                error!("Failed to acquire read lock on memory pool");
                Vec::new()
            }
        };
        txs.sort_by(|a, b| {
            a.get_timestamp()
                .cmp(&b.get_timestamp())
                .then_with(|| a.get_id().cmp(b.get_id()))
        });
        txs
    }

    /// Run only after the block that consumed the pool is durably committed.
    pub fn clear(&self) {
        match self.inner.write() {
            Ok(mut pool) => {
                pool.clear();
            }
            Err(_) => {
                error!("Failed to acquire write lock on memory pool");
            }
        }
    }

    pub fn len(&self) -> usize {
        match self.inner.read() {
            Ok(pool) => pool.len(),
            Err(_) => {
                error!("Failed to acquire read lock on memory pool");
                0
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
