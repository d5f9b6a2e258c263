//! Core chain functionality
//!
//! Blocks and transactions, the ledger that links and persists them, the
//! proof-of-work search, and the background miner that ties them together.

pub mod block;
pub mod ledger;
pub mod miner;
pub mod proof_of_work;
pub mod transaction;

pub use block::{Block, Entry};
pub use ledger::Ledger;
pub use miner::{BlockAnnouncer, Miner, MinerSettings, NoopAnnouncer, RoundOutcome};
pub use proof_of_work::{CancelToken, ProofOfWork};
pub use transaction::{Transaction, UNITS_PER_COIN};
