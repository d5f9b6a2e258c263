//! Data storage and persistence
//!
//! The chain file and the in-memory pool of pending transactions.

pub mod chain_store;
pub mod memory_pool;

pub use chain_store::{ChainStore, CHAIN_FILE};
pub use memory_pool::MemoryPool;
