//! # Ember Chain
//!
//! A small proof-of-work ledger node. It keeps an append-only chain of blocks on
//! disk, mines new blocks over a pool of pending transactions on a background
//! thread, and exchanges raw messages with other nodes over TCP.
//!
//! ## Layout
//! - `core/`: blocks, transactions, the ledger, proof of work and the miner
//! - `storage/`: the chain file and the transaction pool
//! - `network/`: peers, broadcast and the listening server
//! - `node/`: the context that wires a running node together
//! - `wallet/`: key pairs, addresses and signatures
//! - `config/`: settings from file, environment and flags
//! - `utils/`: hashing, encoding and the on-disk envelope
//! - `cli/`: argument parsing for the binary
//!
//! ## Where to start
//! 1. `node/mod.rs` shows how the pieces are wired.
//! 2. `core/ledger.rs` holds the chain rules.
//! 3. `core/miner.rs` holds the mining round and its cancellation.
//! 4. `network/server.rs` holds the connection lifecycle.

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod network;
pub mod node;
pub mod storage;
pub mod utils;
pub mod wallet;

#[cfg(test)]
pub mod testnet;

pub use cli::{Command, Opt};
pub use config::Config;
pub use core::{
    Block, BlockAnnouncer, CancelToken, Entry, Ledger, Miner, MinerSettings, NoopAnnouncer,
    ProofOfWork, RoundOutcome, Transaction,
};
pub use error::{NodeError, Result};
pub use network::{
    public_ip, Direction, LogHandler, MessageHandler, Peer, PeerId, PeerSet, Server,
    ServerSettings, Transport,
};
pub use node::Node;
pub use storage::{ChainStore, MemoryPool};
pub use utils::{
    base58_decode, base58_encode, current_timestamp, ecdsa_p256_sha256_sign_digest,
    ecdsa_p256_sha256_sign_verify, new_key_pair, ripemd160_digest, sha256_digest, sha256_hex,
};
pub use wallet::{validate_address, verify, Wallet, Wallets};
