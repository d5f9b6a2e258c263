//! The running node
//!
//! `Node` owns the ledger, the transaction pool, the peer layer and the optional
//! miner, and is passed around explicitly instead of living in globals.

use crate::config::Config;
use crate::core::{Block, BlockAnnouncer, Ledger, Miner, Transaction};
use crate::error::{NodeError, Result};
use crate::network::{public_ip, MessageHandler, PeerId, Server};
use crate::storage::MemoryPool;
use log::{error, info, warn};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

pub struct Node {
    config: Config,
    ledger: Arc<Ledger>,
    pool: Arc<MemoryPool>,
    server: Arc<Server>,
    miner: Option<Arc<Miner>>,
    accept_loop: Mutex<Option<JoinHandle<()>>>,
}

impl Node {
    /// Open the chain, bind the listener and, when mining is enabled, prepare a
    /// miner paying `mining_address`. Nothing runs until `start` or `run`.
    pub fn new(
        config: Config,
        mining_address: Option<&str>,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<Node> {
        config.validate()?;

        let ledger = Arc::new(Ledger::open(&config.chain_file)?);
        info!(
            "Chain at {} has {} blocks",
            config.chain_file.display(),
            ledger.len()
        );
        let pool = Arc::new(MemoryPool::new());
        let server = Arc::new(Server::bind(
            &config.listen_addr(),
            handler,
            config.server_settings(),
        )?);

        let miner = if config.mine {
            let address = mining_address.ok_or_else(|| {
                NodeError::Config("mining is enabled but no mining address was given".to_string())
            })?;
            let announcer: Arc<dyn BlockAnnouncer> = server.clone();
            Some(Arc::new(Miner::new(
                Arc::clone(&ledger),
                Arc::clone(&pool),
                address,
                config.miner_settings(),
                announcer,
            )))
        } else {
            None
        };

        Ok(Node {
            config,
            ledger,
            pool,
            server,
            miner,
            accept_loop: Mutex::new(None),
        })
    }

    /// Start every service in the background and return.
    pub fn start(&self) -> Result<()> {
        self.start_services()?;
        let handle = self.server.start()?;
        match self.accept_loop.lock() {
            Ok(mut slot) => *slot = Some(handle),
            Err(_) => error!("Failed to acquire accept loop lock"),
        }
        Ok(())
    }

    /// Start every service, then run the accept loop on the calling thread until
    /// `shutdown`.
    pub fn run(&self) -> Result<()> {
        self.start_services()?;
        self.server.run()
    }

    fn start_services(&self) -> Result<()> {
        if self.config.public_ip_lookup {
            let ip = public_ip(&self.config.public_ip_service, self.config.public_ip_timeout());
            info!(
                "Node reachable at {}:{} (public IP {})",
                self.config.host,
                self.local_addr().port(),
                ip.as_deref().unwrap_or("Unknown")
            );
        }

        if let Some(bootstrap) = &self.config.bootstrap_peer {
            // A missing bootstrap peer is not fatal; the node still serves inbound peers.
            if let Err(e) = self.server.connect(bootstrap) {
                warn!("Bootstrap peer {bootstrap} unavailable: {e}");
            }
        }

        if let Some(miner) = &self.miner {
            miner.start()?;
        }
        Ok(())
    }

    pub fn submit_transaction(&self, tx: Transaction) -> Result<()> {
        self.pool.add(tx)
    }

    /// Commit a block produced elsewhere and announce it to every peer.
    pub fn append_block(&self, block: Block) -> Result<()> {
        self.ledger.append(block.clone())?;
        self.server.announce(&block);
        Ok(())
    }

    pub fn broadcast(&self, payload: &[u8], exclude: Option<PeerId>) -> usize {
        self.server.broadcast(payload, exclude)
    }

    /// Stop the miner, close all peers and stop accepting.
    pub fn shutdown(&self) -> Result<()> {
        if let Some(miner) = &self.miner {
            miner.stop();
            miner.wait()?;
        }
        self.server.shutdown();

        let handle = match self.accept_loop.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => {
                error!("Failed to acquire accept loop lock");
                None
            }
        };
        if let Some(handle) = handle {
            handle
                .join()
                .map_err(|_| NodeError::Connection("accept thread panicked".to_string()))?;
        }
        info!("Node stopped");
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn pool(&self) -> &Arc<MemoryPool> {
        &self.pool
    }

    pub fn server(&self) -> &Arc<Server> {
        &self.server
    }

    pub fn miner(&self) -> Option<&Arc<Miner>> {
        self.miner.as_ref()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::LogHandler;
    use crate::testnet::{create_temp_dir, init_test_logging, mine_next_block, signed_transaction};
    use std::thread;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    fn offline_config(dir: &TempDir) -> Config {
        Config {
            port: 0,
            bootstrap_peer: None,
            chain_file: dir.path().join("chain.dat"),
            wallet_file: dir.path().join("wallet.dat"),
            difficulty: 1,
            round_pause_ms: 10,
            public_ip_lookup: false,
            ..Config::default()
        }
    }

    #[test]
    fn test_node_without_miner() {
        init_test_logging();
        let dir = create_temp_dir().unwrap();
        let node = Node::new(offline_config(&dir), None, Arc::new(LogHandler)).unwrap();
        assert!(node.miner().is_none());
        assert_eq!(node.ledger().len(), 1);
        assert_ne!(node.local_addr().port(), 0);

        node.start().unwrap();
        node.submit_transaction(signed_transaction(3)).unwrap();
        assert_eq!(node.pool().len(), 1);
        node.shutdown().unwrap();
    }

    #[test]
    fn test_mining_requires_address() {
        let dir = create_temp_dir().unwrap();
        let config = Config {
            mine: true,
            ..offline_config(&dir)
        };
        let result = Node::new(config, None, Arc::new(LogHandler));
        assert!(matches!(result, Err(NodeError::Config(_))));
    }

    #[test]
    fn test_append_block_extends_ledger() {
        let dir = create_temp_dir().unwrap();
        let node = Node::new(offline_config(&dir), None, Arc::new(LogHandler)).unwrap();
        let block = mine_next_block(node.ledger(), 1).unwrap();
        node.append_block(block).unwrap();
        assert_eq!(node.ledger().len(), 2);

        let stale = Block::genesis();
        assert!(node.append_block(stale).is_err());
        assert_eq!(node.ledger().len(), 2);
    }

    #[test]
    fn test_mining_node_produces_blocks() {
        let dir = create_temp_dir().unwrap();
        let config = Config {
            mine: true,
            ..offline_config(&dir)
        };
        let node = Node::new(config, Some("miner"), Arc::new(LogHandler)).unwrap();
        node.start().unwrap();

        let deadline = Instant::now() + Duration::from_secs(10);
        while node.ledger().len() < 2 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        node.shutdown().unwrap();

        assert!(node.ledger().len() >= 2);
        assert!(!node.miner().unwrap().is_running());
    }
}
