use crate::core::MinerSettings;
use crate::error::{NodeError, Result};
use crate::network::ServerSettings;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8333;
pub const DEFAULT_BOOTSTRAP_PEER: &str = "5.178.148.11:8333";
pub const DEFAULT_DIFFICULTY: u32 = 4;
pub const DEFAULT_PUBLIC_IP_SERVICE: &str = "https://api64.ipify.org?format=json";

/// Highest difficulty a 64-character hex digest can express.
const MAX_DIFFICULTY: u32 = 64;

const NODE_HOST_KEY: &str = "NODE_HOST";
const NODE_PORT_KEY: &str = "NODE_PORT";
const BOOTSTRAP_PEER_KEY: &str = "BOOTSTRAP_PEER";
const CHAIN_FILE_KEY: &str = "CHAIN_FILE";
const WALLET_FILE_KEY: &str = "WALLET_FILE";
const MINING_DIFFICULTY_KEY: &str = "MINING_DIFFICULTY";

/// Node settings. Resolution order is defaults, then the TOML file, then
/// environment variables, then command-line flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// `None` runs the node without a bootstrap connection.
    pub bootstrap_peer: Option<String>,
    pub chain_file: PathBuf,
    pub wallet_file: PathBuf,
    pub mine: bool,
    pub difficulty: u32,
    pub round_pause_ms: u64,
    pub connect_timeout_ms: u64,
    pub write_timeout_ms: u64,
    pub public_ip_lookup: bool,
    pub public_ip_service: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            bootstrap_peer: Some(DEFAULT_BOOTSTRAP_PEER.to_string()),
            chain_file: PathBuf::from(crate::storage::CHAIN_FILE),
            wallet_file: PathBuf::from(crate::wallet::WALLET_FILE),
            mine: false,
            difficulty: DEFAULT_DIFFICULTY,
            round_pause_ms: 1_000,
            connect_timeout_ms: 5_000,
            write_timeout_ms: 5_000,
            public_ip_lookup: true,
            public_ip_service: DEFAULT_PUBLIC_IP_SERVICE.to_string(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            NodeError::Config(format!("Failed to read config file {}: {e}", path.display()))
        })?;
        let config: Config = toml::from_str(&text)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Defaults, or the given file, with process environment overrides applied.
    pub fn resolve(path: Option<&Path>) -> Result<Config> {
        let mut config = match path {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };
        config.apply_overrides(|key| env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from `lookup`, keyed by environment variable name.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(NODE_HOST_KEY) {
            self.host = host;
        }
        if let Some(port) = lookup(NODE_PORT_KEY) {
            self.port = port
                .parse()
                .map_err(|e| NodeError::Config(format!("Invalid {NODE_PORT_KEY} {port:?}: {e}")))?;
        }
        if let Some(peer) = lookup(BOOTSTRAP_PEER_KEY) {
            // An empty value disables the bootstrap connection.
            self.bootstrap_peer = if peer.is_empty() { None } else { Some(peer) };
        }
        if let Some(file) = lookup(CHAIN_FILE_KEY) {
            self.chain_file = PathBuf::from(file);
        }
        if let Some(file) = lookup(WALLET_FILE_KEY) {
            self.wallet_file = PathBuf::from(file);
        }
        if let Some(difficulty) = lookup(MINING_DIFFICULTY_KEY) {
            self.difficulty = difficulty.parse().map_err(|e| {
                NodeError::Config(format!(
                    "Invalid {MINING_DIFFICULTY_KEY} {difficulty:?}: {e}"
                ))
            })?;
        }
        debug!("Effective configuration: {self:?}");
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(NodeError::Config("host must not be empty".to_string()));
        }
        if self.difficulty > MAX_DIFFICULTY {
            return Err(NodeError::Config(format!(
                "difficulty {} exceeds the maximum of {MAX_DIFFICULTY}",
                self.difficulty
            )));
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn miner_settings(&self) -> MinerSettings {
        MinerSettings {
            difficulty: self.difficulty,
            round_pause: Duration::from_millis(self.round_pause_ms),
        }
    }

    pub fn server_settings(&self) -> ServerSettings {
        ServerSettings {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            write_timeout: Duration::from_millis(self.write_timeout_ms),
        }
    }

    pub fn public_ip_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}
