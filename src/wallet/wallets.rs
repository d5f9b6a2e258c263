use crate::error::{NodeError, Result};
use crate::utils::{open, seal};
use crate::wallet::Wallet;
use log::{debug, info};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

pub const WALLET_FILE: &str = "wallet.dat";
const WALLET_MAGIC: &[u8; 4] = b"EWLT";
const WALLET_FORMAT_VERSION: u16 = 1;

/// The wallet file: every key pair this node owns, keyed by address.
pub struct Wallets {
    path: PathBuf,
    wallets: HashMap<String, Wallet>,
}

impl Wallets {
    /// Load the wallet file at `path`. A missing file is an empty wallet set; an
    /// unreadable one is an error.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Wallets> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            debug!("No wallet file at {}", path.display());
            return Ok(Wallets {
                path,
                wallets: HashMap::new(),
            });
        }

        let mut file = File::open(&path)?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        let wallets: HashMap<String, Wallet> = open(WALLET_MAGIC, WALLET_FORMAT_VERSION, &bytes)
            .map_err(|e| {
                NodeError::Wallet(format!("Failed to read wallet file {}: {e}", path.display()))
            })?;
        info!("Loaded {} wallets from {}", wallets.len(), path.display());
        Ok(Wallets { path, wallets })
    }

    /// Generate a key pair, persist the wallet file and return the new address.
    pub fn create_address(&mut self) -> Result<String> {
        let wallet = Wallet::new()?;
        let address = wallet.get_address();
        self.wallets.insert(address.clone(), wallet);
        self.save()?;
        info!("Created address {address}");
        Ok(address)
    }

    /// Sorted, so the "first" address is stable across runs.
    pub fn get_addresses(&self) -> Vec<String> {
        let mut addresses: Vec<String> = self.wallets.keys().cloned().collect();
        addresses.sort();
        addresses
    }

    pub fn first_address(&self) -> Option<String> {
        self.get_addresses().into_iter().next()
    }

    pub fn get_wallet(&self, address: &str) -> Option<&Wallet> {
        self.wallets.get(address)
    }

    pub fn sign(&self, address: &str, data: &[u8]) -> Result<String> {
        self.get_wallet(address)
            .ok_or_else(|| NodeError::Wallet(format!("No key for address {address}")))?
            .sign(data)
    }

    pub fn len(&self) -> usize {
        self.wallets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self) -> Result<()> {
        let bytes = seal(WALLET_MAGIC, WALLET_FORMAT_VERSION, &self.wallets)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut tmp_name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| WALLET_FILE.into());
        tmp_name.push(".tmp");
        let tmp_path = self.path.with_file_name(tmp_name);

        let file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&bytes)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        drop(writer);
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}
