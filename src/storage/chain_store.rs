use crate::core::Block;
use crate::error::{NodeError, Result};
use crate::utils::{open, seal};
use log::{debug, info};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

pub const CHAIN_FILE: &str = "blockchain.dat";
const CHAIN_MAGIC: &[u8; 4] = b"EMBR";
const CHAIN_FORMAT_VERSION: u16 = 1;

/// Single-file snapshot of the whole chain.
#[derive(Debug, Clone)]
pub struct ChainStore {
    path: PathBuf,
}

impl ChainStore {
    pub fn new<P: AsRef<Path>>(path: P) -> ChainStore {
        ChainStore {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Write the chain to a sibling temp file, fsync it, then rename it over the
    /// store so a crash never leaves a half-written chain behind.
    pub fn save(&self, blocks: &[Block]) -> Result<()> {
        let bytes = seal(CHAIN_MAGIC, CHAIN_FORMAT_VERSION, &blocks.to_vec())?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = self.tmp_path();
        {
            let file = OpenOptions::new()
                .create(true)
                .truncate(true)
                .write(true)
                .open(&tmp_path)?;
            let mut writer = BufWriter::new(file);
            writer.write_all(&bytes)?;
            writer.flush()?;
            writer
                .get_ref()
                .sync_all()
                .map_err(|e| NodeError::Storage(format!("Failed to sync chain file: {e}")))?;
        }
        fs::rename(&tmp_path, &self.path).map_err(|e| {
            NodeError::Storage(format!(
                "Failed to move chain file into place at {}: {e}",
                self.path.display()
            ))
        })?;

        debug!(
            "Persisted {} blocks ({} bytes) to {}",
            blocks.len(),
            bytes.len(),
            self.path.display()
        );
        Ok(())
    }

    /// `Ok(None)` when no store exists yet.
    pub fn load(&self) -> Result<Option<Vec<Block>>> {
        if !self.exists() {
            info!("No chain file at {}", self.path.display());
            return Ok(None);
        }

        let mut file = File::open(&self.path)?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        let blocks: Vec<Block> = open(CHAIN_MAGIC, CHAIN_FORMAT_VERSION, &bytes)?;
        info!(
            "Loaded {} blocks from {}",
            blocks.len(),
            self.path.display()
        );
        Ok(Some(blocks))
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| CHAIN_FILE.into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
