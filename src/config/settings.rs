use crate::crypto::PrivateKey;
use crate::error::{BlockchainError, Result};
use crate::network::{ServerOptions, DEFAULT_LISTEN_ADDR, DEFAULT_MAX_PEERS};
use crate::storage::{SledStore, Storage, DEFAULT_MEMPOOL_CAPACITY};
use log::{info, warn};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

const NODE_ID_KEY: &str = "NODE_ID";
const NODE_ADDRESS_KEY: &str = "NODE_ADDRESS";
const SEED_NODES_KEY: &str = "SEED_NODES";
const BLOCK_TIME_MS_KEY: &str = "BLOCK_TIME_MS";

pub const DEFAULT_BLOCK_TIME_MS: u64 = 5000;

/// Node settings as read from a TOML file, the environment and the command
/// line, applied in that order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NodeConfig {
    pub id: String,
    pub listen_addr: String,
    pub seed_nodes: Vec<String>,
    pub block_time_ms: u64,
    pub mempool_capacity: usize,
    pub max_peers: usize,
    /// Hex PKCS#8 key; when set the node produces blocks.
    pub key_file: Option<PathBuf>,
    /// Produce with a throwaway key if no `key_file` is given.
    pub producer: bool,
    /// Keep blocks in a sled database here instead of memory.
    pub data_dir: Option<PathBuf>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            id: Uuid::new_v4().to_string(),
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            seed_nodes: Vec::new(),
            block_time_ms: DEFAULT_BLOCK_TIME_MS,
            mempool_capacity: DEFAULT_MEMPOOL_CAPACITY,
            max_peers: DEFAULT_MAX_PEERS,
            key_file: None,
            producer: false,
            data_dir: None,
        }
    }
}

impl NodeConfig {
    pub fn from_toml_str(text: &str) -> Result<NodeConfig> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_toml_file(path: &Path) -> Result<NodeConfig> {
        let text = fs::read_to_string(path).map_err(|e| {
            BlockchainError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Override fields from `NODE_ID`, `NODE_ADDRESS`, `SEED_NODES` and
    /// `BLOCK_TIME_MS`.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_vars(|key| env::var(key).ok())
    }

    fn apply_vars<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(id) = lookup(NODE_ID_KEY) {
            self.id = id;
        }
        if let Some(addr) = lookup(NODE_ADDRESS_KEY) {
            self.listen_addr = addr;
        }
        if let Some(seeds) = lookup(SEED_NODES_KEY) {
            self.seed_nodes = seeds
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(ms) = lookup(BLOCK_TIME_MS_KEY) {
            self.block_time_ms = ms.trim().parse().map_err(|e| {
                BlockchainError::Config(format!("Invalid {BLOCK_TIME_MS_KEY} '{ms}': {e}"))
            })?;
        }
        Ok(())
    }

    pub fn block_time(&self) -> Duration {
        Duration::from_millis(self.block_time_ms)
    }

    /// The producer key, if this node is a producer.
    pub fn load_private_key(&self) -> Result<Option<PrivateKey>> {
        if let Some(path) = &self.key_file {
            let text = fs::read_to_string(path).map_err(|e| {
                BlockchainError::Config(format!("Failed to read key file {}: {e}", path.display()))
            })?;
            let key = PrivateKey::from_hex(&text)?;
            info!("Loaded producer key for {}", key.public_key().address());
            return Ok(Some(key));
        }
        if self.producer {
            let key = PrivateKey::generate()?;
            warn!(
                "No key file given, producing with ephemeral key {}",
                key.public_key().address()
            );
            return Ok(Some(key));
        }
        Ok(None)
    }

    pub fn into_server_options(self) -> Result<ServerOptions> {
        let private_key = self.load_private_key()?;
        let block_time = self.block_time();
        let storage = match &self.data_dir {
            Some(dir) => {
                info!("Storing blocks in {}", dir.display());
                Some(Box::new(SledStore::open(dir)?) as Box<dyn Storage>)
            }
            None => None,
        };

        Ok(ServerOptions {
            id: self.id,
            listen_addr: self.listen_addr,
            seed_nodes: self.seed_nodes,
            block_time,
            private_key,
            mempool_capacity: self.mempool_capacity,
            max_peers: self.max_peers,
            storage,
            ..ServerOptions::default()
        })
    }
}
