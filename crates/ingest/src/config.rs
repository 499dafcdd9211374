//! Node configuration.
//!
//! Read from a JSON file (`CHUNKNODE_CONFIG`, default `chunknode.json`);
//! every field is optional. `CHUNKNODE_LISTEN` and `CHUNKNODE_STORAGE`
//! override the file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::DEFAULT_QUEUE_CAPACITY;

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "CHUNKNODE_CONFIG";

/// Environment variable overriding [`NodeConfig::listen_addr`].
pub const LISTEN_ENV: &str = "CHUNKNODE_LISTEN";

/// Environment variable overriding [`NodeConfig::storage_root`].
pub const STORAGE_ENV: &str = "CHUNKNODE_STORAGE";

const DEFAULT_CONFIG_FILE: &str = "chunknode.json";

/// Errors produced while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Storage node configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NodeConfig {
    /// Recorded on the `node` span that wraps every log line the node emits.
    pub node_name: String,

    /// Address the upload server binds.
    pub listen_addr: String,

    /// Directory holding `<file_id>/<chunk>.chunk` files.
    pub storage_root: PathBuf,

    /// Nodes every stored chunk is replicated to.
    pub forward_peers: Vec<String>,

    /// Capacity of the validation and forwarding queues.
    pub dispatch_queue_capacity: usize,

    /// Largest accepted chunk in bytes. Unlimited when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_chunk_bytes: Option<u64>,
}

fn default_name() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "chunknode".into())
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_name: default_name(),
            listen_addr: "0.0.0.0:50051".into(),
            storage_root: PathBuf::from("storage"),
            forward_peers: Vec::new(),
            dispatch_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_chunk_bytes: None,
        }
    }
}

impl NodeConfig {
    /// Loads configuration, falling back to defaults.
    ///
    /// A missing file is silent; an unreadable or malformed one is logged.
    /// Environment overrides are applied either way.
    pub fn load() -> Self {
        let path = std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        let mut config = if path.exists() {
            Self::load_from(&path).unwrap_or_else(|e| {
                tracing::warn!(
                    path = %path.display(),
                    "failed to load config, using defaults: {e}"
                );
                Self::default()
            })
        } else {
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config
    }

    /// Loads configuration from `path` without fallbacks or overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(addr) = lookup(LISTEN_ENV).filter(|v| !v.is_empty()) {
            self.listen_addr = addr;
        }
        if let Some(root) = lookup(STORAGE_ENV).filter(|v| !v.is_empty()) {
            self.storage_root = PathBuf::from(root);
        }
    }
}
