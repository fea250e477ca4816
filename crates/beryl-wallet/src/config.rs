//! Wallet configuration.
//!
//! [`WalletConfig`] is passed explicitly when a session is opened; the
//! network it names determines default ports, coinbase maturity and the
//! data directory layout. It is JSON-parseable so the owner API can accept
//! it as a string.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use beryl_core::constants::{
    DEFAULT_FEE_BASE, DEFAULT_GAP_LIMIT, DEFAULT_MAX_OUTPUTS, DEFAULT_MIN_CONFIRMATIONS,
    DEFAULT_NODE_TIMEOUT_MS, DEFAULT_SCAN_BATCH_SIZE, DEFAULT_TTL_BLOCKS, NetworkType,
};

use crate::encryption::KdfParams;
use crate::error::WalletError;

/// Configuration for one wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Root directory of this wallet's files.
    pub data_dir: PathBuf,
    pub network: NetworkType,
    /// `host:port` of the node's JSON-RPC API.
    pub node_api_addr: String,
    /// Timeout for a single node request.
    pub node_timeout_ms: u64,
    /// Fee per unit of transaction weight, in nanoberyl.
    pub fee_base: u64,
    pub min_confirmations: u64,
    /// Soft cap on inputs per transaction.
    pub max_outputs: usize,
    /// Blocks before an unanswered sent slate is cancelled. 0 disables.
    pub ttl_blocks: u64,
    pub scan_batch_size: u64,
    /// Consecutive batches without an owned output before a scan stops.
    pub gap_limit: u32,
    pub account: u32,
    /// Password hashing cost for new seed files.
    pub kdf: KdfParams,
}

impl Default for WalletConfig {
    fn default() -> Self {
        let network = NetworkType::default();
        Self {
            data_dir: default_data_dir(network),
            network,
            node_api_addr: format!("127.0.0.1:{}", network.default_node_port()),
            node_timeout_ms: DEFAULT_NODE_TIMEOUT_MS,
            fee_base: DEFAULT_FEE_BASE,
            min_confirmations: DEFAULT_MIN_CONFIRMATIONS,
            max_outputs: DEFAULT_MAX_OUTPUTS,
            ttl_blocks: DEFAULT_TTL_BLOCKS,
            scan_batch_size: DEFAULT_SCAN_BATCH_SIZE,
            gap_limit: DEFAULT_GAP_LIMIT,
            account: 0,
            kdf: KdfParams::default(),
        }
    }
}

impl WalletConfig {
    /// Defaults appropriate for `network`.
    pub fn for_network(network: NetworkType) -> Self {
        Self {
            data_dir: default_data_dir(network),
            network,
            node_api_addr: format!("127.0.0.1:{}", network.default_node_port()),
            ..Self::default()
        }
    }

    /// Parse a JSON config. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, WalletError> {
        serde_json::from_str(json).map_err(|e| WalletError::Serialization(format!("config: {e}")))
    }

    /// Directory holding the seed, state and lock files.
    pub fn wallet_data_dir(&self) -> PathBuf {
        self.data_dir.join("wallet_data")
    }

    /// Base URL of the node API.
    pub fn node_url(&self) -> String {
        if self.node_api_addr.starts_with("http://") || self.node_api_addr.starts_with("https://") {
            self.node_api_addr.clone()
        } else {
            format!("http://{}", self.node_api_addr)
        }
    }
}

/// `<platform data dir>/beryl/<network>`.
pub fn default_data_dir(network: NetworkType) -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("beryl")
        .join(network.data_dir_suffix())
}
