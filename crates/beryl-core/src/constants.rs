//! Protocol constants. All monetary values in nanoberyl (1 BERYL = 10^9 nanoberyl).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const COIN: u64 = 1_000_000_000;

/// Default fee base in nanoberyl, multiplied by the transaction weight.
pub const DEFAULT_FEE_BASE: u64 = 500_000;

/// Default number of confirmations before an output is spendable.
pub const DEFAULT_MIN_CONFIRMATIONS: u64 = 10;

/// Soft cap on the number of inputs coin selection will gather.
pub const DEFAULT_MAX_OUTPUTS: usize = 500;

/// Blocks after which an unanswered sender slate is cancelled on refresh.
pub const DEFAULT_TTL_BLOCKS: u64 = 1_440;

/// Outputs requested from the node per restore batch.
pub const DEFAULT_SCAN_BATCH_SIZE: u64 = 1_000;

/// Consecutive batches without an owned output before restore stops.
pub const DEFAULT_GAP_LIMIT: u32 = 100;

/// Default timeout for a single node request.
pub const DEFAULT_NODE_TIMEOUT_MS: u64 = 20_000;

/// Network type: Mainnet, Testnet, or Regtest.
///
/// Selected explicitly in the wallet configuration; nothing in the engine
/// keeps a process-wide chain type.
///
/// # Examples
///
/// ```
/// use beryl_core::constants::NetworkType;
/// let net = NetworkType::default();
/// assert_eq!(net, NetworkType::Mainnet);
/// assert_eq!(net.coinbase_maturity(), 1_440);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    /// Production network.
    #[default]
    Mainnet,
    /// Public test network.
    Testnet,
    /// Local regression-test network with instant coinbase maturity.
    Regtest,
}

impl NetworkType {
    /// Blocks a coinbase output must wait before it can be spent.
    pub fn coinbase_maturity(&self) -> u64 {
        match self {
            Self::Mainnet | Self::Testnet => 1_440,
            Self::Regtest => 3,
        }
    }

    /// Default TCP port of the node's JSON-RPC API.
    ///
    /// # Examples
    ///
    /// ```
    /// use beryl_core::constants::NetworkType;
    /// assert_eq!(NetworkType::Testnet.default_node_port(), 13413);
    /// ```
    pub fn default_node_port(&self) -> u16 {
        match self {
            Self::Mainnet => 3413,
            Self::Testnet => 13413,
            Self::Regtest => 23413,
        }
    }

    /// Subdirectory name used under the wallet's top-level data directory.
    pub fn data_dir_suffix(&self) -> &'static str {
        match self {
            Self::Mainnet => "main",
            Self::Testnet => "test",
            Self::Regtest => "regtest",
        }
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
            Self::Regtest => "regtest",
        };
        f.write_str(name)
    }
}

impl FromStr for NetworkType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" => Ok(Self::Mainnet),
            // "floonet" was the historical testnet name.
            "testnet" | "floonet" => Ok(Self::Testnet),
            "regtest" => Ok(Self::Regtest),
            other => Err(format!("unknown network: {other}")),
        }
    }
}
