//! Trait interfaces for the Beryl wallet engine.
//!
//! - [`NodeClient`]: the remote node's chain index, queried by refresh,
//!   post and restore. Implemented over JSON-RPC by the CLI and in memory by
//!   the `testing` feature.

use serde::{Deserialize, Serialize};

use crate::error::NodeError;
use crate::types::{Commitment, OutputProof, PublicKey, Transaction};

/// Chain state of one unspent output as reported by the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputInfo {
    pub commitment: Commitment,
    /// Height of the block that included the output.
    pub height: u64,
    pub is_coinbase: bool,
}

impl OutputInfo {
    /// Confirmations at the given tip, counting the including block.
    pub fn confirmations(&self, tip: u64) -> u64 {
        tip.saturating_sub(self.height) + 1
    }
}

/// One leaf of the node's ordered output index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainOutput {
    /// Position in the node's output index (1-based).
    pub mmr_index: u64,
    pub commitment: Commitment,
    pub proof: OutputProof,
    pub height: u64,
    pub is_coinbase: bool,
}

/// A window of the node's output index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRange {
    /// Highest index currently present at the node.
    pub highest_index: u64,
    /// Highest index covered by this response.
    pub last_retrieved_index: u64,
    pub outputs: Vec<ChainOutput>,
}

/// Why the node refused a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    /// An input is already spent on chain or by a pooled transaction.
    InputSpent(Commitment),
    /// An output commitment already exists.
    DuplicateOutput(Commitment),
    /// Failed validation.
    Invalid(String),
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InputSpent(c) => write!(f, "input already spent: {c}"),
            Self::DuplicateOutput(c) => write!(f, "duplicate output: {c}"),
            Self::Invalid(msg) => write!(f, "invalid transaction: {msg}"),
        }
    }
}

/// Result of submitting a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostOutcome {
    Accepted,
    Rejected(RejectReason),
}

/// The remote node, as seen by the wallet.
///
/// Every call may block on network I/O and must honour the client's
/// configured timeout, reporting [`NodeError::Timeout`] rather than blocking
/// indefinitely. Implementations do not retry.
pub trait NodeClient: Send + Sync {
    /// Current chain tip height.
    fn get_height(&self) -> Result<u64, NodeError>;

    /// Look up unspent outputs by commitment. Commitments that are unknown or
    /// spent are omitted from the result.
    fn get_outputs(&self, commitments: &[Commitment]) -> Result<Vec<OutputInfo>, NodeError>;

    /// Submit a finalized transaction to the node's pool.
    fn post_transaction(&self, tx: &Transaction) -> Result<PostOutcome, NodeError>;

    /// Unspent outputs with index in `(start_index, end_index]`, at most
    /// `max` of them. `end_index = None` means up to the node's highest index.
    fn get_outputs_in_range(
        &self,
        start_index: u64,
        end_index: Option<u64>,
        max: u64,
    ) -> Result<OutputRange, NodeError>;

    /// Index bounds `(first, last)` of the node's output index covering the
    /// given block heights. `None` means the current tip.
    fn get_pmmr_range(&self, start_height: u64, end_height: Option<u64>)
        -> Result<(u64, u64), NodeError>;

    /// Height of the block containing the kernel with this excess, if mined.
    fn get_kernel(&self, excess: &PublicKey) -> Result<Option<u64>, NodeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmations_count_including_block() {
        let info = OutputInfo { commitment: Commitment([0; 32]), height: 10, is_coinbase: false };
        assert_eq!(info.confirmations(10), 1);
        assert_eq!(info.confirmations(12), 3);
        // A stale tip never underflows.
        assert_eq!(info.confirmations(5), 1);
    }

    #[test]
    fn reject_reason_display() {
        let r = RejectReason::Invalid("bad kernel".into());
        assert_eq!(r.to_string(), "invalid transaction: bad kernel");
    }
}
