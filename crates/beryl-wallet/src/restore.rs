//! Output index scanning and seed restore.
//!
//! The node's output index is walked in batches. For each unspent output
//! the wallet tries to unmask the attached proof with its rewind key; a
//! candidate is accepted only if recommitting the recovered value with the
//! derived blinding factor reproduces the on-chain commitment, so amounts
//! reported by the node are never trusted.
//!
//! Scans are resumable: every result carries the last index covered, and
//! a later call starting from it picks up where this one stopped.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use beryl_core::traits::NodeClient;
use beryl_core::types::Commitment;

use crate::error::WalletError;
use crate::keys::{DerivationPath, KeyChain};
use crate::mnemonic::mnemonic_to_seed;

/// An owned output found on chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveredOutput {
    pub commitment: Commitment,
    pub value: u64,
    pub path: DerivationPath,
    pub mmr_index: u64,
    pub height: u64,
    pub is_coinbase: bool,
    pub lock_height: u64,
}

/// Why a scan stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanStatus {
    /// Reached the end of the requested range.
    Complete,
    /// Gap limit reached: too many consecutive batches without an owned
    /// output. A normal terminal condition.
    Exhausted,
    /// Stopped at the batch budget; call again from `last_retrieved_index`.
    Partial,
}

/// Outputs recovered by one scan call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoredLedger {
    pub outputs: Vec<RecoveredOutput>,
    /// Highest index covered; pass as `start_index` to resume.
    pub last_retrieved_index: u64,
    /// Highest index present at the node when the scan ran.
    pub highest_index: u64,
    pub status: ScanStatus,
}

impl RestoredLedger {
    /// Next derivation index not used by any recovered output.
    pub fn next_key_index(&self) -> u32 {
        self.outputs
            .iter()
            .map(|o| o.path.index.saturating_add(1))
            .max()
            .unwrap_or(0)
    }

    pub fn total_value(&self) -> u64 {
        self.outputs.iter().map(|o| o.value).sum()
    }
}

/// Index window to scan: `(start_index, end_index]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScanRange {
    /// Exclusive lower bound, usually a previous `last_retrieved_index`.
    pub start_index: u64,
    /// Inclusive upper bound. `None` scans to the node's highest index.
    pub end_index: Option<u64>,
}

/// Scan parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scanner {
    pub batch_size: u64,
    /// Consecutive batches without an owned output before stopping.
    pub gap_limit: u32,
    /// Batches to fetch in one call. `None` runs to completion.
    pub max_batches: Option<u32>,
    pub coinbase_maturity: u64,
}

impl Scanner {
    /// Scan `range` of the node's output index for outputs owned by `keychain`.
    pub fn scan(
        &self,
        keychain: &KeyChain,
        node: &dyn NodeClient,
        range: ScanRange,
    ) -> Result<RestoredLedger, WalletError> {
        let batch_size = self.batch_size.max(1);
        let mut outputs = Vec::new();
        let mut cursor = range.start_index;
        let mut empty_batches = 0u32;
        let mut batches = 0u32;

        loop {
            let batch = node.get_outputs_in_range(cursor, range.end_index, batch_size)?;
            let end = range.end_index.unwrap_or(batch.highest_index).min(batch.highest_index);
            batches += 1;

            let before = outputs.len();
            for leaf in &batch.outputs {
                if let Some((path, value)) = keychain.recover_output(&leaf.commitment, &leaf.proof) {
                    let lock_height = if leaf.is_coinbase { leaf.height + self.coinbase_maturity } else { 0 };
                    outputs.push(RecoveredOutput {
                        commitment: leaf.commitment,
                        value,
                        path,
                        mmr_index: leaf.mmr_index,
                        height: leaf.height,
                        is_coinbase: leaf.is_coinbase,
                        lock_height,
                    });
                }
            }
            let found = outputs.len() - before;
            debug!(
                start = cursor,
                last = batch.last_retrieved_index,
                highest = batch.highest_index,
                found,
                "scanned output batch"
            );

            if found == 0 {
                empty_batches += 1;
            } else {
                empty_batches = 0;
            }

            // A node that makes no progress would otherwise loop forever.
            let advanced = batch.last_retrieved_index > cursor;
            cursor = cursor.max(batch.last_retrieved_index);

            let status = if cursor >= end || !advanced {
                Some(ScanStatus::Complete)
            } else if self.gap_limit > 0 && empty_batches >= self.gap_limit {
                Some(ScanStatus::Exhausted)
            } else if self.max_batches.is_some_and(|max| batches >= max) {
                Some(ScanStatus::Partial)
            } else {
                None
            };

            if let Some(status) = status {
                info!(
                    recovered = outputs.len(),
                    last_retrieved_index = cursor,
                    highest_index = batch.highest_index,
                    ?status,
                    "output scan finished"
                );
                return Ok(RestoredLedger {
                    outputs,
                    last_retrieved_index: cursor,
                    highest_index: batch.highest_index,
                    status,
                });
            }
        }
    }
}

/// Rebuild a ledger from a seed phrase by scanning the node.
pub fn restore(
    seed_phrase: &str,
    account: u32,
    node: &dyn NodeClient,
    range: ScanRange,
    scanner: &Scanner,
) -> Result<RestoredLedger, WalletError> {
    let seed = mnemonic_to_seed(seed_phrase)?;
    let keychain = KeyChain::new(&seed, account);
    scanner.scan(&keychain, node, range)
}
