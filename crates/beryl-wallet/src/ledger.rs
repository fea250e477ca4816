//! Output ledger and balance computation.
//!
//! The ledger holds every output the wallet owns, keyed by commitment.
//! Status moves forward `Unconfirmed -> Unspent -> Locked -> Spent`; the
//! only backwards move is `Locked -> Unspent` when a transaction attempt
//! is cancelled.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use beryl_core::traits::OutputInfo;
use beryl_core::types::Commitment;

use crate::error::WalletError;
use crate::keys::DerivationPath;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputStatus {
    /// Created by a transaction that has not been seen on chain.
    Unconfirmed,
    /// On chain and not committed to any pending transaction.
    Unspent,
    /// Selected as input of a pending transaction.
    Locked,
    Spent,
}

/// One output owned by the wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRecord {
    pub commitment: Commitment,
    /// Value in nanoberyl.
    pub value: u64,
    pub path: DerivationPath,
    pub status: OutputStatus,
    /// Earliest block height at which the output may be spent.
    pub lock_height: u64,
    /// Height of the including block, once observed.
    pub height: Option<u64>,
    /// Confirmations observed at the last refresh.
    pub confirmations: u64,
    pub is_coinbase: bool,
    /// Log entry of the transaction that created this output.
    pub tx_log_id: Option<u32>,
    /// Log entry of the pending transaction spending this output.
    pub locked_by: Option<u32>,
    /// Insertion order, used to break ties in coin selection.
    pub seq: u64,
}

impl OutputRecord {
    /// Whether coin selection may use this output.
    pub fn is_eligible(&self, min_confirmations: u64, tip: u64) -> bool {
        self.status == OutputStatus::Unspent
            && self.confirmations >= min_confirmations
            && self.lock_height <= tip
    }
}

/// Wallet balance in nanoberyl.
///
/// `total = spendable + awaiting_confirmation + unconfirmed + locked`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub total: u64,
    /// Unspent with enough confirmations and past its lock height.
    pub spendable: u64,
    /// Unspent but not yet spendable.
    pub awaiting_confirmation: u64,
    pub unconfirmed: u64,
    pub locked: u64,
}

/// Counts of status changes applied by a refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChainUpdate {
    pub confirmed: usize,
    pub spent: usize,
}

/// The set of outputs owned by the wallet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputLedger {
    outputs: BTreeMap<Commitment, OutputRecord>,
    next_seq: u64,
}

impl OutputLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    pub fn get(&self, commitment: &Commitment) -> Option<&OutputRecord> {
        self.outputs.get(commitment)
    }

    pub fn contains(&self, commitment: &Commitment) -> bool {
        self.outputs.contains_key(commitment)
    }

    /// Outputs in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &OutputRecord> {
        let mut records: Vec<&OutputRecord> = self.outputs.values().collect();
        records.sort_by_key(|r| r.seq);
        records.into_iter()
    }

    /// Insert a new output, assigning its creation sequence number.
    pub fn insert(&mut self, mut record: OutputRecord) -> Result<(), WalletError> {
        if self.outputs.contains_key(&record.commitment) {
            return Err(WalletError::DuplicateOutput(record.commitment.to_string()));
        }
        record.seq = self.next_seq;
        self.next_seq += 1;
        self.outputs.insert(record.commitment, record);
        Ok(())
    }

    /// Record an output produced by a transaction not yet on chain.
    pub fn add_unconfirmed(
        &mut self,
        commitment: Commitment,
        value: u64,
        path: DerivationPath,
        tx_log_id: u32,
    ) -> Result<(), WalletError> {
        self.insert(OutputRecord {
            commitment,
            value,
            path,
            status: OutputStatus::Unconfirmed,
            lock_height: 0,
            height: None,
            confirmations: 0,
            is_coinbase: false,
            tx_log_id: Some(tx_log_id),
            locked_by: None,
            seq: 0,
        })
    }

    /// Lock `commitments` as inputs of log entry `tx_log_id`.
    ///
    /// Either every output is locked or none is: all must currently be
    /// Unspent.
    pub fn lock(&mut self, commitments: &[Commitment], tx_log_id: u32) -> Result<(), WalletError> {
        for c in commitments {
            match self.outputs.get(c) {
                Some(r) if r.status == OutputStatus::Unspent => {}
                Some(_) => return Err(WalletError::DoubleLockAttempt(c.to_string())),
                None => return Err(WalletError::TransactionNotFound(format!("output {c}"))),
            }
        }
        for c in commitments {
            if let Some(r) = self.outputs.get_mut(c) {
                r.status = OutputStatus::Locked;
                r.locked_by = Some(tx_log_id);
            }
        }
        Ok(())
    }

    /// Return every output locked by `tx_log_id` to Unspent.
    pub fn unlock_for(&mut self, tx_log_id: u32) -> usize {
        let mut count = 0;
        for r in self.outputs.values_mut() {
            if r.status == OutputStatus::Locked && r.locked_by == Some(tx_log_id) {
                r.status = OutputStatus::Unspent;
                r.locked_by = None;
                count += 1;
            }
        }
        count
    }

    /// Delete the unconfirmed outputs created by `tx_log_id`.
    pub fn remove_unconfirmed_for(&mut self, tx_log_id: u32) -> usize {
        let before = self.outputs.len();
        self.outputs
            .retain(|_, r| !(r.status == OutputStatus::Unconfirmed && r.tx_log_id == Some(tx_log_id)));
        before - self.outputs.len()
    }

    /// Mark every output locked by `tx_log_id` as Spent.
    pub fn spend_locked_for(&mut self, tx_log_id: u32) -> usize {
        let mut count = 0;
        for r in self.outputs.values_mut() {
            if r.status == OutputStatus::Locked && r.locked_by == Some(tx_log_id) {
                r.status = OutputStatus::Spent;
                count += 1;
            }
        }
        count
    }

    /// Commitments worth asking the node about: everything not yet Spent.
    pub fn live_commitments(&self) -> Vec<Commitment> {
        self.outputs
            .values()
            .filter(|r| r.status != OutputStatus::Spent)
            .map(|r| r.commitment)
            .collect()
    }

    /// Apply the node's view of `queried` outputs at height `tip`.
    ///
    /// Outputs found on chain get their height and confirmations; an
    /// Unconfirmed one becomes Unspent. Unspent or Locked outputs missing
    /// from the chain have been spent. Outputs outside `queried` (added
    /// while the node was being asked) are left alone.
    pub fn apply_chain_state(
        &mut self,
        tip: u64,
        queried: &[Commitment],
        found: &HashMap<Commitment, OutputInfo>,
        coinbase_maturity: u64,
    ) -> ChainUpdate {
        let mut update = ChainUpdate::default();
        for c in queried {
            let Some(record) = self.outputs.get_mut(c) else {
                continue;
            };
            match (found.get(c), record.status) {
                (_, OutputStatus::Spent) => {}
                (Some(info), status) => {
                    record.height = Some(info.height);
                    record.confirmations = info.confirmations(tip);
                    record.is_coinbase = info.is_coinbase;
                    if info.is_coinbase {
                        record.lock_height = info.height + coinbase_maturity;
                    }
                    if status == OutputStatus::Unconfirmed {
                        record.status = OutputStatus::Unspent;
                        update.confirmed += 1;
                    }
                }
                (None, OutputStatus::Unspent | OutputStatus::Locked) => {
                    record.status = OutputStatus::Spent;
                    update.spent += 1;
                }
                (None, OutputStatus::Unconfirmed) => {}
            }
        }
        update
    }

    /// Split the ledger's value by status.
    ///
    /// Uses only local state, so it is exact even before any refresh.
    pub fn balance(&self, min_confirmations: u64, tip: u64) -> Balance {
        let mut b = Balance::default();
        for r in self.outputs.values() {
            match r.status {
                OutputStatus::Unspent if r.is_eligible(min_confirmations, tip) => b.spendable += r.value,
                OutputStatus::Unspent => b.awaiting_confirmation += r.value,
                OutputStatus::Unconfirmed => b.unconfirmed += r.value,
                OutputStatus::Locked => b.locked += r.value,
                OutputStatus::Spent => {}
            }
        }
        b.total = b.spendable + b.awaiting_confirmation + b.unconfirmed + b.locked;
        b
    }

    /// Outputs the coin selector may use, ordered by `(value, seq)`.
    pub fn eligible(&self, min_confirmations: u64, tip: u64) -> Vec<&OutputRecord> {
        let mut eligible: Vec<&OutputRecord> = self
            .outputs
            .values()
            .filter(|r| r.is_eligible(min_confirmations, tip))
            .collect();
        eligible.sort_by_key(|r| (r.value, r.seq));
        eligible
    }
}
