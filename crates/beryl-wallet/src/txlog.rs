//! Transaction log.
//!
//! One entry per transaction attempt, sent or received. Entries are never
//! deleted; a cancelled attempt keeps its entry marked Cancelled so the
//! history stays auditable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use beryl_core::types::{Commitment, PublicKey, Transaction};

use crate::error::WalletError;
use crate::slate::{SlateId, SlateStage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxDirection {
    Sent,
    Received,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxStatus {
    Pending,
    Confirmed,
    Cancelled,
}

/// Durable record of one transaction attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxLogEntry {
    pub id: u32,
    pub slate_id: SlateId,
    pub direction: TxDirection,
    /// Amount transferred to the receiver, in nanoberyl.
    pub amount: u64,
    pub fee: u64,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub status: TxStatus,
    /// How far the slate exchange got.
    pub stage: SlateStage,
    /// Own outputs spent by this transaction.
    pub inputs: Vec<Commitment>,
    /// Own outputs created by this transaction.
    pub outputs: Vec<Commitment>,
    /// Kernel excess, known once the sender finalizes.
    pub kernel_excess: Option<PublicKey>,
    /// Height at which an unanswered sent slate expires.
    pub ttl_cutoff_height: Option<u64>,
    /// The finalized transaction, kept for posting.
    pub tx: Option<Transaction>,
    /// Reason the node gave for refusing the last post.
    pub post_error: Option<String>,
    /// Set when the entry was created by restore rather than a slate exchange.
    pub restored: bool,
}

impl TxLogEntry {
    /// Effect on the wallet's funds: `+amount` received, `-(amount + fee)` sent.
    pub fn net_amount(&self) -> i128 {
        match self.direction {
            TxDirection::Received => self.amount as i128,
            TxDirection::Sent => -((self.amount as i128) + (self.fee as i128)),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == TxStatus::Cancelled
    }
}

/// Fields of a new log entry.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub slate_id: SlateId,
    pub direction: TxDirection,
    pub amount: u64,
    pub fee: u64,
    pub stage: SlateStage,
    pub inputs: Vec<Commitment>,
    pub outputs: Vec<Commitment>,
    pub ttl_cutoff_height: Option<u64>,
}

/// All transaction attempts of a wallet, by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxLog {
    entries: BTreeMap<u32, TxLogEntry>,
    next_id: u32,
}

impl TxLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id the next created entry will get.
    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    /// Append a Pending entry. Slate ids must be unique across the log.
    pub fn create(&mut self, new: NewEntry) -> Result<u32, WalletError> {
        if self.by_slate_id(&new.slate_id).is_some() {
            return Err(WalletError::InvalidSlate(format!("slate id {} already used", new.slate_id)));
        }
        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert(
            id,
            TxLogEntry {
                id,
                slate_id: new.slate_id,
                direction: new.direction,
                amount: new.amount,
                fee: new.fee,
                created_at: Utc::now(),
                confirmed_at: None,
                status: TxStatus::Pending,
                stage: new.stage,
                inputs: new.inputs,
                outputs: new.outputs,
                kernel_excess: None,
                ttl_cutoff_height: new.ttl_cutoff_height,
                tx: None,
                post_error: None,
                restored: false,
            },
        );
        Ok(id)
    }

    /// Append an already-confirmed received entry for a restored output.
    pub fn create_restored(&mut self, output: Commitment, amount: u64) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        let now = Utc::now();
        self.entries.insert(
            id,
            TxLogEntry {
                id,
                slate_id: SlateId::random(),
                direction: TxDirection::Received,
                amount,
                fee: 0,
                created_at: now,
                confirmed_at: Some(now),
                status: TxStatus::Confirmed,
                stage: SlateStage::Posted,
                inputs: Vec::new(),
                outputs: vec![output],
                kernel_excess: None,
                ttl_cutoff_height: None,
                tx: None,
                post_error: None,
                restored: true,
            },
        );
        id
    }

    pub fn get(&self, id: u32) -> Option<&TxLogEntry> {
        self.entries.get(&id)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut TxLogEntry> {
        self.entries.get_mut(&id)
    }

    pub fn by_slate_id(&self, slate_id: &SlateId) -> Option<&TxLogEntry> {
        self.entries.values().find(|e| e.slate_id == *slate_id)
    }

    /// Look up an entry by slate id, failing with `TransactionNotFound`.
    pub fn find(&self, slate_id: &SlateId) -> Result<&TxLogEntry, WalletError> {
        self.by_slate_id(slate_id)
            .ok_or_else(|| WalletError::TransactionNotFound(slate_id.to_string()))
    }

    /// Entries in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &TxLogEntry> {
        self.entries.values()
    }

    pub fn pending(&self) -> impl Iterator<Item = &TxLogEntry> {
        self.entries.values().filter(|e| e.status == TxStatus::Pending)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Mark an entry Cancelled. Returns `false` if it already was.
    pub fn cancel(&mut self, id: u32) -> Result<bool, WalletError> {
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or_else(|| WalletError::TransactionNotFound(id.to_string()))?;
        if entry.status == TxStatus::Cancelled {
            return Ok(false);
        }
        entry.status = TxStatus::Cancelled;
        entry.stage = SlateStage::Cancelled;
        Ok(true)
    }

    /// Mark an entry Confirmed now.
    pub fn confirm(&mut self, id: u32) {
        if let Some(entry) = self.entries.get_mut(&id) {
            if entry.status == TxStatus::Pending {
                entry.status = TxStatus::Confirmed;
                entry.confirmed_at = Some(Utc::now());
            }
        }
    }
}
