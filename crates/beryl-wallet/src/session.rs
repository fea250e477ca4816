//! Wallet session: the aggregate root.
//!
//! A [`WalletSession`] binds the decrypted keychain, the output ledger, the
//! transaction log and the private signing contexts of in-flight sends. It
//! holds the wallet directory's advisory lock for as long as it lives;
//! dropping it releases the lock and zeroizes key material.
//!
//! Every mutation runs inside [`WalletSession::transact`]: the state is
//! cloned, the operation applied to the clone, the clone persisted, and only
//! then swapped in. A failing operation therefore leaves neither memory nor
//! disk changed. All mutations share one mutex, which is what keeps two
//! concurrent sends from selecting the same output.
//!
//! Node calls never happen under the mutex. Refresh and post snapshot what
//! they need, talk to the node, and re-enter the critical section to apply
//! the result against whatever the state has become in the meantime.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use beryl_core::crypto::{self, SecretKey};
use beryl_core::error::TransactionError;
use beryl_core::traits::{NodeClient, PostOutcome, RejectReason};
use beryl_core::types::{TxInput, TxKernel};

use crate::coin_selection::{CoinSelection, CoinSelector, SelectionStrategy};
use crate::config::WalletConfig;
use crate::context::SenderContext;
use crate::error::WalletError;
use crate::keys::{KeyChain, Seed};
use crate::ledger::{Balance, OutputLedger, OutputRecord, OutputStatus};
use crate::mnemonic::{mnemonic_to_seed, seed_to_mnemonic};
use crate::restore::{RestoredLedger, ScanRange, Scanner};
use crate::slate::{ParticipantData, SLATE_VERSION, NUM_PARTICIPANTS, Slate, SlateEvent, SlateId, SlateStage, transition};
use crate::store::{WalletLock, WalletStore};
use crate::txlog::{NewEntry, TxDirection, TxLog, TxLogEntry, TxStatus};

/// Everything persisted in the state file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct WalletState {
    pub ledger: OutputLedger,
    pub txlog: TxLog,
    /// Sender signing contexts by log entry id, until finalize or cancel.
    pub contexts: BTreeMap<u32, SenderContext>,
    /// Next unused derivation index.
    pub next_key_index: u32,
    /// Chain height seen at the last refresh or scan.
    pub last_height: u64,
    /// Output index reached by the last scan.
    pub last_scanned_index: u64,
}

impl WalletState {
    /// Cancel a log entry and release everything it holds.
    fn cancel_entry(&mut self, id: u32) -> Result<bool, WalletError> {
        if !self.txlog.cancel(id)? {
            return Ok(false);
        }
        let unlocked = self.ledger.unlock_for(id);
        let removed = self.ledger.remove_unconfirmed_for(id);
        self.contexts.remove(&id);
        debug!(tx_log_id = id, unlocked, removed, "transaction cancelled");
        Ok(true)
    }
}

/// What a refresh changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshSummary {
    pub height: u64,
    pub confirmed_outputs: usize,
    pub spent_outputs: usize,
    pub confirmed_txs: usize,
    pub expired_txs: usize,
}

enum Finalization {
    Finalized(Slate),
    Mismatch,
}

/// An open wallet.
pub struct WalletSession {
    config: WalletConfig,
    keychain: KeyChain,
    node: Arc<dyn NodeClient>,
    store: WalletStore,
    state: Mutex<WalletState>,
    _lock: WalletLock,
}

impl WalletSession {
    /// Create the wallet files for `config` from a seed phrase.
    ///
    /// Does not open a session. A restored wallet starts with an empty
    /// ledger; run [`WalletSession::scan_outputs`] to rebuild it.
    pub fn create(config: &WalletConfig, phrase: &str, password: &[u8]) -> Result<(), WalletError> {
        let seed = mnemonic_to_seed(phrase)?;
        let store = WalletStore::new(config.wallet_data_dir());
        store.create_seed(&seed, password, &config.kdf)?;
        info!(dir = %store.dir().display(), network = %config.network, "wallet created");
        Ok(())
    }

    /// Open the wallet at `config.data_dir`.
    ///
    /// Fails with `WalletLocked` while another session holds it open and with
    /// `InvalidCredentials` on a wrong password.
    pub fn open(config: WalletConfig, password: &[u8], node: Arc<dyn NodeClient>) -> Result<Self, WalletError> {
        let store = WalletStore::new(config.wallet_data_dir());
        if !store.seed_exists() {
            return Err(WalletError::WalletNotFound(store.dir().display().to_string()));
        }
        let lock = store.acquire_lock()?;
        let seed = store.load_seed(password)?;
        let keychain = KeyChain::new(&seed, config.account);
        let state: WalletState = store.load_state(&keychain.state_key())?.unwrap_or_default();

        info!(
            dir = %store.dir().display(),
            outputs = state.ledger.len(),
            transactions = state.txlog.len(),
            "wallet opened"
        );
        Ok(Self { config, keychain, node, store, state: Mutex::new(state), _lock: lock })
    }

    /// Decrypt and return the seed phrase. The only way the phrase leaves
    /// the seed file.
    pub fn phrase(config: &WalletConfig, password: &[u8]) -> Result<Zeroizing<String>, WalletError> {
        let seed = WalletStore::new(config.wallet_data_dir()).load_seed(password)?;
        seed_to_mnemonic(&seed)
    }

    /// Generate a new seed phrase without creating a wallet.
    pub fn new_phrase(words: crate::keys::WordCount) -> Result<Zeroizing<String>, WalletError> {
        seed_to_mnemonic(&Seed::generate(words))
    }

    /// Close the wallet, releasing its lock.
    pub fn close(self) {
        info!(dir = %self.store.dir().display(), "wallet closed");
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    /// Apply `f` to a copy of the state, persist it, then publish it.
    fn transact<T>(&self, f: impl FnOnce(&mut WalletState) -> Result<T, WalletError>) -> Result<T, WalletError> {
        let mut guard = self.state.lock();
        let mut next = guard.clone();
        let out = f(&mut next)?;
        self.store.save_state(&next, &self.keychain.state_key())?;
        *guard = next;
        Ok(out)
    }

    fn selector(&self, tip: u64) -> CoinSelector {
        CoinSelector {
            min_confirmations: self.config.min_confirmations,
            max_outputs: self.config.max_outputs,
            fee_base: self.config.fee_base,
            tip,
        }
    }

    /// Balance from local state as of the last refresh.
    pub fn balance(&self) -> Balance {
        let state = self.state.lock();
        state.ledger.balance(self.config.min_confirmations, state.last_height)
    }

    /// Owned outputs in creation order.
    pub fn outputs(&self, include_spent: bool) -> Vec<OutputRecord> {
        self.state
            .lock()
            .ledger
            .iter()
            .filter(|r| include_spent || r.status != OutputStatus::Spent)
            .cloned()
            .collect()
    }

    /// Height seen at the last refresh or scan.
    pub fn last_height(&self) -> u64 {
        self.state.lock().last_height
    }

    /// Reconcile the ledger and log with the node.
    ///
    /// Either the node answers every query and the whole update is applied,
    /// or nothing changes.
    pub fn refresh(&self) -> Result<RefreshSummary, WalletError> {
        let (queried, kernels) = {
            let state = self.state.lock();
            let kernels: Vec<_> = state
                .txlog
                .pending()
                .filter_map(|e| e.kernel_excess.map(|k| (e.id, k)))
                .collect();
            (state.ledger.live_commitments(), kernels)
        };

        let tip = self.node.get_height()?;
        let found: HashMap<_, _> = self
            .node
            .get_outputs(&queried)?
            .into_iter()
            .map(|info| (info.commitment, info))
            .collect();
        let mut mined = HashSet::new();
        for (id, excess) in &kernels {
            if self.node.get_kernel(excess)?.is_some() {
                mined.insert(*id);
            }
        }

        let maturity = self.config.network.coinbase_maturity();
        let summary = self.transact(|state| {
            let update = state.ledger.apply_chain_state(tip, &queried, &found, maturity);
            let mut summary = RefreshSummary {
                height: tip,
                confirmed_outputs: update.confirmed,
                spent_outputs: update.spent,
                ..Default::default()
            };

            // Entries cancelled while the node was being asked are no longer
            // pending and are skipped here.
            let pending: Vec<TxLogEntry> = state.txlog.pending().cloned().collect();
            for entry in &pending {
                let output_seen = entry.outputs.iter().any(|c| {
                    state
                        .ledger
                        .get(c)
                        .is_some_and(|r| matches!(r.status, OutputStatus::Unspent | OutputStatus::Spent | OutputStatus::Locked))
                });
                if mined.contains(&entry.id) || output_seen {
                    state.txlog.confirm(entry.id);
                    if entry.direction == TxDirection::Sent {
                        state.ledger.spend_locked_for(entry.id);
                        state.contexts.remove(&entry.id);
                    }
                    summary.confirmed_txs += 1;
                    continue;
                }

                let expirable = matches!(
                    entry.stage,
                    SlateStage::Created | SlateStage::AwaitingReceiver | SlateStage::ReceiverSigned
                );
                if expirable && entry.ttl_cutoff_height.is_some_and(|cutoff| cutoff <= tip) {
                    state.cancel_entry(entry.id)?;
                    summary.expired_txs += 1;
                }
            }

            state.last_height = tip;
            Ok(summary)
        })?;

        info!(
            height = summary.height,
            confirmed_outputs = summary.confirmed_outputs,
            spent_outputs = summary.spent_outputs,
            confirmed_txs = summary.confirmed_txs,
            expired_txs = summary.expired_txs,
            "wallet refreshed"
        );
        Ok(summary)
    }

    /// Transaction log with the current balance.
    ///
    /// With `refresh`, a failed refresh degrades to local state and the
    /// first element is `false`.
    pub fn retrieve_txs(&self, refresh: bool) -> (bool, Vec<TxLogEntry>, Balance) {
        let refreshed = refresh
            && match self.refresh() {
                Ok(_) => true,
                Err(e) => {
                    warn!(error = %e, "refresh failed, returning local state");
                    false
                }
            };
        let state = self.state.lock();
        let entries = state.txlog.iter().cloned().collect();
        let balance = state.ledger.balance(self.config.min_confirmations, state.last_height);
        (refreshed, entries, balance)
    }

    /// One log entry by slate id.
    pub fn tx_get(&self, slate_id: &SlateId) -> Result<TxLogEntry, WalletError> {
        self.state.lock().txlog.find(slate_id).cloned()
    }

    /// Preview every selection strategy for `amount` without locking anything.
    pub fn estimate(&self, amount: u64) -> Result<Vec<CoinSelection>, WalletError> {
        let state = self.state.lock();
        self.selector(state.last_height).estimate(&state.ledger, amount)
    }

    /// Start a send: select and lock inputs, build the change output and
    /// return the slate for the receiver.
    pub fn initiate(&self, amount: u64, strategy: SelectionStrategy) -> Result<Slate, WalletError> {
        if amount == 0 {
            return Err(WalletError::InvalidAmount("amount must be non-zero".into()));
        }

        let slate = self.transact(|state| {
            let selection = self.selector(state.last_height).select(&state.ledger, amount, strategy)?;
            let tx_log_id = state.txlog.next_id();
            state.ledger.lock(&selection.inputs, tx_log_id)?;

            let mut input_blinds = Vec::with_capacity(selection.inputs.len());
            for c in &selection.inputs {
                let record = state
                    .ledger
                    .get(c)
                    .ok_or_else(|| WalletError::TransactionNotFound(format!("output {c}")))?;
                input_blinds.push(self.keychain.blinding_factor(&record.path));
            }

            let mut outputs = Vec::new();
            let mut change_blinds = Vec::new();
            if selection.change > 0 {
                let path = self.keychain.path(state.next_key_index);
                state.next_key_index += 1;
                let (blind, output) = self.keychain.build_output(&path, selection.change);
                state.ledger.add_unconfirmed(output.commitment, selection.change, path, tx_log_id)?;
                outputs.push(output);
                change_blinds.push(blind);
            }

            // x_s = Σ r_change − Σ r_in − offset
            let offset = SecretKey::random();
            let positive: Vec<&SecretKey> = change_blinds.iter().collect();
            let mut negative: Vec<&SecretKey> = input_blinds.iter().collect();
            negative.push(&offset);
            let sec_key = SecretKey::sum(&positive, &negative);
            let sec_nonce = SecretKey::random();

            let ttl_cutoff_height =
                (self.config.ttl_blocks > 0).then(|| state.last_height + self.config.ttl_blocks);

            let mut slate = Slate {
                version: SLATE_VERSION,
                id: SlateId::random(),
                stage: SlateStage::Created,
                num_participants: NUM_PARTICIPANTS,
                amount,
                fee: selection.fee,
                lock_height: 0,
                ttl_cutoff_height,
                offset: offset.to_blinding_factor(),
                participants: vec![ParticipantData {
                    id: 0,
                    public_excess: sec_key.public_key(),
                    public_nonce: sec_nonce.public_key(),
                    part_sig: None,
                }],
                inputs: selection.inputs.iter().map(|c| TxInput { commitment: *c }).collect(),
                outputs,
                kernel: None,
            };
            slate.apply(SlateEvent::Publish)?;

            let change_outputs = slate.output_commitments();
            let id = state.txlog.create(NewEntry {
                slate_id: slate.id,
                direction: TxDirection::Sent,
                amount,
                fee: selection.fee,
                stage: slate.stage,
                inputs: selection.inputs.clone(),
                outputs: change_outputs.clone(),
                ttl_cutoff_height,
            })?;
            state.contexts.insert(
                id,
                SenderContext {
                    slate_id: slate.id,
                    tx_log_id: id,
                    sec_key,
                    sec_nonce,
                    amount,
                    fee: selection.fee,
                    lock_height: slate.lock_height,
                    offset: slate.offset,
                    inputs: selection.inputs,
                    change_outputs,
                },
            );
            Ok(slate)
        })?;

        info!(
            slate_id = %slate.id,
            amount,
            fee = slate.fee,
            inputs = slate.inputs.len(),
            %strategy,
            "send initiated"
        );
        Ok(slate)
    }

    /// Receiver side: add our output and partial signature.
    ///
    /// `expected_amount`, when given, must match the slate's amount.
    pub fn receive(&self, slate: &Slate, expected_amount: Option<u64>) -> Result<Slate, WalletError> {
        slate.validate_structure()?;
        if slate.stage != SlateStage::AwaitingReceiver {
            return Err(WalletError::InvalidSlate(format!(
                "expected stage AwaitingReceiver, got {}",
                slate.stage
            )));
        }
        if slate.participants.len() != 1 {
            return Err(WalletError::InvalidSlate(format!(
                "expected only the sender's participant data, found {}",
                slate.participants.len()
            )));
        }
        if let Some(expected) = expected_amount {
            if expected != slate.amount {
                return Err(WalletError::InvalidSlate(format!(
                    "amount {} does not match expected {expected}",
                    slate.amount
                )));
            }
        }

        let signed = self.transact(|state| {
            let path = self.keychain.path(state.next_key_index);
            state.next_key_index += 1;
            let (blind, output) = self.keychain.build_output(&path, slate.amount);
            let sec_nonce = SecretKey::random();

            let mut signed = slate.clone();
            signed.outputs.push(output);
            signed.participants.push(ParticipantData {
                id: 1,
                public_excess: blind.public_key(),
                public_nonce: sec_nonce.public_key(),
                part_sig: None,
            });
            let nonce_sum = signed.nonce_sum()?;
            let excess_sum = signed.excess_sum()?;
            let sig = crypto::sign_partial(&blind, &sec_nonce, &nonce_sum, &excess_sum, &signed.kernel_message());
            signed.participants[1].part_sig = Some(sig);
            signed.apply(SlateEvent::ReceiverSign)?;

            let id = state.txlog.create(NewEntry {
                slate_id: slate.id,
                direction: TxDirection::Received,
                amount: slate.amount,
                fee: slate.fee,
                stage: signed.stage,
                inputs: Vec::new(),
                outputs: vec![output.commitment],
                ttl_cutoff_height: slate.ttl_cutoff_height,
            })?;
            state.ledger.add_unconfirmed(output.commitment, slate.amount, path, id)?;
            Ok(signed)
        })?;

        info!(slate_id = %signed.id, amount = signed.amount, "slate received and signed");
        Ok(signed)
    }

    /// Sender side: verify the receiver's contribution, aggregate the
    /// signatures and check the transaction balances.
    ///
    /// A transaction that does not balance is abandoned: inputs are unlocked,
    /// the change output dropped and the log entry cancelled before
    /// `BalanceMismatch` is returned.
    pub fn finalize(&self, slate: &Slate) -> Result<Slate, WalletError> {
        slate.validate_structure()?;
        if slate.stage != SlateStage::ReceiverSigned {
            return Err(WalletError::InvalidSlate(format!(
                "expected stage ReceiverSigned, got {}",
                slate.stage
            )));
        }

        let outcome = self.transact(|state| {
            let entry = state.txlog.find(&slate.id)?;
            let id = entry.id;
            if entry.direction != TxDirection::Sent {
                return Err(WalletError::InvalidSlate(format!("slate {} was not sent by this wallet", slate.id)));
            }
            if entry.stage != SlateStage::AwaitingReceiver {
                return Err(WalletError::InvalidTransition(format!(
                    "cannot finalize transaction {} at stage {}",
                    slate.id, entry.stage
                )));
            }
            let ctx = state
                .contexts
                .get(&id)
                .cloned()
                .ok_or_else(|| WalletError::InvalidTransition(format!("no signing context for {}", slate.id)))?;
            ctx.check_slate(slate)?;

            let receiver = slate
                .participant(1)
                .ok_or_else(|| WalletError::InvalidSlate("receiver participant missing".into()))?;
            let their_sig = receiver
                .part_sig
                .ok_or_else(|| WalletError::InvalidSlate("receiver signature missing".into()))?;
            let nonce_sum = slate.nonce_sum()?;
            let excess_sum = slate.excess_sum()?;
            let msg = slate.kernel_message();
            crypto::verify_partial(&their_sig, &receiver.public_excess, &nonce_sum, &excess_sum, &msg)
                .map_err(|_| WalletError::InvalidSlate("receiver partial signature does not verify".into()))?;

            let our_sig = crypto::sign_partial(&ctx.sec_key, &ctx.sec_nonce, &nonce_sum, &excess_sum, &msg);
            let excess_sig = crypto::aggregate_signatures(&[our_sig, their_sig], &nonce_sum)?;

            let mut finalized = slate.clone();
            finalized.participants[0].part_sig = Some(our_sig);
            finalized.kernel = Some(TxKernel {
                fee: slate.fee,
                lock_height: slate.lock_height,
                excess: excess_sum,
                excess_sig,
            });
            let tx = finalized.to_transaction()?;

            match tx.validate() {
                Ok(()) => {}
                Err(TransactionError::BalanceMismatch) => {
                    state.cancel_entry(id)?;
                    return Ok(Finalization::Mismatch);
                }
                Err(e) => return Err(WalletError::InvalidSlate(e.to_string())),
            }

            finalized.apply(SlateEvent::Finalize)?;
            let entry = state
                .txlog
                .get_mut(id)
                .ok_or_else(|| WalletError::TransactionNotFound(slate.id.to_string()))?;
            entry.stage = finalized.stage;
            entry.kernel_excess = Some(excess_sum);
            entry.tx = Some(tx);
            state.contexts.remove(&id);
            Ok(Finalization::Finalized(finalized))
        })?;

        match outcome {
            Finalization::Finalized(finalized) => {
                info!(slate_id = %finalized.id, "transaction finalized");
                Ok(finalized)
            }
            Finalization::Mismatch => {
                warn!(slate_id = %slate.id, "finalized transaction does not balance, abandoned");
                Err(WalletError::BalanceMismatch)
            }
        }
    }

    /// Submit a finalized transaction to the node.
    ///
    /// Not retried on failure. A rejection is recorded on the entry and the
    /// inputs stay locked until the transaction is cancelled.
    pub fn post(&self, slate_id: &SlateId) -> Result<(), WalletError> {
        let (id, tx) = {
            let state = self.state.lock();
            let entry = state.txlog.find(slate_id)?;
            match entry.status {
                TxStatus::Confirmed => return Err(WalletError::AlreadyConfirmed(slate_id.to_string())),
                TxStatus::Cancelled => {
                    return Err(WalletError::InvalidTransition(format!("transaction {slate_id} is cancelled")));
                }
                TxStatus::Pending => {}
            }
            let tx = entry
                .tx
                .clone()
                .ok_or_else(|| WalletError::InvalidTransition(format!("transaction {slate_id} is not finalized")))?;
            (entry.id, tx)
        };

        let outcome = self.node.post_transaction(&tx)?;

        match outcome {
            PostOutcome::Accepted => {
                self.transact(|state| {
                    let entry = state
                        .txlog
                        .get_mut(id)
                        .ok_or_else(|| WalletError::TransactionNotFound(slate_id.to_string()))?;
                    entry.stage = transition(entry.stage, SlateEvent::Post)?;
                    entry.post_error = None;
                    Ok(())
                })?;
                info!(slate_id = %slate_id, "transaction posted");
                Ok(())
            }
            PostOutcome::Rejected(reason) => {
                self.transact(|state| {
                    if let Some(entry) = state.txlog.get_mut(id) {
                        entry.post_error = Some(reason.to_string());
                    }
                    Ok(())
                })?;
                warn!(slate_id = %slate_id, %reason, "node rejected transaction");
                Err(match reason {
                    RejectReason::InputSpent(c) => WalletError::AlreadySpent(c.to_string()),
                    other => WalletError::PostRejected(other.to_string()),
                })
            }
        }
    }

    /// Cancel a transaction attempt, unlocking its inputs.
    ///
    /// Cancelling an already-cancelled entry is a no-op. A finalized
    /// transaction can only be cancelled after the node rejected it.
    pub fn cancel(&self, slate_id: &SlateId) -> Result<(), WalletError> {
        let changed = self.transact(|state| {
            let entry = state.txlog.find(slate_id)?;
            if entry.status == TxStatus::Confirmed {
                return Err(WalletError::AlreadyConfirmed(slate_id.to_string()));
            }
            let event = if entry.stage == SlateStage::Finalized && entry.post_error.is_some() {
                SlateEvent::AbandonRejected
            } else {
                SlateEvent::Cancel
            };
            transition(entry.stage, event)?;
            let id = entry.id;
            state.cancel_entry(id)
        })?;
        if changed {
            info!(slate_id = %slate_id, "transaction cancelled");
        }
        Ok(())
    }

    /// Node output index bounds for a block height range.
    pub fn pmmr_range(&self, start_height: u64, end_height: Option<u64>) -> Result<(u64, u64), WalletError> {
        Ok(self.node.get_pmmr_range(start_height, end_height)?)
    }

    /// Scan the node's output index and merge every owned output not yet
    /// in the ledger.
    pub fn scan_outputs(&self, range: ScanRange, max_batches: Option<u32>) -> Result<RestoredLedger, WalletError> {
        let scanner = Scanner {
            batch_size: self.config.scan_batch_size,
            gap_limit: self.config.gap_limit,
            max_batches,
            coinbase_maturity: self.config.network.coinbase_maturity(),
        };
        let restored = scanner.scan(&self.keychain, self.node.as_ref(), range)?;
        let tip = self.node.get_height()?;

        let added = self.transact(|state| {
            let mut added = 0usize;
            for found in &restored.outputs {
                if state.ledger.contains(&found.commitment) {
                    continue;
                }
                let tx_log_id = state.txlog.create_restored(found.commitment, found.value);
                state.ledger.insert(OutputRecord {
                    commitment: found.commitment,
                    value: found.value,
                    path: found.path,
                    status: OutputStatus::Unspent,
                    lock_height: found.lock_height,
                    height: Some(found.height),
                    confirmations: tip.saturating_sub(found.height) + 1,
                    is_coinbase: found.is_coinbase,
                    tx_log_id: Some(tx_log_id),
                    locked_by: None,
                    seq: 0,
                })?;
                added += 1;
            }
            state.next_key_index = state.next_key_index.max(restored.next_key_index());
            state.last_scanned_index = state.last_scanned_index.max(restored.last_retrieved_index);
            state.last_height = state.last_height.max(tip);
            Ok(added)
        })?;

        info!(
            found = restored.outputs.len(),
            added,
            last_retrieved_index = restored.last_retrieved_index,
            status = ?restored.status,
            "output scan merged"
        );
        Ok(restored)
    }

    /// Output index reached by previous scans.
    pub fn last_scanned_index(&self) -> u64 {
        self.state.lock().last_scanned_index
    }
}

impl std::fmt::Debug for WalletSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletSession")
            .field("dir", &self.store.dir())
            .field("network", &self.config.network)
            .finish_non_exhaustive()
    }
}
