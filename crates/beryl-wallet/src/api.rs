//! JSON owner API.
//!
//! Every operation takes plain strings and integers and returns an
//! [`ApiResponse`]: `success` plus a JSON payload that is either the
//! result or a structured error `{"code": ..., "message": ...}`. Open
//! wallets are referred to by the integer handles of a [`SessionArena`].
//!
//! Slates cross this boundary as slatepack armor; inputs may also be the
//! slate's raw JSON.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use beryl_core::traits::NodeClient;

use crate::coin_selection::SelectionStrategy;
use crate::config::WalletConfig;
use crate::error::WalletError;
use crate::handles::SessionArena;
use crate::keys::WordCount;
use crate::ledger::Balance;
use crate::restore::ScanRange;
use crate::session::WalletSession;
use crate::slate::{Slate, SlateId};
use crate::slatepack;
use crate::txlog::TxLogEntry;

/// Builds the node client for a wallet's configuration.
pub type NodeFactory = Box<dyn Fn(&WalletConfig) -> Result<Arc<dyn NodeClient>, WalletError> + Send + Sync>;

/// Result of one API call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    /// Result JSON on success, error descriptor JSON on failure.
    pub payload: String,
}

#[derive(Serialize)]
struct ErrorDescriptor<'a> {
    code: &'a str,
    message: String,
}

impl ApiResponse {
    fn ok<T: Serialize>(value: &T) -> Self {
        match serde_json::to_string(value) {
            Ok(payload) => Self { success: true, payload },
            Err(e) => Self::err(&WalletError::Serialization(e.to_string())),
        }
    }

    fn err(error: &WalletError) -> Self {
        let descriptor = ErrorDescriptor { code: error.code(), message: error.to_string() };
        let payload = serde_json::to_string(&descriptor)
            .unwrap_or_else(|_| format!(r#"{{"code":"{}","message":""}}"#, error.code()));
        Self { success: false, payload }
    }

    fn from_result<T: Serialize>(result: Result<T, WalletError>) -> Self {
        match result {
            Ok(value) => Self::ok(&value),
            Err(e) => {
                debug!(code = e.code(), error = %e, "owner api call failed");
                Self::err(&e)
            }
        }
    }

    /// Error code of a failed response.
    pub fn error_code(&self) -> Option<String> {
        if self.success {
            return None;
        }
        serde_json::from_str::<serde_json::Value>(&self.payload)
            .ok()
            .and_then(|v| v["code"].as_str().map(str::to_owned))
    }
}

/// `txs_get` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxsResult {
    pub refreshed: bool,
    pub txs: Vec<TxLogEntry>,
    pub balance: Balance,
}

/// `tx_strategies` result entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyPreview {
    pub strategy: SelectionStrategy,
    pub total: u64,
    pub fee: u64,
}

/// A slate handed back to the caller for transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlateResult {
    pub slate_id: SlateId,
    pub slatepack: String,
}

impl SlateResult {
    fn armor(slate: &Slate) -> Result<Self, WalletError> {
        Ok(Self { slate_id: slate.id, slatepack: slatepack::encode(slate)? })
    }
}

/// `wallet_pmmr_range` result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PmmrRange {
    pub first_index: u64,
    pub last_index: u64,
}

/// Parse a slate given as slatepack armor or raw JSON.
pub fn parse_slate(input: &str) -> Result<Slate, WalletError> {
    if input.len() > slatepack::MAX_ARMOR_LEN {
        return Err(WalletError::InvalidSlate(format!("slate exceeds {} bytes", slatepack::MAX_ARMOR_LEN)));
    }
    if input.trim_start().starts_with('{') {
        serde_json::from_str(input).map_err(|e| WalletError::InvalidSlate(format!("bad slate json: {e}")))
    } else {
        slatepack::decode(input)
    }
}

fn parse_slate_id(s: &str) -> Result<SlateId, WalletError> {
    s.parse()
}

/// Owner operations over a set of open wallets.
pub struct OwnerApi {
    sessions: SessionArena,
    node_factory: NodeFactory,
}

impl OwnerApi {
    pub fn new(node_factory: NodeFactory) -> Self {
        Self { sessions: SessionArena::new(), node_factory }
    }

    fn with_session<T>(
        &self,
        handle: u64,
        f: impl FnOnce(&WalletSession) -> Result<T, WalletError>,
    ) -> Result<T, WalletError> {
        let session = self.sessions.get(handle)?;
        f(&session)
    }

    /// Generate a new seed phrase of 12 or 24 words.
    pub fn seed_new(&self, word_count: usize) -> ApiResponse {
        ApiResponse::from_result(
            WordCount::from_words(word_count)
                .and_then(WalletSession::new_phrase)
                .map(|phrase| phrase.to_string()),
        )
    }

    /// Create wallet files from a phrase.
    pub fn wallet_init(&self, config_json: &str, phrase: &str, password: &str) -> ApiResponse {
        ApiResponse::from_result(
            WalletConfig::from_json(config_json)
                .and_then(|cfg| WalletSession::create(&cfg, phrase, password.as_bytes()))
                .map(|_| true),
        )
    }

    /// Open a wallet; the payload is the session handle.
    pub fn open_wallet(&self, config_json: &str, password: &str) -> ApiResponse {
        ApiResponse::from_result(self.open(config_json, password))
    }

    fn open(&self, config_json: &str, password: &str) -> Result<u64, WalletError> {
        let cfg = WalletConfig::from_json(config_json)?;
        let node = (self.node_factory)(&cfg)?;
        let session = WalletSession::open(cfg, password.as_bytes(), node)?;
        Ok(self.sessions.insert(session))
    }

    pub fn close_wallet(&self, handle: u64) -> ApiResponse {
        ApiResponse::from_result(self.sessions.remove(handle).map(|_| true))
    }

    pub fn wallet_phrase(&self, config_json: &str, password: &str) -> ApiResponse {
        ApiResponse::from_result(
            WalletConfig::from_json(config_json)
                .and_then(|cfg| WalletSession::phrase(&cfg, password.as_bytes()))
                .map(|phrase| phrase.to_string()),
        )
    }

    pub fn wallet_pmmr_range(&self, handle: u64, start_height: u64, end_height: Option<u64>) -> ApiResponse {
        ApiResponse::from_result(self.with_session(handle, |s| {
            let (first_index, last_index) = s.pmmr_range(start_height, end_height)?;
            Ok(PmmrRange { first_index, last_index })
        }))
    }

    /// Scan `(start_index, end_index]` of the node's output index.
    pub fn wallet_scan_outputs(
        &self,
        handle: u64,
        start_index: u64,
        end_index: Option<u64>,
        max_batches: Option<u32>,
    ) -> ApiResponse {
        ApiResponse::from_result(self.with_session(handle, |s| {
            s.scan_outputs(ScanRange { start_index, end_index }, max_batches)
        }))
    }

    pub fn txs_get(&self, handle: u64, refresh: bool) -> ApiResponse {
        ApiResponse::from_result(self.with_session(handle, |s| {
            let (refreshed, txs, balance) = s.retrieve_txs(refresh);
            Ok(TxsResult { refreshed, txs, balance })
        }))
    }

    pub fn tx_get(&self, handle: u64, slate_id: &str) -> ApiResponse {
        ApiResponse::from_result(self.with_session(handle, |s| s.tx_get(&parse_slate_id(slate_id)?)))
    }

    /// Preview the strategies that can fund `amount`.
    pub fn tx_strategies(&self, handle: u64, amount: u64) -> ApiResponse {
        ApiResponse::from_result(self.with_session(handle, |s| {
            Ok(s.estimate(amount)?
                .into_iter()
                .map(|sel| StrategyPreview { strategy: sel.strategy, total: sel.total, fee: sel.fee })
                .collect::<Vec<_>>())
        }))
    }

    /// Start a send. `strategy` is `smallest_first` or `use_all`.
    pub fn tx_create(&self, handle: u64, amount: u64, strategy: &str) -> ApiResponse {
        ApiResponse::from_result(self.with_session(handle, |s| {
            let strategy: SelectionStrategy = strategy.parse()?;
            SlateResult::armor(&s.initiate(amount, strategy)?)
        }))
    }

    pub fn tx_cancel(&self, handle: u64, slate_id: &str) -> ApiResponse {
        ApiResponse::from_result(self.with_session(handle, |s| {
            s.cancel(&parse_slate_id(slate_id)?)?;
            Ok(true)
        }))
    }

    pub fn tx_receive(&self, handle: u64, slate: &str, expected_amount: Option<u64>) -> ApiResponse {
        ApiResponse::from_result(self.with_session(handle, |s| {
            SlateResult::armor(&s.receive(&parse_slate(slate)?, expected_amount)?)
        }))
    }

    pub fn tx_finalize(&self, handle: u64, slate: &str) -> ApiResponse {
        ApiResponse::from_result(self.with_session(handle, |s| {
            SlateResult::armor(&s.finalize(&parse_slate(slate)?)?)
        }))
    }

    pub fn tx_post(&self, handle: u64, slate_id: &str) -> ApiResponse {
        ApiResponse::from_result(self.with_session(handle, |s| {
            s.post(&parse_slate_id(slate_id)?)?;
            Ok(true)
        }))
    }

    /// Decode slatepack armor to the slate's JSON.
    pub fn slatepack_decode(&self, armored: &str) -> ApiResponse {
        ApiResponse::from_result(slatepack::decode(armored))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{KeyChain, Seed};
    use crate::mnemonic::seed_to_mnemonic;
    use beryl_core::memory_node::InMemoryNode;
    use tempfile::TempDir;

    fn api(node: &Arc<InMemoryNode>) -> OwnerApi {
        let node = node.clone();
        OwnerApi::new(Box::new(move |_cfg| Ok(node.clone() as Arc<dyn NodeClient>)))
    }

    fn config_json(dir: &TempDir) -> String {
        serde_json::json!({
            "data_dir": dir.path(),
            "network": "regtest",
            "fee_base": 1,
            "min_confirmations": 1,
            "kdf": { "memory_kib": 8, "iterations": 1, "parallelism": 1 },
        })
        .to_string()
    }

    fn payload<T: serde::de::DeserializeOwned>(resp: &ApiResponse) -> T {
        assert!(resp.success, "call failed: {}", resp.payload);
        serde_json::from_str(&resp.payload).unwrap()
    }

    #[test]
    fn seed_new_word_counts() {
        let node = Arc::new(InMemoryNode::new());
        let api = api(&node);
        let phrase: String = payload(&api.seed_new(12));
        assert_eq!(phrase.split_whitespace().count(), 12);
        let bad = api.seed_new(13);
        assert!(!bad.success);
        assert_eq!(bad.error_code().as_deref(), Some("invalid_mnemonic"));
    }

    #[test]
    fn wrong_password_has_error_code() {
        let node = Arc::new(InMemoryNode::new());
        let api = api(&node);
        let dir = TempDir::new().unwrap();
        let cfg = config_json(&dir);
        let phrase: String = payload(&api.seed_new(24));
        payload::<bool>(&api.wallet_init(&cfg, &phrase, "pw"));

        let resp = api.open_wallet(&cfg, "nope");
        assert_eq!(resp.error_code().as_deref(), Some("invalid_credentials"));
        let phrase_back: String = payload(&api.wallet_phrase(&cfg, "pw"));
        assert_eq!(phrase_back, phrase);
    }

    #[test]
    fn closed_handle_is_invalid() {
        let node = Arc::new(InMemoryNode::new());
        let api = api(&node);
        let dir = TempDir::new().unwrap();
        let cfg = config_json(&dir);
        let phrase: String = payload(&api.seed_new(12));
        payload::<bool>(&api.wallet_init(&cfg, &phrase, "pw"));
        let handle: u64 = payload(&api.open_wallet(&cfg, "pw"));
        payload::<bool>(&api.close_wallet(handle));
        assert_eq!(api.txs_get(handle, false).error_code().as_deref(), Some("invalid_handle"));
    }

    #[test]
    fn unknown_strategy_is_invalid_argument() {
        let node = Arc::new(InMemoryNode::new());
        let api = api(&node);
        let dir = TempDir::new().unwrap();
        let cfg = config_json(&dir);
        let phrase: String = payload(&api.seed_new(12));
        payload::<bool>(&api.wallet_init(&cfg, &phrase, "pw"));
        let handle: u64 = payload(&api.open_wallet(&cfg, "pw"));
        let resp = api.tx_create(handle, 100, "largest_first");
        assert_eq!(resp.error_code().as_deref(), Some("invalid_argument"));
    }

    #[test]
    fn full_exchange_over_json() {
        let node = Arc::new(InMemoryNode::new());
        let api = api(&node);
        let (d1, d2) = (TempDir::new().unwrap(), TempDir::new().unwrap());
        let (c1, c2) = (config_json(&d1), config_json(&d2));

        let seed = Seed::from_entropy(&[9u8; 32]).unwrap();
        let phrase = seed_to_mnemonic(&seed).unwrap();
        payload::<bool>(&api.wallet_init(&c1, &phrase, "pw"));
        let other: String = payload(&api.seed_new(24));
        payload::<bool>(&api.wallet_init(&c2, &other, "pw"));

        let kc = KeyChain::new(&seed, 0);
        let (_, out) = kc.build_output(&kc.path(0), 1_000);
        node.add_output(out.commitment, out.proof, false);
        node.mine_blocks(1);

        let sender: u64 = payload(&api.open_wallet(&c1, "pw"));
        let receiver: u64 = payload(&api.open_wallet(&c2, "pw"));

        let (first, last): (u64, u64) = {
            let r: PmmrRange = payload(&api.wallet_pmmr_range(sender, 0, None));
            (r.first_index, r.last_index)
        };
        assert_eq!((first, last), (1, 1));
        let scan: serde_json::Value = payload(&api.wallet_scan_outputs(sender, 0, None, None));
        assert_eq!(scan["status"], "Complete");

        let previews: Vec<StrategyPreview> = payload(&api.tx_strategies(sender, 300));
        assert_eq!(previews.len(), 2);

        let created: SlateResult = payload(&api.tx_create(sender, 300, "smallest_first"));
        let decoded: serde_json::Value = payload(&api.slatepack_decode(&created.slatepack));
        assert_eq!(decoded["amount"], 300);

        let received: SlateResult = payload(&api.tx_receive(receiver, &created.slatepack, Some(300)));
        let finalized: SlateResult = payload(&api.tx_finalize(sender, &received.slatepack));
        let id = finalized.slate_id.to_string();
        payload::<bool>(&api.tx_post(sender, &id));
        node.mine_blocks(1);

        let txs: TxsResult = payload(&api.txs_get(sender, true));
        assert!(txs.refreshed);
        assert_eq!(txs.balance.total, 1_000 - 300 - 8);
        let entry: TxLogEntry = payload(&api.tx_get(sender, &id));
        assert_eq!(entry.status, crate::txlog::TxStatus::Confirmed);

        let cancel = api.tx_cancel(sender, &id);
        assert_eq!(cancel.error_code().as_deref(), Some("already_confirmed"));
    }

    #[test]
    fn raw_json_slate_accepted() {
        let slate = crate::slate::tests::test_slate();
        let json = serde_json::to_string(&slate).unwrap();
        assert_eq!(parse_slate(&json).unwrap(), slate);
        assert!(matches!(parse_slate("{oops").unwrap_err(), WalletError::InvalidSlate(_)));
    }

    #[test]
    fn garbage_slatepack_is_invalid_slate() {
        let node = Arc::new(InMemoryNode::new());
        let resp = api(&node).slatepack_decode("BEGINSLATEPACK. nope. ENDSLATEPACK.");
        assert_eq!(resp.error_code().as_deref(), Some("invalid_slate"));
    }
}
