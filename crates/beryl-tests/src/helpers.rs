//! Shared fixtures for the integration tests.

use std::path::Path;
use std::sync::Arc;

use beryl_core::constants::NetworkType;
use beryl_core::memory_node::InMemoryNode;
use beryl_wallet::encryption::KdfParams;
use beryl_wallet::mnemonic::seed_to_mnemonic;
use beryl_wallet::restore::ScanRange;
use beryl_wallet::{KeyChain, Seed, SelectionStrategy, Slate, WalletConfig, WalletSession};
use tempfile::TempDir;

pub const PASSWORD: &[u8] = b"integration";

/// Regtest config with a fee base of 1 and cheap password hashing.
pub fn test_config(dir: &TempDir) -> WalletConfig {
    config_at(dir.path())
}

/// [`test_config`] for a directory not owned by this process.
pub fn config_at(data_dir: &Path) -> WalletConfig {
    WalletConfig {
        data_dir: data_dir.to_path_buf(),
        network: NetworkType::Regtest,
        fee_base: 1,
        min_confirmations: 2,
        ttl_blocks: 0,
        scan_batch_size: 8,
        kdf: KdfParams::minimal(),
        ..WalletConfig::default()
    }
}

/// Deterministic phrase for a one-byte seed.
pub fn phrase(seed_byte: u8) -> String {
    let seed = Seed::from_entropy(&[seed_byte; 32]).expect("32-byte entropy");
    seed_to_mnemonic(&seed).expect("valid seed").to_string()
}

/// An open wallet and the directory backing it.
pub struct TestWallet {
    pub dir: TempDir,
    pub config: WalletConfig,
    pub seed_byte: u8,
    pub session: WalletSession,
}

impl TestWallet {
    /// Create and open a wallet for `seed_byte` against `node`.
    pub fn open(node: &Arc<InMemoryNode>, seed_byte: u8) -> Self {
        let dir = TempDir::new().expect("tempdir");
        let config = test_config(&dir);
        WalletSession::create(&config, &phrase(seed_byte), PASSWORD).expect("create wallet");
        let session = WalletSession::open(config.clone(), PASSWORD, node.clone()).expect("open wallet");
        Self { dir, config, seed_byte, session }
    }

    /// Close and reopen the session from disk.
    pub fn reopen(self, node: &Arc<InMemoryNode>) -> Self {
        let Self { dir, config, seed_byte, session } = self;
        session.close();
        let session = WalletSession::open(config.clone(), PASSWORD, node.clone()).expect("reopen wallet");
        Self { dir, config, seed_byte, session }
    }

    /// Place an owned output of `value` on chain at derivation index
    /// `index`, confirm it, and scan it into the ledger.
    pub fn fund(&self, node: &InMemoryNode, index: u32, value: u64) {
        let keychain = KeyChain::new(&Seed::from_entropy(&[self.seed_byte; 32]).expect("seed"), 0);
        let (_, output) = keychain.build_output(&keychain.path(index), value);
        node.add_output(output.commitment, output.proof, false);
        node.mine_blocks(2);
        self.session.scan_outputs(ScanRange::default(), None).expect("scan");
        self.session.refresh().expect("refresh");
    }
}

/// Run initiate, receive and finalize between two wallets.
pub fn exchange(sender: &WalletSession, receiver: &WalletSession, amount: u64) -> Slate {
    let slate = sender.initiate(amount, SelectionStrategy::SmallestFirst).expect("initiate");
    let signed = receiver.receive(&slate, Some(amount)).expect("receive");
    sender.finalize(&signed).expect("finalize")
}

/// Full send: exchange, post, mine `confirmations` blocks and refresh both sides.
pub fn send_and_confirm(
    node: &InMemoryNode,
    sender: &WalletSession,
    receiver: &WalletSession,
    amount: u64,
    confirmations: u64,
) -> Slate {
    let slate = exchange(sender, receiver, amount);
    sender.post(&slate.id).expect("post");
    node.mine_blocks(confirmations);
    sender.refresh().expect("sender refresh");
    receiver.refresh().expect("receiver refresh");
    slate
}
