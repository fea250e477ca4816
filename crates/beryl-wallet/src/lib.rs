//! # beryl-wallet: output ledger and interactive transaction engine.
//!
//! Tracks the outputs a wallet owns, selects coins, drives the two-party
//! slate exchange that builds a transaction, records every attempt in a
//! transaction log, and rebuilds the ledger from a seed phrase by scanning
//! the node's output index.
//!
//! # Modules
//!
//! - [`error`]: `WalletError` and its stable error codes
//! - [`keys`]: Seed, KeyChain, BLAKE3-based blinding factor derivation
//! - [`mnemonic`]: BIP-39 seed phrases
//! - [`encryption`]: Argon2id + AES-256-GCM file encryption
//! - [`config`]: `WalletConfig`
//! - [`ledger`]: Output ledger and balance computation
//! - [`coin_selection`]: Smallest-first and use-all selection
//! - [`txlog`]: Transaction log
//! - [`slate`]: Slate data and stage transitions
//! - [`slatepack`]: Text armor for slates
//! - [`restore`]: Output index scanning and seed restore
//! - [`store`]: On-disk wallet files and the advisory lock
//! - [`session`]: `WalletSession`, the aggregate root
//! - [`handles`]: Generation-checked session handles
//! - [`api`]: JSON owner API

pub mod api;
pub mod coin_selection;
pub mod config;
pub mod encryption;
pub mod error;
pub mod handles;
pub mod keys;
pub mod ledger;
pub mod mnemonic;
pub mod restore;
pub mod session;
pub mod slate;
pub mod slatepack;
pub mod store;
pub mod txlog;

mod context;

// Re-exports for convenient access
pub use api::{ApiResponse, OwnerApi};
pub use coin_selection::{CoinSelection, CoinSelector, SelectionStrategy};
pub use config::WalletConfig;
pub use error::WalletError;
pub use keys::{DerivationPath, KeyChain, Seed};
pub use ledger::{Balance, OutputLedger, OutputRecord, OutputStatus};
pub use restore::{RestoredLedger, ScanStatus, Scanner};
pub use session::WalletSession;
pub use slate::{Slate, SlateId, SlateStage};
pub use txlog::{TxDirection, TxLog, TxLogEntry, TxStatus};
