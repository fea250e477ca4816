//! Wallet error types.

use beryl_core::error::{CryptoError, NodeError, TransactionError};
use thiserror::Error;

/// Errors that can occur in wallet operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    /// Wrong password, or the keystore cannot be decrypted.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The node timed out or could not be contacted.
    #[error("node unreachable: {0}")]
    NodeUnreachable(String),

    /// The node answered with something the wallet cannot use.
    #[error("node error: {0}")]
    NodeProtocol(String),

    /// No eligible set of outputs covers the amount plus fee.
    #[error("insufficient funds: need {needed}, available {available}, short {shortfall}")]
    InsufficientFunds {
        /// Amount plus estimated fee in nanoberyl.
        needed: u64,
        /// Sum of eligible outputs in nanoberyl.
        available: u64,
        shortfall: u64,
    },

    /// Malformed or out-of-protocol-order slate.
    #[error("invalid slate: {0}")]
    InvalidSlate(String),

    /// The finalized transaction does not satisfy the commitment balance.
    #[error("transaction does not balance")]
    BalanceMismatch,

    /// An input is already spent on chain or in the node's pool.
    #[error("already spent: {0}")]
    AlreadySpent(String),

    /// An output is already locked by another transaction attempt.
    #[error("output already locked: {0}")]
    DoubleLockAttempt(String),

    /// An output with this commitment is already in the ledger.
    #[error("duplicate output: {0}")]
    DuplicateOutput(String),

    #[error("transaction not found: {0}")]
    TransactionNotFound(String),

    /// The requested operation is not allowed at the transaction's stage.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// The node refused the transaction for a reason other than a spent input.
    #[error("transaction rejected: {0}")]
    PostRejected(String),

    #[error("transaction already confirmed: {0}")]
    AlreadyConfirmed(String),

    /// Another session holds the wallet's advisory lock.
    #[error("wallet is locked by another session: {0}")]
    WalletLocked(String),

    #[error("wallet already exists: {0}")]
    WalletExists(String),

    #[error("wallet not found: {0}")]
    WalletNotFound(String),

    /// Unknown or stale session handle.
    #[error("invalid session handle: {0}")]
    InvalidHandle(u64),

    /// Invalid BIP-39 mnemonic phrase.
    #[error("invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    /// Invalid monetary amount.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// A request parameter that is not an amount is malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Wallet file is corrupted or has invalid format.
    #[error("corrupted file: {0}")]
    CorruptedFile(String),

    /// Encryption failure.
    #[error("encryption: {0}")]
    Encryption(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),

    /// Serialization error.
    #[error("serialization: {0}")]
    Serialization(String),

    /// Cryptographic error from beryl-core.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Transaction validation error from beryl-core.
    #[error(transparent)]
    Transaction(#[from] TransactionError),
}

impl From<NodeError> for WalletError {
    fn from(e: NodeError) -> Self {
        if e.is_unreachable() {
            Self::NodeUnreachable(e.to_string())
        } else {
            Self::NodeProtocol(e.to_string())
        }
    }
}

impl From<std::io::Error> for WalletError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl WalletError {
    /// Stable machine-readable code for the JSON boundary.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "invalid_credentials",
            Self::NodeUnreachable(_) => "node_unreachable",
            Self::NodeProtocol(_) => "node_error",
            Self::InsufficientFunds { .. } => "insufficient_funds",
            Self::InvalidSlate(_) => "invalid_slate",
            Self::BalanceMismatch => "balance_mismatch",
            Self::AlreadySpent(_) => "already_spent",
            Self::DoubleLockAttempt(_) => "double_lock_attempt",
            Self::DuplicateOutput(_) => "duplicate_output",
            Self::TransactionNotFound(_) => "transaction_not_found",
            Self::InvalidTransition(_) => "invalid_transition",
            Self::PostRejected(_) => "post_rejected",
            Self::AlreadyConfirmed(_) => "already_confirmed",
            Self::WalletLocked(_) => "wallet_locked",
            Self::WalletExists(_) => "wallet_exists",
            Self::WalletNotFound(_) => "wallet_not_found",
            Self::InvalidHandle(_) => "invalid_handle",
            Self::InvalidMnemonic(_) => "invalid_mnemonic",
            Self::InvalidAmount(_) => "invalid_amount",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::CorruptedFile(_) => "corrupted_file",
            Self::Encryption(_) => "encryption",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
            Self::Crypto(_) => "crypto",
            Self::Transaction(_) => "transaction",
        }
    }
}
