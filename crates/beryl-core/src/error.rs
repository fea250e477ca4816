//! Error types for the Beryl protocol primitives.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid curve point")] InvalidPoint,
    #[error("non-canonical scalar")] InvalidScalar,
    #[error("signature verification failed")] VerificationFailed,
    #[error("empty key set")] EmptyKeySet,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("transaction has no outputs")] NoOutputs,
    #[error("transaction has no kernels")] NoKernels,
    #[error("duplicate commitment: {0}")] DuplicateCommitment(String),
    #[error("invalid kernel signature at index {index}")] InvalidKernelSignature { index: usize },
    #[error("commitments do not balance against kernel excess and offset")] BalanceMismatch,
    #[error("fee overflow")] FeeOverflow,
    #[error(transparent)] Crypto(#[from] CryptoError),
}

/// Failures talking to the remote node.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    #[error("node unreachable: {0}")] Unreachable(String),
    #[error("node request timed out")] Timeout,
    #[error("node protocol error: {0}")] Protocol(String),
}

impl NodeError {
    /// Whether the failure means the node could not be contacted at all.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::Timeout)
    }
}
