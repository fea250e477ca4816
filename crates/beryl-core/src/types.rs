//! Core protocol types: commitments, kernels, transactions.
//!
//! Curve points are carried in compressed Ristretto form and only
//! decompressed when arithmetic is needed. All byte strings serialize to
//! lowercase hex in JSON.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::crypto;
use crate::error::{CryptoError, TransactionError};

/// Hex (de)serialization for fixed-size byte arrays.
pub mod serde_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer, const N: usize>(
        bytes: &[u8; N],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>, const N: usize>(
        deserializer: D,
    ) -> Result<[u8; N], D::Error> {
        let s = String::deserialize(deserializer)?;
        let mut out = [0u8; N];
        hex::decode_to_slice(&s, &mut out).map_err(serde::de::Error::custom)?;
        Ok(out)
    }
}

/// A Pedersen commitment `r·G + v·H` to an output value.
///
/// Uniquely identifies an output both on chain and in the wallet ledger.
#[derive(
    Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
    bincode::Encode, bincode::Decode,
)]
pub struct Commitment(#[serde(with = "serde_hex")] pub [u8; 32]);

impl Commitment {
    /// Return the underlying compressed point bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Parse a commitment from its hex encoding.
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| CryptoError::InvalidPoint)?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Commitment({})", hex::encode(&self.0[..8]))
    }
}

/// A public curve point `x·G`: a participant's public excess or nonce, or a
/// kernel excess.
#[derive(
    Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
    bincode::Encode, bincode::Decode,
)]
pub struct PublicKey(#[serde(with = "serde_hex")] pub [u8; 32]);

impl PublicKey {
    /// Return the underlying compressed point bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(&self.0[..8]))
    }
}

/// A published blinding scalar: the transaction's kernel offset.
#[derive(
    Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct BlindingFactor(#[serde(with = "serde_hex")] pub [u8; 32]);

/// A Schnorr signature `(R, s)`.
///
/// Partial signatures carry the signer's own public nonce as `r`; an
/// aggregated signature carries the sum of all public nonces.
#[derive(
    Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug,
    bincode::Encode, bincode::Decode,
)]
pub struct Signature {
    pub r: PublicKey,
    #[serde(with = "serde_hex")]
    pub s: [u8; 32],
}

/// Owner-recoverable data attached to every output.
///
/// `message` is the derivation index and value masked with a keystream
/// only the owner can derive; `tag` authenticates the unmasked message.
#[derive(
    Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug,
    bincode::Encode, bincode::Decode,
)]
pub struct OutputProof {
    #[serde(with = "serde_hex")]
    pub message: [u8; 16],
    #[serde(with = "serde_hex")]
    pub tag: [u8; 16],
}

/// A transaction input, spending an existing output by commitment.
#[derive(
    Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug,
    bincode::Encode, bincode::Decode,
)]
pub struct TxInput {
    pub commitment: Commitment,
}

/// A transaction output.
#[derive(
    Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug,
    bincode::Encode, bincode::Decode,
)]
pub struct TxOutput {
    pub commitment: Commitment,
    pub proof: OutputProof,
}

/// A transaction kernel: the fee, lock height, public excess and the
/// aggregate signature proving knowledge of the excess.
#[derive(
    Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug,
    bincode::Encode, bincode::Decode,
)]
pub struct TxKernel {
    pub fee: u64,
    pub lock_height: u64,
    pub excess: PublicKey,
    pub excess_sig: Signature,
}

impl TxKernel {
    /// The message the kernel signature commits to.
    pub fn message(&self) -> [u8; 32] {
        crypto::kernel_message(self.fee, self.lock_height)
    }

    /// Verify the kernel signature against its excess.
    pub fn verify(&self) -> Result<(), CryptoError> {
        crypto::verify(&self.excess_sig, &self.excess, &self.message())
    }
}

/// A complete transaction ready to be posted to the network.
#[derive(
    Serialize, Deserialize, Clone, PartialEq, Eq, Debug,
    bincode::Encode, bincode::Decode,
)]
pub struct Transaction {
    /// Kernel offset (published part of the total blinding factor).
    pub offset: BlindingFactor,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub kernels: Vec<TxKernel>,
}

impl Transaction {
    /// Sum of all kernel fees.
    pub fn fee(&self) -> Result<u64, TransactionError> {
        self.kernels.iter().try_fold(0u64, |acc, k| {
            acc.checked_add(k.fee).ok_or(TransactionError::FeeOverflow)
        })
    }

    /// Validate kernel signatures and the balance equation
    /// `Σout − Σin + fee·H == Σexcess + offset·G`.
    pub fn validate(&self) -> Result<(), TransactionError> {
        if self.outputs.is_empty() {
            return Err(TransactionError::NoOutputs);
        }
        if self.kernels.is_empty() {
            return Err(TransactionError::NoKernels);
        }

        let mut seen = HashSet::new();
        let all = self
            .inputs
            .iter()
            .map(|i| i.commitment)
            .chain(self.outputs.iter().map(|o| o.commitment));
        for commitment in all {
            if !seen.insert(commitment) {
                return Err(TransactionError::DuplicateCommitment(commitment.to_string()));
            }
        }

        for (index, kernel) in self.kernels.iter().enumerate() {
            kernel
                .verify()
                .map_err(|_| TransactionError::InvalidKernelSignature { index })?;
        }

        let outputs: Vec<Commitment> = self.outputs.iter().map(|o| o.commitment).collect();
        let inputs: Vec<Commitment> = self.inputs.iter().map(|i| i.commitment).collect();
        let excesses: Vec<PublicKey> = self.kernels.iter().map(|k| k.excess).collect();

        if crypto::verify_balance(&outputs, &inputs, self.fee()?, &excesses, &self.offset)? {
            Ok(())
        } else {
            Err(TransactionError::BalanceMismatch)
        }
    }
}
