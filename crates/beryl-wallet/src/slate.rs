//! Slates: the partial transactions exchanged between sender and receiver.
//!
//! A slate moves through a fixed sequence of stages:
//!
//! ```text
//! Created -> AwaitingReceiver -> ReceiverSigned -> Finalized -> Posted
//!    \              \                  \              \
//!     +--------------+------------------+--> Cancelled (Finalized only after a rejected post)
//! ```
//!
//! [`transition`] is the single source of truth for which moves are legal.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use beryl_core::crypto::{self, SecretKey};
use beryl_core::types::{
    BlindingFactor, Commitment, PublicKey, Signature, Transaction, TxInput, TxKernel, TxOutput,
};

use crate::error::WalletError;

/// Current slate format version.
pub const SLATE_VERSION: u16 = 1;

/// Only two-party transactions are supported.
pub const NUM_PARTICIPANTS: u8 = 2;

/// Unique transaction identifier, shown in UUID form.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, bincode::Encode, bincode::Decode)]
pub struct SlateId(pub [u8; 16]);

impl SlateId {
    pub fn random() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; 16];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }
}

impl fmt::Display for SlateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let h = hex::encode(self.0);
        write!(f, "{}-{}-{}-{}-{}", &h[..8], &h[8..12], &h[12..16], &h[16..20], &h[20..])
    }
}

impl fmt::Debug for SlateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SlateId({self})")
    }
}

impl FromStr for SlateId {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compact: String = s.chars().filter(|c| *c != '-').collect();
        let mut bytes = [0u8; 16];
        hex::decode_to_slice(&compact, &mut bytes)
            .map_err(|_| WalletError::InvalidSlate(format!("bad slate id: {s}")))?;
        Ok(Self(bytes))
    }
}

impl Serialize for SlateId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SlateId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub enum SlateStage {
    /// Sender built the slate and locked its inputs.
    Created,
    /// Handed to the transport, waiting for the receiver.
    AwaitingReceiver,
    /// Receiver added its output and partial signature.
    ReceiverSigned,
    /// Sender combined both signatures into a valid transaction.
    Finalized,
    /// Accepted by the node.
    Posted,
    Cancelled,
}

impl fmt::Display for SlateStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Something that happens to a slate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlateEvent {
    /// The sender hands the new slate to the transport.
    Publish,
    ReceiverSign,
    Finalize,
    /// The node accepted the transaction. Reposting is allowed.
    Post,
    Cancel,
    /// Cancel a finalized transaction the node refused.
    AbandonRejected,
}

/// The stage a slate moves to on `event`, or `InvalidTransition`.
pub fn transition(stage: SlateStage, event: SlateEvent) -> Result<SlateStage, WalletError> {
    use SlateEvent as E;
    use SlateStage as S;
    match (stage, event) {
        (S::Created, E::Publish) => Ok(S::AwaitingReceiver),
        (S::AwaitingReceiver, E::ReceiverSign) => Ok(S::ReceiverSigned),
        (S::ReceiverSigned, E::Finalize) => Ok(S::Finalized),
        (S::Finalized | S::Posted, E::Post) => Ok(S::Posted),
        (S::Created | S::AwaitingReceiver | S::ReceiverSigned | S::Cancelled, E::Cancel) => {
            Ok(S::Cancelled)
        }
        (S::Finalized, E::AbandonRejected) => Ok(S::Cancelled),
        (stage, event) => Err(WalletError::InvalidTransition(format!("{event:?} from {stage}"))),
    }
}

/// One party's public contribution to the shared signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct ParticipantData {
    pub id: u8,
    pub public_excess: PublicKey,
    pub public_nonce: PublicKey,
    pub part_sig: Option<Signature>,
}

/// A partially built transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Slate {
    pub version: u16,
    pub id: SlateId,
    pub stage: SlateStage,
    pub num_participants: u8,
    /// Amount paid to the receiver.
    pub amount: u64,
    pub fee: u64,
    pub lock_height: u64,
    pub ttl_cutoff_height: Option<u64>,
    pub offset: BlindingFactor,
    pub participants: Vec<ParticipantData>,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    /// Set when the sender finalizes.
    pub kernel: Option<TxKernel>,
}

impl Slate {
    pub fn participant(&self, id: u8) -> Option<&ParticipantData> {
        self.participants.iter().find(|p| p.id == id)
    }

    /// The message both parties sign.
    pub fn kernel_message(&self) -> [u8; 32] {
        crypto::kernel_message(self.fee, self.lock_height)
    }

    /// Sum of all public nonces.
    pub fn nonce_sum(&self) -> Result<PublicKey, WalletError> {
        let nonces: Vec<PublicKey> = self.participants.iter().map(|p| p.public_nonce).collect();
        crypto::sum_public_keys(&nonces).map_err(|e| WalletError::InvalidSlate(format!("nonces: {e}")))
    }

    /// Sum of all public excesses: the kernel excess.
    pub fn excess_sum(&self) -> Result<PublicKey, WalletError> {
        let excesses: Vec<PublicKey> = self.participants.iter().map(|p| p.public_excess).collect();
        crypto::sum_public_keys(&excesses).map_err(|e| WalletError::InvalidSlate(format!("excesses: {e}")))
    }

    pub fn input_commitments(&self) -> Vec<Commitment> {
        self.inputs.iter().map(|i| i.commitment).collect()
    }

    pub fn output_commitments(&self) -> Vec<Commitment> {
        self.outputs.iter().map(|o| o.commitment).collect()
    }

    /// Move to the stage `event` leads to.
    pub fn apply(&mut self, event: SlateEvent) -> Result<(), WalletError> {
        self.stage = transition(self.stage, event)?;
        Ok(())
    }

    /// Reject slates that are malformed regardless of stage.
    pub fn validate_structure(&self) -> Result<(), WalletError> {
        let invalid = |msg: String| Err(WalletError::InvalidSlate(msg));

        if self.version != SLATE_VERSION {
            return invalid(format!("unsupported version {}", self.version));
        }
        if self.num_participants != NUM_PARTICIPANTS || self.participants.len() > NUM_PARTICIPANTS as usize {
            return invalid("only two-party transactions are supported".into());
        }
        if self.participants.is_empty() {
            return invalid("no participants".into());
        }
        for (i, p) in self.participants.iter().enumerate() {
            if p.id as usize != i {
                return invalid(format!("participant {i} has id {}", p.id));
            }
            crypto::validate_point(&p.public_excess)
                .and_then(|_| crypto::validate_point(&p.public_nonce))
                .map_err(|e| WalletError::InvalidSlate(format!("participant {i}: {e}")))?;
        }
        if self.amount == 0 {
            return invalid("amount must be non-zero".into());
        }
        if SecretKey::from_blinding_factor(&self.offset).is_err() {
            return invalid("malformed kernel offset".into());
        }

        let mut seen = HashSet::new();
        for c in self.input_commitments().into_iter().chain(self.output_commitments()) {
            if !seen.insert(c) {
                return invalid(format!("duplicate commitment {c}"));
            }
        }
        Ok(())
    }

    /// The finalized transaction.
    pub fn to_transaction(&self) -> Result<Transaction, WalletError> {
        let kernel = self
            .kernel
            .ok_or_else(|| WalletError::InvalidTransition(format!("slate {} is not finalized", self.id)))?;
        Ok(Transaction {
            offset: self.offset,
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
            kernels: vec![kernel],
        })
    }
}
