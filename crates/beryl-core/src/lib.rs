//! # beryl-core
//! Protocol primitives for the Beryl wallet engine: Pedersen commitments,
//! two-party Schnorr kernels, transactions, network parameters and the
//! interface to a remote node.

pub mod constants;
pub mod crypto;
pub mod error;
pub mod fee;
#[cfg(feature = "testing")]
pub mod memory_node;
pub mod traits;
pub mod types;
