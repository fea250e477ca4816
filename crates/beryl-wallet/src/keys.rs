//! Seed management and deterministic blinding factor derivation.
//!
//! Every output's blinding factor is derived from the seed with BLAKE3's
//! keyed derivation over `(account, index)`, so the whole ledger can be
//! rebuilt from the seed phrase alone. Separate derivation contexts yield
//! the rewind key used for output proofs and the key that encrypts the
//! wallet state file.

use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use beryl_core::crypto::{self, SecretKey};
use beryl_core::types::{Commitment, OutputProof, TxOutput};

use crate::error::WalletError;

/// BLAKE3 KDF context for the master key.
const MASTER_CONTEXT: &str = "beryl-wallet master key v1";

/// BLAKE3 KDF context for output blinding factors.
const BLIND_CONTEXT: &str = "beryl-wallet blinding factor v1";

/// BLAKE3 KDF context for the output proof rewind key.
const REWIND_CONTEXT: &str = "beryl-wallet rewind key v1";

/// BLAKE3 KDF context for the state file encryption key.
const STATE_CONTEXT: &str = "beryl-wallet state key v1";

/// Number of words in a seed phrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WordCount {
    #[serde(rename = "12")]
    Twelve,
    #[default]
    #[serde(rename = "24")]
    TwentyFour,
}

impl WordCount {
    /// Entropy length in bytes.
    pub fn entropy_len(&self) -> usize {
        match self {
            Self::Twelve => 16,
            Self::TwentyFour => 32,
        }
    }

    pub fn from_words(words: usize) -> Result<Self, WalletError> {
        match words {
            12 => Ok(Self::Twelve),
            24 => Ok(Self::TwentyFour),
            n => Err(WalletError::InvalidMnemonic(format!("unsupported word count {n}"))),
        }
    }
}

/// Seed entropy (16 or 32 bytes), the root of every wallet key.
///
/// Secret material is zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Seed {
    entropy: Vec<u8>,
}

impl Seed {
    /// Generate random entropy from the OS cryptographic RNG.
    pub fn generate(words: WordCount) -> Self {
        use rand::RngCore;
        let mut entropy = vec![0u8; words.entropy_len()];
        rand::rngs::OsRng.fill_bytes(&mut entropy);
        Self { entropy }
    }

    /// Create a seed from raw entropy. Only 16 and 32 byte inputs are valid.
    pub fn from_entropy(entropy: &[u8]) -> Result<Self, WalletError> {
        if entropy.len() != 16 && entropy.len() != 32 {
            return Err(WalletError::InvalidMnemonic(format!(
                "expected 16 or 32 bytes of entropy, got {}",
                entropy.len()
            )));
        }
        Ok(Self { entropy: entropy.to_vec() })
    }

    /// Get the raw entropy. Handle with care.
    pub fn as_bytes(&self) -> &[u8] {
        &self.entropy
    }

    fn master_key(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(blake3::derive_key(MASTER_CONTEXT, &self.entropy))
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Seed")
            .field("entropy", &"[REDACTED]")
            .finish()
    }
}

/// Identifies the key an output was built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DerivationPath {
    pub account: u32,
    pub index: u32,
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m/{}/{}", self.account, self.index)
    }
}

/// Deterministic key derivation for one account of a seed.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct KeyChain {
    master: [u8; 32],
    #[zeroize(skip)]
    account: u32,
}

impl KeyChain {
    pub fn new(seed: &Seed, account: u32) -> Self {
        Self { master: *seed.master_key(), account }
    }

    pub fn account(&self) -> u32 {
        self.account
    }

    /// Path for the given child index in this keychain's account.
    pub fn path(&self, index: u32) -> DerivationPath {
        DerivationPath { account: self.account, index }
    }

    /// Derive the blinding factor for a derivation path.
    pub fn blinding_factor(&self, path: &DerivationPath) -> SecretKey {
        let mut ikm = Zeroizing::new(Vec::with_capacity(40));
        ikm.extend_from_slice(&self.master);
        ikm.extend_from_slice(&path.account.to_le_bytes());
        ikm.extend_from_slice(&path.index.to_le_bytes());
        SecretKey::from_key_material(blake3::derive_key(BLIND_CONTEXT, &ikm))
    }

    /// Key that masks output proofs for this account.
    pub fn rewind_key(&self) -> Zeroizing<[u8; 32]> {
        let mut ikm = Zeroizing::new(Vec::with_capacity(36));
        ikm.extend_from_slice(&self.master);
        ikm.extend_from_slice(&self.account.to_le_bytes());
        Zeroizing::new(blake3::derive_key(REWIND_CONTEXT, &ikm))
    }

    /// Key that encrypts the wallet state file. Independent of account.
    pub fn state_key(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(blake3::derive_key(STATE_CONTEXT, &self.master))
    }

    /// Build an output of `value` at `path`, returning its blinding factor.
    pub fn build_output(&self, path: &DerivationPath, value: u64) -> (SecretKey, TxOutput) {
        let blind = self.blinding_factor(path);
        let commitment = crypto::commit(value, &blind);
        let proof = crypto::create_output_proof(&self.rewind_key(), &commitment, path.index, value);
        (blind, TxOutput { commitment, proof })
    }

    /// Recognize an output as ours and recover its path and value.
    ///
    /// The value from the proof is only accepted if recommitting it with the
    /// derived blinding factor reproduces the on-chain commitment.
    pub fn recover_output(
        &self,
        commitment: &Commitment,
        proof: &OutputProof,
    ) -> Option<(DerivationPath, u64)> {
        let (index, value) = crypto::rewind_output_proof(&self.rewind_key(), commitment, proof)?;
        let path = self.path(index);
        let blind = self.blinding_factor(&path);
        (crypto::commit(value, &blind) == *commitment).then_some((path, value))
    }
}

impl fmt::Debug for KeyChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyChain")
            .field("account", &self.account)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keychain(b: u8) -> KeyChain {
        KeyChain::new(&Seed::from_entropy(&[b; 32]).unwrap(), 0)
    }

    #[test]
    fn seed_generate_unique() {
        let s1 = Seed::generate(WordCount::TwentyFour);
        let s2 = Seed::generate(WordCount::TwentyFour);
        assert_ne!(s1.as_bytes(), s2.as_bytes());
        assert_eq!(Seed::generate(WordCount::Twelve).as_bytes().len(), 16);
    }

    #[test]
    fn seed_rejects_bad_length() {
        assert!(Seed::from_entropy(&[0u8; 20]).is_err());
        assert!(Seed::from_entropy(&[0u8; 16]).is_ok());
    }

    #[test]
    fn seed_debug_hides_bytes() {
        let seed = Seed::from_entropy(&[0xAB; 32]).unwrap();
        let debug = format!("{seed:?}");
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("ab"));
    }

    #[test]
    fn derive_deterministic() {
        let kc = keychain(1);
        let path = kc.path(3);
        assert_eq!(kc.blinding_factor(&path), keychain(1).blinding_factor(&path));
    }

    #[test]
    fn derive_unique_per_index_and_account() {
        let seed = Seed::from_entropy(&[1u8; 32]).unwrap();
        let kc0 = KeyChain::new(&seed, 0);
        let kc1 = KeyChain::new(&seed, 1);
        assert_ne!(kc0.blinding_factor(&kc0.path(0)), kc0.blinding_factor(&kc0.path(1)));
        assert_ne!(kc0.blinding_factor(&kc0.path(0)), kc1.blinding_factor(&kc1.path(0)));
        assert_ne!(*kc0.rewind_key(), *kc1.rewind_key());
        assert_eq!(*kc0.state_key(), *kc1.state_key());
    }

    #[test]
    fn owner_recovers_output() {
        let kc = keychain(2);
        let path = kc.path(7);
        let (_, output) = kc.build_output(&path, 12_345);
        assert_eq!(kc.recover_output(&output.commitment, &output.proof), Some((path, 12_345)));
    }

    #[test]
    fn stranger_cannot_recover_output() {
        let (_, output) = keychain(2).build_output(&keychain(2).path(0), 99);
        assert_eq!(keychain(3).recover_output(&output.commitment, &output.proof), None);
    }

    #[test]
    fn path_display() {
        assert_eq!(DerivationPath { account: 0, index: 5 }.to_string(), "m/0/5");
    }

    #[test]
    fn word_count_parsing() {
        assert_eq!(WordCount::from_words(12).unwrap(), WordCount::Twelve);
        assert!(WordCount::from_words(18).is_err());
    }
}
