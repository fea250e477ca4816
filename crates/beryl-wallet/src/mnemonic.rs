//! BIP-39 seed phrase backup and restoration.

use bip39::{Language, Mnemonic};
use zeroize::Zeroizing;

use crate::error::WalletError;
use crate::keys::Seed;

/// Convert seed entropy to its 12- or 24-word BIP-39 phrase.
pub fn seed_to_mnemonic(seed: &Seed) -> Result<Zeroizing<String>, WalletError> {
    let m = Mnemonic::from_entropy_in(Language::English, seed.as_bytes())
        .map_err(|e| WalletError::InvalidMnemonic(e.to_string()))?;
    Ok(Zeroizing::new(m.to_string()))
}

/// Parse a BIP-39 phrase and extract its entropy as a Seed.
///
/// Normalizes whitespace and converts to lowercase before parsing.
pub fn mnemonic_to_seed(phrase: &str) -> Result<Seed, WalletError> {
    let normalized = Zeroizing::new(
        phrase
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase(),
    );
    let m = Mnemonic::parse_in(Language::English, normalized.as_str())
        .map_err(|e| WalletError::InvalidMnemonic(e.to_string()))?;
    let entropy = Zeroizing::new(m.to_entropy());
    Seed::from_entropy(&entropy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::WordCount;

    #[test]
    fn roundtrip_generate_24() {
        let seed = Seed::generate(WordCount::TwentyFour);
        let phrase = seed_to_mnemonic(&seed).unwrap();
        assert_eq!(phrase.split_whitespace().count(), 24);
        let restored = mnemonic_to_seed(&phrase).unwrap();
        assert_eq!(seed.as_bytes(), restored.as_bytes());
    }

    #[test]
    fn roundtrip_generate_12() {
        let seed = Seed::generate(WordCount::Twelve);
        let phrase = seed_to_mnemonic(&seed).unwrap();
        assert_eq!(phrase.split_whitespace().count(), 12);
        let restored = mnemonic_to_seed(&phrase).unwrap();
        assert_eq!(seed.as_bytes(), restored.as_bytes());
    }

    /// The all-zero 128-bit BIP-39 test vector.
    #[test]
    fn known_vector() {
        let seed = Seed::from_entropy(&[0u8; 16]).unwrap();
        let phrase = seed_to_mnemonic(&seed).unwrap();
        let expected = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
        assert_eq!(phrase.as_str(), expected);
    }

    #[test]
    fn invalid_word_rejected() {
        let err = mnemonic_to_seed("abandon abandon abandon invalidword").unwrap_err();
        assert!(err.to_string().contains("invalid mnemonic"), "error message was: {err}");
    }

    #[test]
    fn bad_checksum_rejected() {
        let mut phrase = vec!["abandon"; 23].join(" ");
        phrase.push_str(" zoo");
        assert!(mnemonic_to_seed(&phrase).is_err());
    }

    #[test]
    fn whitespace_and_case_normalized() {
        let seed = Seed::from_entropy(&[0x55; 32]).unwrap();
        let clean = seed_to_mnemonic(&seed).unwrap();
        let messy = clean.split_whitespace().collect::<Vec<_>>().join("   \t").to_uppercase();
        let restored = mnemonic_to_seed(&messy).unwrap();
        assert_eq!(seed.as_bytes(), restored.as_bytes());
    }
}
