//! AES-256-GCM wallet file encryption.
//!
//! The seed file is encrypted under a password-derived key (Argon2id). The
//! state file is encrypted under a key derived from the seed itself, so it
//! can only be read after the seed file has been unlocked.
//!
//! # Wire format
//! ```text
//! password:  salt (32 bytes) || nonce (12 bytes) || ciphertext + auth_tag
//! raw key:   nonce (12 bytes) || ciphertext + auth_tag
//! ```

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::WalletError;

/// Salt length in bytes.
const SALT_LEN: usize = 32;

/// AES-GCM nonce length in bytes.
const NONCE_LEN: usize = 12;

/// AES-GCM authentication tag length in bytes.
const TAG_LEN: usize = 16;

/// Argon2id cost parameters, stored in the seed file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    /// 64 MiB, 3 passes, 1 lane.
    fn default() -> Self {
        Self { memory_kib: 65_536, iterations: 3, parallelism: 1 }
    }
}

impl KdfParams {
    /// Smallest parameters Argon2 accepts. Only for tests.
    pub fn minimal() -> Self {
        Self { memory_kib: 8, iterations: 1, parallelism: 1 }
    }
}

/// Derive a 256-bit encryption key from a password and salt using Argon2id.
pub fn derive_key(
    password: &[u8],
    salt: &[u8],
    params: &KdfParams,
) -> Result<Zeroizing<[u8; 32]>, WalletError> {
    let argon_params = Params::new(params.memory_kib, params.iterations, params.parallelism, Some(32))
        .map_err(|e| WalletError::Encryption(format!("argon2 params: {e}")))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

    let mut key = Zeroizing::new([0u8; 32]);
    argon2
        .hash_password_into(password, salt, &mut key[..])
        .map_err(|e| WalletError::Encryption(format!("argon2: {e}")))?;
    Ok(key)
}

/// Encrypt plaintext with a password.
///
/// Returns `salt || nonce || ciphertext+tag`.
pub fn encrypt(plaintext: &[u8], password: &[u8], params: &KdfParams) -> Result<Vec<u8>, WalletError> {
    let mut salt = [0u8; SALT_LEN];
    rand::rngs::OsRng.fill_bytes(&mut salt);

    let key = derive_key(password, &salt, params)?;
    let sealed = encrypt_with_key(plaintext, &key)?;

    let mut result = Vec::with_capacity(SALT_LEN + sealed.len());
    result.extend_from_slice(&salt);
    result.extend_from_slice(&sealed);
    Ok(result)
}

/// Decrypt data that was encrypted with [`encrypt`].
///
/// Returns [`WalletError::InvalidCredentials`] if the password is wrong
/// (authentication tag mismatch).
pub fn decrypt(encrypted: &[u8], password: &[u8], params: &KdfParams) -> Result<Vec<u8>, WalletError> {
    if encrypted.len() < SALT_LEN + NONCE_LEN + TAG_LEN {
        return Err(WalletError::CorruptedFile(format!(
            "encrypted data too short: {}",
            encrypted.len()
        )));
    }
    let (salt, sealed) = encrypted.split_at(SALT_LEN);
    let key = derive_key(password, salt, params)?;
    decrypt_with_key(sealed, &key).map_err(|_| WalletError::InvalidCredentials)
}

/// Encrypt with a raw 256-bit key. Returns `nonce || ciphertext+tag`.
pub fn encrypt_with_key(plaintext: &[u8], key: &[u8; 32]) -> Result<Vec<u8>, WalletError> {
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);

    let cipher = Aes256Gcm::new_from_slice(key).map_err(|e| WalletError::Encryption(e.to_string()))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|e| WalletError::Encryption(e.to_string()))?;

    let mut result = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&ciphertext);
    Ok(result)
}

/// Decrypt data sealed with [`encrypt_with_key`].
pub fn decrypt_with_key(sealed: &[u8], key: &[u8; 32]) -> Result<Vec<u8>, WalletError> {
    if sealed.len() < NONCE_LEN + TAG_LEN {
        return Err(WalletError::CorruptedFile(format!("sealed data too short: {}", sealed.len())));
    }
    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|e| WalletError::Encryption(e.to_string()))?;
    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| WalletError::CorruptedFile("authentication failed".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> KdfParams {
        KdfParams::minimal()
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let password = b"correct horse battery staple";
        let plaintext = b"secret wallet data";

        let encrypted = encrypt(plaintext, password, &params()).unwrap();
        let decrypted = decrypt(&encrypted, password, &params()).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn wrong_password_fails() {
        let encrypted = encrypt(b"secret", b"correct", &params()).unwrap();
        let err = decrypt(&encrypted, b"wrong", &params()).unwrap_err();
        assert_eq!(err, WalletError::InvalidCredentials);
    }

    #[test]
    fn truncated_data_fails() {
        let err = decrypt(&[0u8; 10], b"password", &params()).unwrap_err();
        assert!(matches!(err, WalletError::CorruptedFile(_)));
    }

    #[test]
    fn tampered_salt_fails() {
        let mut encrypted = encrypt(b"secret", b"password", &params()).unwrap();
        encrypted[0] ^= 0xFF;
        let err = decrypt(&encrypted, b"password", &params()).unwrap_err();
        assert_eq!(err, WalletError::InvalidCredentials);
    }

    #[test]
    fn encrypted_has_correct_overhead() {
        let encrypted = encrypt(b"hello", b"password", &params()).unwrap();
        assert_eq!(encrypted.len(), SALT_LEN + NONCE_LEN + 5 + TAG_LEN);
    }

    #[test]
    fn derive_key_depends_on_salt() {
        let k1 = derive_key(b"password", b"salt-one-16bytes", &params()).unwrap();
        let k2 = derive_key(b"password", b"salt-two-16bytes", &params()).unwrap();
        assert_ne!(*k1, *k2);
    }

    #[test]
    fn raw_key_roundtrip_and_wrong_key() {
        let key = [7u8; 32];
        let sealed = encrypt_with_key(b"state", &key).unwrap();
        assert_eq!(decrypt_with_key(&sealed, &key).unwrap(), b"state");
        assert!(matches!(
            decrypt_with_key(&sealed, &[8u8; 32]).unwrap_err(),
            WalletError::CorruptedFile(_)
        ));
    }

    #[test]
    fn invalid_params_rejected() {
        let bad = KdfParams { memory_kib: 1, iterations: 0, parallelism: 1 };
        assert!(matches!(
            derive_key(b"pw", b"saltsaltsaltsalt", &bad).unwrap_err(),
            WalletError::Encryption(_)
        ));
    }
}
