//! Commitments and Schnorr kernel signatures over the Ristretto group.
//!
//! Provides Pedersen commitments, secret/public key arithmetic, the
//! two-party aggregate signature used for transaction kernels, and the
//! owner-recoverable output proof used by restore.
//!
//! # Signing scheme
//!
//! Each participant `i` holds a secret excess `x_i` and a one-time nonce
//! `k_i`. With `R = Σ k_i·G`, `X = Σ x_i·G` and the kernel message `m`, the
//! challenge is `e = H(R ‖ X ‖ m)` and the partial signature is
//! `s_i = k_i + e·x_i`. The aggregate `(R, Σ s_i)` verifies as an ordinary
//! Schnorr signature under `X`.

use curve25519_dalek::constants::RISTRETTO_BASEPOINT_POINT;
use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::Identity;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::OnceLock;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;
use crate::types::{BlindingFactor, Commitment, OutputProof, PublicKey, Signature};

/// BLAKE3 context for deriving the value generator `H`.
const VALUE_GENERATOR_CONTEXT: &str = "beryl-core value generator H v1";

/// BLAKE3 context for the kernel signature challenge.
const CHALLENGE_CONTEXT: &str = "beryl-core kernel challenge v1";

/// BLAKE3 context for the kernel signature message.
const KERNEL_MESSAGE_CONTEXT: &str = "beryl-core kernel message v1";

/// The generator `H` used for committed values, independent of `G`.
fn value_generator() -> &'static RistrettoPoint {
    static H: OnceLock<RistrettoPoint> = OnceLock::new();
    H.get_or_init(|| {
        let mut bytes = [0u8; 64];
        blake3::Hasher::new_derive_key(VALUE_GENERATOR_CONTEXT)
            .update(b"H")
            .finalize_xof()
            .fill(&mut bytes);
        RistrettoPoint::from_uniform_bytes(&bytes)
    })
}

fn decompress(bytes: &[u8; 32]) -> Result<RistrettoPoint, CryptoError> {
    CompressedRistretto(*bytes)
        .decompress()
        .ok_or(CryptoError::InvalidPoint)
}

fn canonical_scalar(bytes: [u8; 32]) -> Result<Scalar, CryptoError> {
    Option::<Scalar>::from(Scalar::from_canonical_bytes(bytes)).ok_or(CryptoError::InvalidScalar)
}

/// A secret scalar: a blinding factor, an excess or a nonce.
///
/// Zeroized on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey([u8; 32]);

impl SecretKey {
    /// Sample a uniformly random secret key from the OS RNG.
    pub fn random() -> Self {
        use rand::RngCore;
        let mut wide = [0u8; 64];
        rand::rngs::OsRng.fill_bytes(&mut wide);
        let key = Self::from_scalar(Scalar::from_bytes_mod_order_wide(&wide));
        wide.zeroize();
        key
    }

    /// Reduce 32 bytes of key material (e.g. a KDF output) into a scalar.
    pub fn from_key_material(bytes: [u8; 32]) -> Self {
        Self::from_scalar(Scalar::from_bytes_mod_order(bytes))
    }

    /// Parse canonical scalar bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, CryptoError> {
        canonical_scalar(bytes).map(Self::from_scalar)
    }

    fn from_scalar(scalar: Scalar) -> Self {
        Self(scalar.to_bytes())
    }

    fn scalar(&self) -> Scalar {
        Scalar::from_bytes_mod_order(self.0)
    }

    /// Raw canonical bytes. Handle with care.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// The public point `x·G`.
    pub fn public_key(&self) -> PublicKey {
        PublicKey((RISTRETTO_BASEPOINT_POINT * self.scalar()).compress().to_bytes())
    }

    /// `Σ positive − Σ negative`.
    pub fn sum(positive: &[&SecretKey], negative: &[&SecretKey]) -> SecretKey {
        let pos: Scalar = positive.iter().map(|k| k.scalar()).sum();
        let neg: Scalar = negative.iter().map(|k| k.scalar()).sum();
        Self::from_scalar(pos - neg)
    }

    /// Publish this scalar as a kernel offset.
    pub fn to_blinding_factor(&self) -> BlindingFactor {
        BlindingFactor(self.0)
    }

    /// Recover a secret key from a published blinding factor.
    pub fn from_blinding_factor(bf: &BlindingFactor) -> Result<Self, CryptoError> {
        Self::from_bytes(bf.0)
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey([REDACTED])")
    }
}

impl Serialize for SecretKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for SecretKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = zeroize::Zeroizing::new(String::deserialize(deserializer)?);
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s.as_str(), &mut bytes).map_err(serde::de::Error::custom)?;
        let key = Self::from_bytes(bytes).map_err(serde::de::Error::custom);
        bytes.zeroize();
        key
    }
}

/// Commit to `value` with blinding factor `blind`: `blind·G + value·H`.
pub fn commit(value: u64, blind: &SecretKey) -> Commitment {
    let point = RISTRETTO_BASEPOINT_POINT * blind.scalar() + value_generator() * Scalar::from(value);
    Commitment(point.compress().to_bytes())
}

/// Check `Σoutputs − Σinputs + fee·H == Σexcesses + offset·G`.
pub fn verify_balance(
    outputs: &[Commitment],
    inputs: &[Commitment],
    fee: u64,
    excesses: &[PublicKey],
    offset: &BlindingFactor,
) -> Result<bool, CryptoError> {
    let mut lhs = value_generator() * Scalar::from(fee);
    for c in outputs {
        lhs += decompress(&c.0)?;
    }
    for c in inputs {
        lhs -= decompress(&c.0)?;
    }

    let mut rhs = RISTRETTO_BASEPOINT_POINT * canonical_scalar(offset.0)?;
    for x in excesses {
        rhs += decompress(&x.0)?;
    }
    Ok(lhs == rhs)
}

/// Sum public points.
pub fn sum_public_keys(keys: &[PublicKey]) -> Result<PublicKey, CryptoError> {
    if keys.is_empty() {
        return Err(CryptoError::EmptyKeySet);
    }
    let mut sum = RistrettoPoint::identity();
    for k in keys {
        sum += decompress(&k.0)?;
    }
    Ok(PublicKey(sum.compress().to_bytes()))
}

/// Check that bytes decode to a valid group element.
pub fn validate_point(key: &PublicKey) -> Result<(), CryptoError> {
    decompress(&key.0).map(|_| ())
}

/// Message committed to by a kernel signature.
pub fn kernel_message(fee: u64, lock_height: u64) -> [u8; 32] {
    let mut data = [0u8; 16];
    data[..8].copy_from_slice(&fee.to_le_bytes());
    data[8..].copy_from_slice(&lock_height.to_le_bytes());
    blake3::derive_key(KERNEL_MESSAGE_CONTEXT, &data)
}

fn challenge(nonce_sum: &PublicKey, pubkey_sum: &PublicKey, msg: &[u8; 32]) -> Scalar {
    let mut wide = [0u8; 64];
    blake3::Hasher::new_derive_key(CHALLENGE_CONTEXT)
        .update(&nonce_sum.0)
        .update(&pubkey_sum.0)
        .update(msg)
        .finalize_xof()
        .fill(&mut wide);
    Scalar::from_bytes_mod_order_wide(&wide)
}

/// Produce this participant's partial signature `s_i = k_i + e·x_i`.
pub fn sign_partial(
    sec_key: &SecretKey,
    sec_nonce: &SecretKey,
    nonce_sum: &PublicKey,
    pubkey_sum: &PublicKey,
    msg: &[u8; 32],
) -> Signature {
    let e = challenge(nonce_sum, pubkey_sum, msg);
    let s = sec_nonce.scalar() + e * sec_key.scalar();
    Signature {
        r: sec_nonce.public_key(),
        s: s.to_bytes(),
    }
}

/// Verify a partial signature against the signer's public excess.
pub fn verify_partial(
    sig: &Signature,
    public_key: &PublicKey,
    nonce_sum: &PublicKey,
    pubkey_sum: &PublicKey,
    msg: &[u8; 32],
) -> Result<(), CryptoError> {
    let e = challenge(nonce_sum, pubkey_sum, msg);
    let lhs = RISTRETTO_BASEPOINT_POINT * canonical_scalar(sig.s)?;
    let rhs = decompress(&sig.r.0)? + decompress(&public_key.0)? * e;
    if lhs == rhs {
        Ok(())
    } else {
        Err(CryptoError::VerificationFailed)
    }
}

/// Combine partial signatures into the final `(R, Σ s_i)`.
pub fn aggregate_signatures(
    partials: &[Signature],
    nonce_sum: &PublicKey,
) -> Result<Signature, CryptoError> {
    if partials.is_empty() {
        return Err(CryptoError::EmptyKeySet);
    }
    let mut s = Scalar::ZERO;
    for p in partials {
        s += canonical_scalar(p.s)?;
    }
    Ok(Signature {
        r: *nonce_sum,
        s: s.to_bytes(),
    })
}

/// Verify an aggregate Schnorr signature.
pub fn verify(sig: &Signature, public_key: &PublicKey, msg: &[u8; 32]) -> Result<(), CryptoError> {
    verify_partial(sig, public_key, &sig.r, public_key, msg)
}

fn proof_keystream(rewind_key: &[u8; 32], commitment: &Commitment) -> [u8; 16] {
    let mut data = Vec::with_capacity(36);
    data.extend_from_slice(b"mask");
    data.extend_from_slice(&commitment.0);
    let hash = blake3::keyed_hash(rewind_key, &data);
    let mut out = [0u8; 16];
    out.copy_from_slice(&hash.as_bytes()[..16]);
    out
}

fn proof_tag(rewind_key: &[u8; 32], commitment: &Commitment, plaintext: &[u8; 16]) -> [u8; 16] {
    let mut data = Vec::with_capacity(51);
    data.extend_from_slice(b"tag");
    data.extend_from_slice(&commitment.0);
    data.extend_from_slice(plaintext);
    let hash = blake3::keyed_hash(rewind_key, &data);
    let mut out = [0u8; 16];
    out.copy_from_slice(&hash.as_bytes()[..16]);
    out
}

/// Build the proof that lets the owner recover `(key_index, value)` later.
pub fn create_output_proof(
    rewind_key: &[u8; 32],
    commitment: &Commitment,
    key_index: u32,
    value: u64,
) -> OutputProof {
    let mut plaintext = [0u8; 16];
    plaintext[..4].copy_from_slice(&key_index.to_le_bytes());
    plaintext[8..].copy_from_slice(&value.to_le_bytes());

    let tag = proof_tag(rewind_key, commitment, &plaintext);
    let stream = proof_keystream(rewind_key, commitment);
    let mut message = [0u8; 16];
    for (i, byte) in message.iter_mut().enumerate() {
        *byte = plaintext[i] ^ stream[i];
    }
    plaintext.zeroize();
    OutputProof { message, tag }
}

/// Unmask an output proof. Returns `None` if the output is not ours.
///
/// The caller must still recompute the commitment from the derived
/// blinding factor; the recovered value is only a candidate.
pub fn rewind_output_proof(
    rewind_key: &[u8; 32],
    commitment: &Commitment,
    proof: &OutputProof,
) -> Option<(u32, u64)> {
    let stream = proof_keystream(rewind_key, commitment);
    let mut plaintext = [0u8; 16];
    for (i, byte) in plaintext.iter_mut().enumerate() {
        *byte = proof.message[i] ^ stream[i];
    }
    if plaintext[4..8] != [0u8; 4] || proof_tag(rewind_key, commitment, &plaintext) != proof.tag {
        return None;
    }
    let mut index = [0u8; 4];
    index.copy_from_slice(&plaintext[..4]);
    let mut value = [0u8; 8];
    value.copy_from_slice(&plaintext[8..]);
    Some((u32::from_le_bytes(index), u64::from_le_bytes(value)))
}
