//! Slatepack: text armor for carrying slates by copy and paste.
//!
//! ```text
//! BEGINSLATEPACK. 4H1qx1wHe668tFW yC2gfL8PPd8kSgv pcXQhyRkHbyKHZg GN75o7uWoT3dkib
//! R2tj1fFGN2FoRLY GWmtgsneoXf7N4D uVWuyZSamPhfF1u AHRaYWvhF7jQvKx wNJAc7qmVm9JVcm
//! NJLEw4k5BU7jY6S eb. ENDSLATEPACK.
//! ```
//!
//! The payload is `checksum (4 bytes) || version (1 byte) || bincode(slate)`,
//! base58-encoded and split into words of 15 characters. The checksum is
//! the first four bytes of `SHA256(SHA256(version || body))`.

use sha2::{Digest, Sha256};

use crate::error::WalletError;
use crate::slate::Slate;

const HEADER: &str = "BEGINSLATEPACK.";
const FOOTER: &str = "ENDSLATEPACK.";

/// Armor format version.
pub const SLATEPACK_VERSION: u8 = 1;

const WORD_LEN: usize = 15;
const WORDS_PER_LINE: usize = 200;

/// Upper bound on a slate's binary body. Length prefixes claiming more are
/// rejected before anything is allocated.
pub const MAX_SLATE_BYTES: usize = 1 << 20;

/// Upper bound on armored input, whitespace included.
pub const MAX_ARMOR_LEN: usize = 4 * MAX_SLATE_BYTES;

fn checksum(data: &[u8]) -> [u8; 4] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    let mut out = [0u8; 4];
    out.copy_from_slice(&second[..4]);
    out
}

fn bincode_config() -> impl bincode::config::Config {
    bincode::config::standard().with_limit::<MAX_SLATE_BYTES>()
}

/// Armor a slate.
pub fn encode(slate: &Slate) -> Result<String, WalletError> {
    let body = bincode::encode_to_vec(slate, bincode_config())
        .map_err(|e| WalletError::Serialization(e.to_string()))?;

    let mut versioned = Vec::with_capacity(1 + body.len());
    versioned.push(SLATEPACK_VERSION);
    versioned.extend_from_slice(&body);

    let mut payload = Vec::with_capacity(4 + versioned.len());
    payload.extend_from_slice(&checksum(&versioned));
    payload.extend_from_slice(&versioned);

    let b58 = bs58::encode(payload).into_string();
    let words: Vec<&str> = b58
        .as_bytes()
        .chunks(WORD_LEN)
        .filter_map(|c| std::str::from_utf8(c).ok())
        .collect();
    let lines: Vec<String> = words.chunks(WORDS_PER_LINE).map(|l| l.join(" ")).collect();
    Ok(format!("{HEADER} {}. {FOOTER}", lines.join("\n")))
}

/// Parse armored text back into a slate.
///
/// Whitespace anywhere in the armor is ignored. Input longer than
/// [`MAX_ARMOR_LEN`] is refused unread.
pub fn decode(armored: &str) -> Result<Slate, WalletError> {
    if armored.len() > MAX_ARMOR_LEN {
        return Err(WalletError::InvalidSlate(format!("slatepack exceeds {MAX_ARMOR_LEN} bytes")));
    }
    let compact: String = armored.chars().filter(|c| !c.is_whitespace()).collect();
    let inner = compact
        .strip_prefix(HEADER)
        .and_then(|s| s.strip_suffix(FOOTER))
        .and_then(|s| s.strip_suffix('.'))
        .ok_or_else(|| WalletError::InvalidSlate("missing slatepack framing".into()))?;

    let payload = bs58::decode(inner)
        .into_vec()
        .map_err(|e| WalletError::InvalidSlate(format!("bad slatepack encoding: {e}")))?;
    if payload.len() < 5 {
        return Err(WalletError::InvalidSlate("slatepack too short".into()));
    }

    let (sum, versioned) = payload.split_at(4);
    if checksum(versioned) != sum {
        return Err(WalletError::InvalidSlate("slatepack checksum mismatch".into()));
    }
    if versioned[0] != SLATEPACK_VERSION {
        return Err(WalletError::InvalidSlate(format!("unsupported slatepack version {}", versioned[0])));
    }

    let (slate, read): (Slate, usize) = bincode::decode_from_slice(&versioned[1..], bincode_config())
        .map_err(|e| WalletError::InvalidSlate(format!("bad slate body: {e}")))?;
    if read != versioned.len() - 1 {
        return Err(WalletError::InvalidSlate("trailing bytes after slate".into()));
    }
    Ok(slate)
}

/// Decode armored text to the slate's JSON form.
pub fn decode_to_json(armored: &str) -> Result<String, WalletError> {
    let slate = decode(armored)?;
    serde_json::to_string(&slate).map_err(|e| WalletError::Serialization(e.to_string()))
}
