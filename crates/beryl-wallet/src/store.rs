//! On-disk wallet files and the advisory lock.
//!
//! ```text
//! <data_dir>/wallet_data/
//!     wallet.seed    header_len (4 bytes LE) || header_json || encrypt(entropy, password)
//!     wallet.state   encrypt_with_key(state_json, state_key)
//!     wallet.lock    OS advisory lock; holds the pid of the last holder
//! ```
//!
//! The seed header is unencrypted JSON with magic, version and the Argon2
//! parameters used for the payload. State writes go to a temporary file
//! that is renamed over the old one, so a crash never leaves a torn file.
//!
//! The lock is an exclusive `flock`/`LockFileEx` on `wallet.lock`, so the OS
//! drops it when the holding process exits for any reason. The file itself
//! is never removed; a leftover file from a dead process is simply relocked.

use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::encryption::{self, KdfParams};
use crate::error::WalletError;
use crate::keys::Seed;

/// Magic string identifying a beryl seed file.
const SEED_MAGIC: &str = "BERYLSEED";

/// Current seed file format version.
const SEED_VERSION: u32 = 1;

const SEED_FILE: &str = "wallet.seed";
const STATE_FILE: &str = "wallet.state";
const STATE_TMP_FILE: &str = "wallet.state.tmp";
const LOCK_FILE: &str = "wallet.lock";

/// Unencrypted seed file header.
#[derive(Serialize, Deserialize)]
struct SeedFileHeader {
    magic: String,
    version: u32,
    kdf: KdfParams,
}

/// The files of one wallet directory.
#[derive(Debug, Clone)]
pub struct WalletStore {
    dir: PathBuf,
}

impl WalletStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn seed_path(&self) -> PathBuf {
        self.dir.join(SEED_FILE)
    }

    fn state_path(&self) -> PathBuf {
        self.dir.join(STATE_FILE)
    }

    pub fn seed_exists(&self) -> bool {
        self.seed_path().exists()
    }

    /// Write a new seed file. Fails if one already exists.
    pub fn create_seed(&self, seed: &Seed, password: &[u8], kdf: &KdfParams) -> Result<(), WalletError> {
        fs::create_dir_all(&self.dir)?;

        let header = SeedFileHeader { magic: SEED_MAGIC.to_string(), version: SEED_VERSION, kdf: *kdf };
        let header_json = serde_json::to_vec(&header).map_err(|e| WalletError::Serialization(e.to_string()))?;
        let encrypted = encryption::encrypt(seed.as_bytes(), password, kdf)?;

        let mut file_data = Vec::with_capacity(4 + header_json.len() + encrypted.len());
        file_data.extend_from_slice(&(header_json.len() as u32).to_le_bytes());
        file_data.extend_from_slice(&header_json);
        file_data.extend_from_slice(&encrypted);

        let mut file = match OpenOptions::new().write(true).create_new(true).open(self.seed_path()) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(WalletError::WalletExists(self.dir.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(&file_data)?;
        file.sync_all()?;
        debug!(dir = %self.dir.display(), "seed file written");
        Ok(())
    }

    /// Decrypt the seed file.
    pub fn load_seed(&self, password: &[u8]) -> Result<Seed, WalletError> {
        let file_data = match fs::read(self.seed_path()) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(WalletError::WalletNotFound(self.dir.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let len_bytes: [u8; 4] = file_data
            .get(..4)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| WalletError::CorruptedFile("file too short".into()))?;
        let header_len = u32::from_le_bytes(len_bytes) as usize;
        let header_json = file_data
            .get(4..4 + header_len)
            .ok_or_else(|| WalletError::CorruptedFile("header truncated".into()))?;

        let header: SeedFileHeader = serde_json::from_slice(header_json)
            .map_err(|e| WalletError::CorruptedFile(format!("invalid header: {e}")))?;
        if header.magic != SEED_MAGIC {
            return Err(WalletError::CorruptedFile("invalid magic bytes".into()));
        }
        if header.version != SEED_VERSION {
            return Err(WalletError::CorruptedFile(format!("unsupported version: {}", header.version)));
        }

        let entropy = Zeroizing::new(encryption::decrypt(&file_data[4 + header_len..], password, &header.kdf)?);
        Seed::from_entropy(&entropy).map_err(|_| WalletError::CorruptedFile("invalid seed length".into()))
    }

    /// Atomically replace the state file.
    pub fn save_state<T: Serialize>(&self, state: &T, key: &[u8; 32]) -> Result<(), WalletError> {
        let json = Zeroizing::new(serde_json::to_vec(state).map_err(|e| WalletError::Serialization(e.to_string()))?);
        let sealed = encryption::encrypt_with_key(&json, key)?;

        let tmp = self.dir.join(STATE_TMP_FILE);
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&sealed)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, self.state_path())?;
        Ok(())
    }

    /// Read the state file. `None` if the wallet has never saved state.
    pub fn load_state<T: DeserializeOwned>(&self, key: &[u8; 32]) -> Result<Option<T>, WalletError> {
        let sealed = match fs::read(self.state_path()) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let json = Zeroizing::new(encryption::decrypt_with_key(&sealed, key)?);
        serde_json::from_slice(&json)
            .map(Some)
            .map_err(|e| WalletError::CorruptedFile(format!("invalid state: {e}")))
    }

    /// Take the advisory lock for this directory.
    pub fn acquire_lock(&self) -> Result<WalletLock, WalletError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(LOCK_FILE);
        let mut file = OpenOptions::new().read(true).write(true).create(true).truncate(false).open(&path)?;

        if let Err(e) = FileExt::try_lock_exclusive(&file) {
            if e.raw_os_error() != fs2::lock_contended_error().raw_os_error() {
                return Err(e.into());
            }
            let mut holder = String::new();
            let _ = file.read_to_string(&mut holder);
            return Err(WalletError::WalletLocked(format!(
                "{} (held by pid {})",
                self.dir.display(),
                holder.trim()
            )));
        }

        // Record our pid for the error message of the next contender. A
        // failure here drops `file`, which releases the lock again.
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        write!(file, "{}", std::process::id())?;
        file.sync_all()?;
        debug!(path = %path.display(), "wallet lock acquired");
        Ok(WalletLock { file, path })
    }
}

/// Held while a session has the wallet open. Dropping it releases the lock.
#[derive(Debug)]
pub struct WalletLock {
    file: File,
    path: PathBuf,
}

impl Drop for WalletLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(path = %self.path.display(), error = %e, "failed to release wallet lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, WalletStore) {
        let dir = TempDir::new().unwrap();
        let store = WalletStore::new(dir.path().join("wallet_data"));
        (dir, store)
    }

    fn seed() -> Seed {
        Seed::from_entropy(&[7u8; 32]).unwrap()
    }

    #[test]
    fn seed_roundtrip() {
        let (_dir, store) = store();
        store.create_seed(&seed(), b"pw", &KdfParams::minimal()).unwrap();
        assert!(store.seed_exists());
        assert_eq!(store.load_seed(b"pw").unwrap().as_bytes(), seed().as_bytes());
    }

    #[test]
    fn wrong_password_is_invalid_credentials() {
        let (_dir, store) = store();
        store.create_seed(&seed(), b"pw", &KdfParams::minimal()).unwrap();
        assert_eq!(store.load_seed(b"nope").unwrap_err(), WalletError::InvalidCredentials);
    }

    #[test]
    fn second_create_fails() {
        let (_dir, store) = store();
        store.create_seed(&seed(), b"pw", &KdfParams::minimal()).unwrap();
        let err = store.create_seed(&seed(), b"pw", &KdfParams::minimal()).unwrap_err();
        assert!(matches!(err, WalletError::WalletExists(_)));
    }

    #[test]
    fn missing_seed_is_not_found() {
        let (_dir, store) = store();
        assert!(matches!(store.load_seed(b"pw").unwrap_err(), WalletError::WalletNotFound(_)));
    }

    #[test]
    fn corrupted_seed_file() {
        let (_dir, store) = store();
        fs::create_dir_all(store.dir()).unwrap();
        fs::write(store.dir().join(SEED_FILE), b"garbage").unwrap();
        assert!(matches!(store.load_seed(b"pw").unwrap_err(), WalletError::CorruptedFile(_)));

        fs::write(store.dir().join(SEED_FILE), [0u8; 2]).unwrap();
        assert!(matches!(store.load_seed(b"pw").unwrap_err(), WalletError::CorruptedFile(_)));
    }

    #[test]
    fn state_roundtrip_and_overwrite() {
        let (_dir, store) = store();
        fs::create_dir_all(store.dir()).unwrap();
        let key = [3u8; 32];
        assert_eq!(store.load_state::<Vec<u32>>(&key).unwrap(), None);

        store.save_state(&vec![1u32, 2, 3], &key).unwrap();
        store.save_state(&vec![4u32], &key).unwrap();
        assert_eq!(store.load_state::<Vec<u32>>(&key).unwrap(), Some(vec![4]));
        assert!(!store.dir().join(STATE_TMP_FILE).exists());
    }

    #[test]
    fn state_with_wrong_key_is_corrupted() {
        let (_dir, store) = store();
        fs::create_dir_all(store.dir()).unwrap();
        store.save_state(&vec![1u32], &[3u8; 32]).unwrap();
        let err = store.load_state::<Vec<u32>>(&[4u8; 32]).unwrap_err();
        assert!(matches!(err, WalletError::CorruptedFile(_)));
    }

    #[test]
    fn lock_is_exclusive_until_dropped() {
        let (_dir, store) = store();
        let lock = store.acquire_lock().unwrap();
        assert!(matches!(store.acquire_lock().unwrap_err(), WalletError::WalletLocked(_)));
        drop(lock);
        store.acquire_lock().unwrap();
    }

    #[test]
    fn lock_reports_holder_pid() {
        let (_dir, store) = store();
        let _lock = store.acquire_lock().unwrap();
        let WalletError::WalletLocked(msg) = store.acquire_lock().unwrap_err() else {
            panic!("expected WalletLocked");
        };
        assert!(msg.ends_with(&format!("(held by pid {})", std::process::id())), "{msg}");
    }

    #[test]
    fn leftover_lock_file_from_dead_process_is_reclaimed() {
        let (_dir, store) = store();
        // What a killed process leaves behind: the file, but no OS lock.
        fs::create_dir_all(store.dir()).unwrap();
        fs::write(store.dir().join(LOCK_FILE), "4294967295").unwrap();

        let lock = store.acquire_lock().unwrap();
        let recorded = fs::read_to_string(store.dir().join(LOCK_FILE)).unwrap();
        assert_eq!(recorded, std::process::id().to_string());
        drop(lock);
        assert!(store.dir().join(LOCK_FILE).exists());
        store.acquire_lock().unwrap();
    }
}
