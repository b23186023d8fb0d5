//! Vault-backed persistence
//!
//! The vault is an opaque string key/value store. Ledger state is stored
//! under a single key as JSON and re-validated on load.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{AirgapError, StorageError};
use crate::ledger::AddressLedgerState;

/// Vault key holding the serialized address ledger
pub const LEDGER_STATE_KEY: &str = "ledger-state";

pub trait Vault: Send + Sync {
    fn put(&self, key: &str, value: &str) -> Result<(), StorageError>;

    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Returns `true` if the key existed
    fn delete(&self, key: &str) -> Result<bool, StorageError>;

    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

/// Vault storing each key as one file under a base directory
#[derive(Clone, Debug)]
pub struct FileVault {
    base_path: PathBuf,
}

impl FileVault {
    /// Open (and create if needed) a vault rooted at `base_path`
    pub fn open(base_path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_path
    }

    fn key_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.base_path.join(key))
    }
}

impl Vault for FileVault {
    fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.key_path(key)?;
        let tmp = self.base_path.join(format!(".{}.tmp", key));
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.key_path(key)?;
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let path = self.key_path(key)?;
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(path)?;
        Ok(true)
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.base_path)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if !name.starts_with('.') {
                    keys.push(name.to_string());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

/// In-process vault, mainly for tests and ephemeral wallets
#[derive(Debug, Default)]
pub struct MemoryVault {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Vault for MemoryVault {
    fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.lock().get(key).cloned())
    }

    fn delete(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.lock().remove(key).is_some())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.lock().keys().cloned().collect())
    }
}

pub fn save_ledger_state<V: Vault + ?Sized>(
    vault: &V,
    state: &AddressLedgerState,
) -> Result<(), AirgapError> {
    let json = serde_json::to_string_pretty(state).map_err(StorageError::from)?;
    vault.put(LEDGER_STATE_KEY, &json)?;
    log::debug!(
        "Saved ledger state ({} receive, {} change)",
        state.receive_index,
        state.change_index
    );
    Ok(())
}

/// `Ok(None)` when no ledger has been saved yet
pub fn load_ledger_state<V: Vault + ?Sized>(vault: &V) -> Result<Option<AddressLedgerState>, AirgapError> {
    let Some(json) = vault.get(LEDGER_STATE_KEY)? else {
        return Ok(None);
    };
    let state: AddressLedgerState = serde_json::from_str(&json).map_err(StorageError::from)?;
    state.validate()?;
    Ok(Some(state))
}
