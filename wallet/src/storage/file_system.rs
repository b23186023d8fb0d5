use airgap_core::{load_ledger_state, save_ledger_state, AddressLedgerState, FileVault, Vault};
use bip39::Mnemonic;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::keys::KeyManager;
use crate::error::ServiceError;

const MNEMONIC_KEY: &str = "mnemonic";
const METADATA_KEY: &str = "metadata.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    pub name: String,
    pub network: String,
    pub fingerprint: String,
    pub created_at: DateTime<Utc>,
}

/// On-disk wallet: one vault directory per wallet name
#[derive(Clone)]
pub struct Storage {
    vault: FileVault,
}

impl Storage {
    /// Open the vault for `name` under `base_path`, creating it if needed
    pub fn open(base_path: impl Into<PathBuf>, name: &str) -> Result<Self, ServiceError> {
        let vault = FileVault::open(base_path.into().join(name))?;
        Ok(Self { vault })
    }

    pub fn wallet_dir(&self) -> &Path {
        self.vault.base_dir()
    }

    /// Save wallet mnemonic phrase to the vault
    pub fn save_mnemonic(&self, mnemonic: &Mnemonic) -> Result<(), ServiceError> {
        self.vault.put(MNEMONIC_KEY, &mnemonic.to_string())?;
        Ok(())
    }

    /// Load wallet mnemonic phrase from the vault
    pub fn load_mnemonic(&self) -> Result<Option<Mnemonic>, ServiceError> {
        match self.vault.get(MNEMONIC_KEY)? {
            Some(words) => KeyManager::parse(&words).map(Some),
            None => Ok(None),
        }
    }

    pub fn save_metadata(&self, meta: &Metadata) -> Result<(), ServiceError> {
        let json = serde_json::to_string_pretty(meta).map_err(airgap_core::StorageError::from)?;
        self.vault.put(METADATA_KEY, &json)?;
        Ok(())
    }

    pub fn load_metadata(&self) -> Result<Option<Metadata>, ServiceError> {
        match self.vault.get(METADATA_KEY)? {
            Some(json) => {
                let meta = serde_json::from_str(&json).map_err(airgap_core::StorageError::from)?;
                Ok(Some(meta))
            }
            None => Ok(None),
        }
    }

    /// Save the address ledger so indices survive restarts
    pub fn save_ledger(&self, state: &AddressLedgerState) -> Result<(), ServiceError> {
        save_ledger_state(&self.vault, state)?;
        Ok(())
    }

    /// Load the address ledger, or `None` for a wallet that never saved one
    pub fn load_ledger(&self) -> Result<Option<AddressLedgerState>, ServiceError> {
        Ok(load_ledger_state(&self.vault)?)
    }
}
