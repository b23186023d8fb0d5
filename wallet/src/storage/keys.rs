use airgap_core::{build_transfer_envelope, PayloadKind, TransferEnvelope};
use bip39::Mnemonic;
use bitcoin::bip32::{DerivationPath, Xpriv, Xpub};
use bitcoin::secp256k1::rand;
use bitcoin::secp256k1::Secp256k1;
use bitcoin::Network;
use serde_json::json;
use std::str::FromStr;

use crate::engine::WalletSeed;
use crate::error::ServiceError;

pub struct KeyManager;

impl KeyManager {
    /// Generate a new random 12-word mnemonic
    pub fn generate() -> Result<Mnemonic, ServiceError> {
        let entropy = rand::random::<[u8; 16]>();

        Mnemonic::from_entropy(&entropy).map_err(|e| ServiceError::InvalidMnemonic(e.to_string()))
    }

    /// Parse an existing mnemonic phrase
    pub fn parse(words: &str) -> Result<Mnemonic, ServiceError> {
        Mnemonic::parse(words.trim()).map_err(|e| ServiceError::InvalidMnemonic(e.to_string()))
    }

    /// Derive the seed and account-level public key from a mnemonic
    pub fn derive_keys(
        mnemonic: &Mnemonic,
        network: Network,
        account_path: &str,
    ) -> Result<WalletKeys, ServiceError> {
        let secp = Secp256k1::new();
        let seed = mnemonic.to_seed("");

        let master_key = Xpriv::new_master(network, &seed)
            .map_err(|e| ServiceError::Internal(e.to_string()))?;
        let fingerprint = master_key.fingerprint(&secp);

        let derivation_path = DerivationPath::from_str(account_path)
            .map_err(|e| ServiceError::InvalidInput(format!("account path: {}", e)))?;
        let account_key = master_key
            .derive_priv(&secp, &derivation_path)
            .map_err(|e| ServiceError::Internal(e.to_string()))?;

        Ok(WalletKeys {
            seed: WalletSeed::new(seed),
            account_xpub: Xpub::from_priv(&secp, &account_key),
            fingerprint: format!("{:08x}", fingerprint),
        })
    }
}

pub struct WalletKeys {
    pub seed: WalletSeed,
    pub account_xpub: Xpub,
    pub fingerprint: String,
}

impl WalletKeys {
    /// Account xpub as an `extended-public-key` payload for the watch-only side
    pub fn xpub_envelope(&self) -> Result<TransferEnvelope, ServiceError> {
        let envelope = build_transfer_envelope(
            json!({
                "xpub": self.account_xpub.to_string(),
                "fingerprint": self.fingerprint,
            }),
            PayloadKind::ExtendedPublicKey,
        )?;
        Ok(envelope)
    }
}
