use airgap_core::{
    AddressBalance, AirgapError, Amount, CryptoEngine, Outpoint, TransactionHandle, UtxoEntry,
};
use async_trait::async_trait;
use bitcoin::bip32::{DerivationPath, Xpriv, Xpub};
use bitcoin::key::CompressedPublicKey;
use bitcoin::secp256k1::{All, Secp256k1};
use bitcoin::{Address, Network, PublicKey};
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;

use crate::config::bitcoin_network;

/// BIP39 seed bytes; never serialized or logged
pub struct WalletSeed([u8; 64]);

impl WalletSeed {
    pub fn new(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Esplora `/address/:address/utxo` item
#[derive(Debug, Deserialize)]
struct EsploraUtxo {
    txid: String,
    vout: u32,
    value: u64,
    #[serde(default)]
    status: EsploraStatus,
}

#[derive(Debug, Default, Deserialize)]
struct EsploraStatus {
    #[serde(default)]
    confirmed: bool,
    block_height: Option<u64>,
}

/// BIP32/BIP84 key derivation with Esplora balance lookup and broadcast
pub struct EsploraEngine {
    client: reqwest::Client,
    base_url: String,
    secp: Secp256k1<All>,
}

impl EsploraEngine {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secp: Secp256k1::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn parse_address(&self, address: &str, network: &str) -> Result<Address, AirgapError> {
        Address::from_str(address)
            .map_err(|e| AirgapError::engine(format!("invalid address {}: {}", address, e)))?
            .require_network(bitcoin_network(network))
            .map_err(|e| AirgapError::engine(format!("address {} on wrong network: {}", address, e)))
    }
}

#[async_trait]
impl CryptoEngine for EsploraEngine {
    type Seed = WalletSeed;
    type Key = Xpriv;

    async fn derive_private_key_at(
        &self,
        seed: &WalletSeed,
        derivation_path: &str,
    ) -> Result<Xpriv, AirgapError> {
        let path = DerivationPath::from_str(derivation_path)
            .map_err(|e| AirgapError::engine(format!("invalid path {}: {}", derivation_path, e)))?;

        // The extended key's network only affects its string encoding
        let master = Xpriv::new_master(Network::Bitcoin, seed.as_bytes())
            .map_err(|e| AirgapError::engine(e.to_string()))?;
        master
            .derive_priv(&self.secp, &path)
            .map_err(|e| AirgapError::engine(e.to_string()))
    }

    async fn public_address_of(&self, key: &Xpriv, network: &str) -> Result<String, AirgapError> {
        let xpub = Xpub::from_priv(&self.secp, key);
        let pubkey = PublicKey::new(xpub.public_key);
        let compressed = CompressedPublicKey::try_from(pubkey)
            .map_err(|e| AirgapError::engine(e.to_string()))?;
        Ok(Address::p2wpkh(&compressed, bitcoin_network(network)).to_string())
    }

    async fn query_balance_and_utxos(
        &self,
        address: &str,
        network: &str,
    ) -> Result<AddressBalance, AirgapError> {
        let parsed = self.parse_address(address, network)?;
        let url = format!("{}/address/{}/utxo", self.base_url, address);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AirgapError::engine(format!("Esplora request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AirgapError::engine(format!(
                "Esplora returned {} for {}",
                response.status(),
                address
            )));
        }

        let items: Vec<EsploraUtxo> = response
            .json()
            .await
            .map_err(|e| AirgapError::engine(format!("invalid Esplora response: {}", e)))?;

        let script_public_key = parsed.script_pubkey().to_hex_string();
        let utxos: Vec<UtxoEntry> = items
            .into_iter()
            .map(|u| UtxoEntry {
                outpoint: Outpoint {
                    transaction_id: u.txid,
                    output_index: u.vout,
                },
                amount: Amount::from(u.value),
                script_public_key: script_public_key.clone(),
                block_daa_score: Amount::from(if u.status.confirmed {
                    u.status.block_height.unwrap_or(0)
                } else {
                    0
                }),
                is_coinbase: false,
                owning_address: address.to_string(),
            })
            .collect();

        let amount: Amount = utxos.iter().map(|u| u.amount).sum();
        log::debug!("{} holds {} in {} UTXO(s)", address, amount, utxos.len());
        Ok(AddressBalance { amount, utxos })
    }

    async fn submit(
        &self,
        transaction: &TransactionHandle,
        rpc_endpoint: &str,
    ) -> Result<String, AirgapError> {
        let tree = transaction.to_transfer_tree();
        let tx_hex = tree
            .get("hex")
            .and_then(Value::as_str)
            .ok_or_else(|| AirgapError::engine("signed transaction carries no 'hex' field"))?;

        let base_url = rpc_endpoint.trim_end_matches('/');
        log::debug!("Broadcasting transaction to: {}/tx", base_url);

        let response = self
            .client
            .post(format!("{}/tx", base_url))
            .body(tx_hex.to_string())
            .send()
            .await
            .map_err(|e| AirgapError::engine(format!("broadcast failed: {}", e)))?;

        if !response.status().is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AirgapError::engine(format!("Broadcast failed: {}", error_text)));
        }

        let txid = response
            .text()
            .await
            .map_err(|e| AirgapError::engine(e.to_string()))?;
        log::info!("Broadcast transaction {}", txid.trim());
        Ok(txid.trim().to_string())
    }
}
