use airgap_core::{
    AddressKind, AddressLedger, CancelToken, CryptoEngine, ScanSession, TransferEnvelope,
    UtxoAggregator,
};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::ServiceConfig;
use crate::engine::EsploraEngine;
use crate::error::ServiceError;
use crate::storage::{KeyManager, Metadata, Storage};

/// A discovery scan in flight and the token that stops it
#[derive(Clone)]
pub struct RunningDiscovery {
    pub kind: AddressKind,
    pub token: CancelToken,
}

/// Everything a request handler needs, shared behind an `Arc`
pub struct AppState<E: CryptoEngine> {
    pub config: ServiceConfig,
    pub engine: Arc<E>,
    pub ledger: Arc<AddressLedger<E>>,
    pub aggregator: UtxoAggregator<E>,
    pub storage: Storage,
    pub scan: Mutex<ScanSession>,
    pub discovery: Mutex<Option<RunningDiscovery>>,
    /// Watch-only `extended-public-key` export of the account, when keys are loaded
    pub account_xpub: Option<TransferEnvelope>,
}

impl<E: CryptoEngine> AppState<E> {
    /// Build state around an engine, restoring the persisted ledger if there is one
    pub fn new(
        config: ServiceConfig,
        engine: Arc<E>,
        seed: E::Seed,
        storage: Storage,
    ) -> Result<Self, ServiceError> {
        let ledger = match storage.load_ledger()? {
            Some(state) => AddressLedger::restore(engine.clone(), seed, &config.wallet, state)?,
            None => {
                log::info!("No saved ledger, starting empty");
                AddressLedger::new(engine.clone(), seed, &config.wallet)
            }
        };
        let ledger = Arc::new(ledger);

        Ok(Self {
            aggregator: UtxoAggregator::new(ledger.clone()),
            config,
            engine,
            ledger,
            storage,
            scan: Mutex::new(ScanSession::new()),
            discovery: Mutex::new(None),
            account_xpub: None,
        })
    }

    /// Write the current ledger to the vault
    pub async fn persist(&self) -> Result<(), ServiceError> {
        let snapshot = self.ledger.snapshot().await;
        self.storage.save_ledger(&snapshot)
    }
}

impl AppState<EsploraEngine> {
    /// Open the configured wallet, generating a mnemonic on first start
    pub fn open(config: ServiceConfig) -> Result<Self, ServiceError> {
        let storage = Storage::open(&config.wallet_dir, &config.wallet_name)?;
        log::info!("📁 Wallet vault: {}", storage.wallet_dir().display());

        let mnemonic = match storage.load_mnemonic()? {
            Some(mnemonic) => mnemonic,
            None => {
                log::info!("✨ Creating wallet '{}'", config.wallet_name);
                let mnemonic = KeyManager::generate()?;
                storage.save_mnemonic(&mnemonic)?;
                mnemonic
            }
        };

        let keys =
            KeyManager::derive_keys(&mnemonic, config.bitcoin_network, &config.wallet.account_path)?;
        if storage.load_metadata()?.is_none() {
            storage.save_metadata(&Metadata {
                name: config.wallet_name.clone(),
                network: config.wallet.network.clone(),
                fingerprint: keys.fingerprint.clone(),
                created_at: Utc::now(),
            })?;
        }
        log::info!(
            "🔑 Wallet '{}' fingerprint {} account {}",
            config.wallet_name,
            keys.fingerprint,
            config.wallet.account_path
        );

        let account_xpub = keys.xpub_envelope()?;
        let engine = Arc::new(EsploraEngine::new(config.esplora_url.clone()));
        let mut state = Self::new(config, engine, keys.seed, storage)?;
        state.account_xpub = Some(account_xpub);
        Ok(state)
    }
}

