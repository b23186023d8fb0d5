//! Common test utilities for airgap-core integration tests
//!
//! This module provides:
//! - A deterministic in-memory `CryptoEngine` with scriptable balances and failures
//! - Ledger construction helpers
//! - Logger setup

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use airgap_core::{
    AddressBalance, AddressKind, AddressLedger, AirgapError, Amount, CryptoEngine, Outpoint,
    TransactionHandle, UtxoEntry, WalletConfig,
};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn test_config() -> WalletConfig {
    WalletConfig::default()
}

/// Address the mock engine produces for `(kind, index)` under the default account
pub fn mock_address(kind: AddressKind, index: u32) -> String {
    format!("mock:{}/{}/{}", test_config().account_path, kind.chain(), index)
}

/// Deterministic engine: the address of a key is `mock:<derivation path>`
#[derive(Default)]
pub struct MockEngine {
    balances: Mutex<HashMap<String, AddressBalance>>,
    failing_paths: Mutex<HashSet<String>>,
    failing_addresses: Mutex<HashSet<String>>,
    derivations: AtomicUsize,
    queries: AtomicUsize,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Give `address` a balance backed by one UTXO
    pub fn fund(&self, address: &str, amount: u64) {
        let utxo = UtxoEntry {
            outpoint: Outpoint {
                transaction_id: format!("tx-{}", address),
                output_index: 0,
            },
            amount: Amount::from(amount),
            script_public_key: format!("spk-{}", address),
            block_daa_score: Amount::from(100u64),
            is_coinbase: false,
            owning_address: address.to_string(),
        };
        self.balances.lock().unwrap().insert(
            address.to_string(),
            AddressBalance {
                amount: Amount::from(amount),
                utxos: vec![utxo],
            },
        );
    }

    pub fn fail_derivation_at(&self, path: &str) {
        self.failing_paths.lock().unwrap().insert(path.to_string());
    }

    pub fn fail_queries_for(&self, address: &str) {
        self.failing_addresses.lock().unwrap().insert(address.to_string());
    }

    pub fn derivation_count(&self) -> usize {
        self.derivations.load(Ordering::SeqCst)
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CryptoEngine for MockEngine {
    type Seed = ();
    type Key = String;

    async fn derive_private_key_at(&self, _seed: &(), path: &str) -> Result<String, AirgapError> {
        // Yield so concurrent allocations get a chance to interleave
        tokio::task::yield_now().await;
        self.derivations.fetch_add(1, Ordering::SeqCst);
        if self.failing_paths.lock().unwrap().contains(path) {
            return Err(AirgapError::engine(format!("cannot derive {}", path)));
        }
        Ok(path.to_string())
    }

    async fn public_address_of(&self, key: &String, _network: &str) -> Result<String, AirgapError> {
        Ok(format!("mock:{}", key))
    }

    async fn query_balance_and_utxos(
        &self,
        address: &str,
        _network: &str,
    ) -> Result<AddressBalance, AirgapError> {
        tokio::task::yield_now().await;
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.failing_addresses.lock().unwrap().contains(address) {
            return Err(AirgapError::engine(format!("node unreachable for {}", address)));
        }
        Ok(self
            .balances
            .lock()
            .unwrap()
            .get(address)
            .cloned()
            .unwrap_or_default())
    }

    async fn submit(
        &self,
        transaction: &TransactionHandle,
        _rpc_endpoint: &str,
    ) -> Result<String, AirgapError> {
        transaction
            .transaction_id()
            .ok_or_else(|| AirgapError::engine("transaction has no id"))
    }
}

pub fn new_ledger(engine: Arc<MockEngine>) -> AddressLedger<MockEngine> {
    AddressLedger::new(engine, (), &test_config())
}
