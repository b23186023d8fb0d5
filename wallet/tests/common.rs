//! Shared fixtures for wallet service tests
//!
//! - A scriptable in-memory `CryptoEngine`
//! - App state over a temporary wallet directory
//! - JSON request helpers for driving the router

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tower::ServiceExt;

use airgap_core::{
    AddressBalance, AddressKind, AirgapError, Amount, CryptoEngine, Outpoint, TransactionHandle,
    UtxoEntry,
};
use wallet::api::{build_router, AppState};
use wallet::config::ServiceConfig;
use wallet::storage::Storage;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn test_config(dir: &Path) -> ServiceConfig {
    ServiceConfig {
        wallet_dir: dir.to_path_buf(),
        wallet_name: "test-wallet".to_string(),
        ..ServiceConfig::default()
    }
}

pub fn mock_address(kind: AddressKind, index: u32) -> String {
    let config = ServiceConfig::default();
    format!("mock:{}/{}/{}", config.wallet.account_path, kind.chain(), index)
}

/// Engine whose address for a key is `mock:<derivation path>`
pub struct MockEngine {
    balances: Mutex<HashMap<String, AddressBalance>>,
    submitted: Mutex<Vec<(String, String)>>,
    // Balance queries wait while this is false
    gate: watch::Sender<bool>,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self {
            balances: Mutex::default(),
            submitted: Mutex::default(),
            gate: watch::channel(true).0,
        }
    }
}

impl MockEngine {
    /// Hold every balance query until `open_gate`
    pub fn close_gate(&self) {
        self.gate.send_replace(false);
    }

    pub fn open_gate(&self) {
        self.gate.send_replace(true);
    }

    pub fn fund(&self, address: &str, amount: u64) {
        let utxo = UtxoEntry {
            outpoint: Outpoint {
                transaction_id: format!("tx-{}", address),
                output_index: 0,
            },
            amount: Amount::from(amount),
            script_public_key: format!("spk-{}", address),
            block_daa_score: Amount::from(800_000u64),
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

    /// `(transaction id, endpoint)` of every submission
    pub fn submitted(&self) -> Vec<(String, String)> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl CryptoEngine for MockEngine {
    type Seed = ();
    type Key = String;

    async fn derive_private_key_at(&self, _seed: &(), path: &str) -> Result<String, AirgapError> {
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
        let _ = self.gate.subscribe().wait_for(|open| *open).await;
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
        rpc_endpoint: &str,
    ) -> Result<String, AirgapError> {
        let txid = transaction
            .transaction_id()
            .ok_or_else(|| AirgapError::engine("transaction has no id"))?;
        self.submitted
            .lock()
            .unwrap()
            .push((txid.clone(), rpc_endpoint.to_string()));
        Ok(txid)
    }
}

/// State over a wallet directory in `dir`, restoring any saved ledger
pub fn test_state(dir: &Path, engine: Arc<MockEngine>) -> Arc<AppState<MockEngine>> {
    let config = test_config(dir);
    let storage = Storage::open(&config.wallet_dir, &config.wallet_name).unwrap();
    Arc::new(AppState::new(config, engine, (), storage).unwrap())
}

pub fn test_router(state: Arc<AppState<MockEngine>>) -> Router {
    build_router(state)
}

/// Send one request and return the status with the parsed JSON body
pub async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

pub async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, Method::GET, uri, None).await
}

pub async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(app, Method::POST, uri, Some(body)).await
}

pub async fn post_empty(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, Method::POST, uri, None).await
}
