/// HTTP API tests
///
/// Drives the router in-process against a mock engine and a temporary
/// wallet directory. No network access is needed.
mod common;

use axum::http::StatusCode;
use common::*;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use airgap_core::AddressKind;
use bitcoin::Network;
use wallet::api::{build_router, AppState};
use wallet::storage::{KeyManager, Storage};

fn signed_transaction(from: &str) -> Value {
    json!({
        "transactionId": "tx-abc",
        "fromAddress": from,
        "toAddress": "mock:elsewhere",
        "amount": "1500",
        "hex": "0200000001aa",
    })
}

async fn split_frames(app: &axum::Router, max_chunk_bytes: usize) -> Vec<String> {
    let (status, body) = post(
        app,
        "/api/transfer/split",
        json!({
            "kind": "signed-transaction",
            "payload": signed_transaction("mock:sender"),
            "maxChunkBytes": max_chunk_bytes,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    serde_json::from_value(body["frames"].clone()).unwrap()
}

#[tokio::test]
async fn test_derive_next_allocates_in_order() {
    init_logger();
    let dir = TempDir::new().unwrap();
    let app = test_router(test_state(dir.path(), Arc::new(MockEngine::default())));

    let (status, first) = post_empty(&app, "/api/addresses/next/receive").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["index"], 0);
    assert_eq!(first["address"], mock_address(AddressKind::Receive, 0));
    assert_eq!(first["derivationPath"], "m/84'/1'/0'/0/0");

    let (_, second) = post_empty(&app, "/api/addresses/next/receive").await;
    assert_eq!(second["index"], 1);

    let (_, change) = post_empty(&app, "/api/addresses/next/change").await;
    assert_eq!(change["index"], 0);
    assert_eq!(change["kind"], "change");

    let (status, all) = get(&app, "/api/addresses").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_unknown_kind_is_bad_request() {
    let dir = TempDir::new().unwrap();
    let app = test_router(test_state(dir.path(), Arc::new(MockEngine::default())));

    let (status, body) = post_empty(&app, "/api/addresses/next/savings").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("savings"));
    assert!(body["remediation"].is_string());
}

#[tokio::test]
async fn test_mark_used_then_fresh_rotates() {
    let dir = TempDir::new().unwrap();
    let app = test_router(test_state(dir.path(), Arc::new(MockEngine::default())));

    post_empty(&app, "/api/addresses/next/receive").await;

    // Unused and unfunded: keep it
    let (status, body) = post_empty(&app, "/api/addresses/fresh").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rotated"], false);
    assert_eq!(body["current"]["index"], 0);

    let address = mock_address(AddressKind::Receive, 0);
    let (_, marked) = post(&app, "/api/addresses/used", json!({ "address": address })).await;
    assert_eq!(marked["known"], true);

    let (_, body) = post_empty(&app, "/api/addresses/fresh").await;
    assert_eq!(body["rotated"], true);
    assert_eq!(body["current"]["index"], 1);

    let (_, advice) = get(&app, "/api/advice").await;
    assert_eq!(advice["receive"]["generateNew"], false);
}

#[tokio::test]
async fn test_mark_used_unknown_address() {
    let dir = TempDir::new().unwrap();
    let app = test_router(test_state(dir.path(), Arc::new(MockEngine::default())));

    let (status, body) = post(&app, "/api/addresses/used", json!({ "address": "mock:stranger" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["known"], false);
}

#[tokio::test]
async fn test_discover_commits_up_to_last_funded() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(MockEngine::default());
    engine.fund(&mock_address(AddressKind::Receive, 0), 1_000);
    engine.fund(&mock_address(AddressKind::Receive, 2), 2_000);
    let app = test_router(test_state(dir.path(), engine));

    let (status, report) = post(
        &app,
        "/api/discover",
        json!({ "kind": "receive", "gapLimit": 3 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["cancelled"], false);
    let funded: Vec<u64> = report["funded"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["index"].as_u64().unwrap())
        .collect();
    assert_eq!(funded, vec![0, 2]);

    let (_, all) = get(&app, "/api/addresses").await;
    assert_eq!(all.as_array().unwrap().len(), 3);

    let (_, balance) = get(&app, "/api/balance").await;
    assert_eq!(balance["totalBalance"], "3000");
    assert_eq!(balance["utxos"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_dropped_discover_request_frees_the_slot() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(MockEngine::default());
    engine.close_gate();
    let app = test_router(test_state(dir.path(), engine.clone()));

    // The client gives up while the scan is blocked on the indexer
    let abandoned = tokio::time::timeout(
        Duration::from_millis(100),
        post(&app, "/api/discover", json!({ "kind": "receive", "gapLimit": 3 })),
    )
    .await;
    assert!(abandoned.is_err());

    let (status, body) = post(&app, "/api/discover", json!({ "kind": "change" })).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("receive"));

    let (_, body) = post_empty(&app, "/api/discover/cancel").await;
    assert_eq!(body["cancelled"], true);
    engine.open_gate();

    let mut status = StatusCode::CONFLICT;
    for _ in 0..50 {
        (status, _) = post(&app, "/api/discover", json!({ "kind": "change", "gapLimit": 1 })).await;
        if status != StatusCode::CONFLICT {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_account_xpub_export() {
    let dir = TempDir::new().unwrap();
    let app = test_router(test_state(dir.path(), Arc::new(MockEngine::default())));
    let (status, _) = get(&app, "/api/account/xpub").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let mnemonic = KeyManager::parse(
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about",
    )
    .unwrap();
    let keys = KeyManager::derive_keys(&mnemonic, Network::Bitcoin, "m/84'/0'/0'").unwrap();
    let config = test_config(dir.path());
    let storage = Storage::open(&config.wallet_dir, "keyed").unwrap();
    let mut state = AppState::new(config, Arc::new(MockEngine::default()), (), storage).unwrap();
    state.account_xpub = Some(keys.xpub_envelope().unwrap());
    let app = build_router(Arc::new(state));

    let (status, body) = get(&app, "/api/account/xpub").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["kind"], "extended-public-key");
    assert_eq!(body["xpub"], keys.account_xpub.to_string());
    assert_eq!(body["fingerprint"], "73c5da0a");
}

#[tokio::test]
async fn test_cancel_without_discovery() {
    let dir = TempDir::new().unwrap();
    let app = test_router(test_state(dir.path(), Arc::new(MockEngine::default())));

    let (status, body) = post_empty(&app, "/api/discover/cancel").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cancelled"], false);
}

#[tokio::test]
async fn test_refresh_applies_balance_and_rotates() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(MockEngine::default());
    let app = test_router(test_state(dir.path(), engine.clone()));

    post_empty(&app, "/api/addresses/next/receive").await;
    engine.fund(&mock_address(AddressKind::Receive, 0), 5_000);

    let (status, body) = post_empty(&app, "/api/refresh").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalBalance"], "5000");
    assert_eq!(body["freshAddress"]["index"], 1);
}

#[tokio::test]
async fn test_ledger_survives_restart() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(MockEngine::default());

    {
        let app = test_router(test_state(dir.path(), engine.clone()));
        post_empty(&app, "/api/addresses/next/receive").await;
        post_empty(&app, "/api/addresses/next/receive").await;
    }

    let app = test_router(test_state(dir.path(), engine));
    let (_, all) = get(&app, "/api/addresses").await;
    assert_eq!(all.as_array().unwrap().len(), 2);

    let (_, next) = post_empty(&app, "/api/addresses/next/receive").await;
    assert_eq!(next["index"], 2);
}

#[tokio::test]
async fn test_split_then_scan_out_of_order() {
    let dir = TempDir::new().unwrap();
    let app = test_router(test_state(dir.path(), Arc::new(MockEngine::default())));

    let frames = split_frames(&app, 40).await;
    assert!(frames.len() > 1);

    let mut last = Value::Null;
    for frame in frames.iter().rev() {
        let (status, signal) = post(&app, "/api/scan/offer", json!({ "frame": frame })).await;
        assert_eq!(status, StatusCode::OK);
        last = signal;
    }
    assert_eq!(last["signal"], "completed");
    assert_eq!(last["totalParts"], frames.len());

    let (_, progress) = get(&app, "/api/scan/progress").await;
    assert_eq!(progress["state"]["state"], "completed");
    assert_eq!(progress["missing"].as_array().unwrap().len(), 0);

    let (status, envelope) = post_empty(&app, "/api/scan/recombine").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(envelope["kind"], "signed-transaction");
    assert_eq!(envelope["transactionId"], "tx-abc");
    assert_eq!(envelope["version"], 1);

    let (_, progress) = get(&app, "/api/scan/progress").await;
    assert_eq!(progress["state"]["state"], "idle");
}

#[tokio::test]
async fn test_scan_flags_foreign_group_and_duplicates() {
    let dir = TempDir::new().unwrap();
    let app = test_router(test_state(dir.path(), Arc::new(MockEngine::default())));

    let first = split_frames(&app, 40).await;
    let other = split_frames(&app, 40).await;

    let (_, signal) = post(&app, "/api/scan/offer", json!({ "frame": first[0] })).await;
    assert_eq!(signal["signal"], "partAccepted");

    let (_, signal) = post(&app, "/api/scan/offer", json!({ "frame": first[0] })).await;
    assert_eq!(signal["signal"], "duplicatePart");

    let (_, signal) = post(&app, "/api/scan/offer", json!({ "frame": other[0] })).await;
    assert_eq!(signal["signal"], "foreignGroup");

    let (status, body) = post_empty(&app, "/api/scan/recombine").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["remediation"].as_str().unwrap().contains("missing parts"));

    let (_, progress) = post_empty(&app, "/api/scan/reset").await;
    assert_eq!(progress["state"]["state"], "idle");
}

#[tokio::test]
async fn test_scan_rejects_garbage() {
    let dir = TempDir::new().unwrap();
    let app = test_router(test_state(dir.path(), Arc::new(MockEngine::default())));

    let (status, body) = post(&app, "/api/scan/offer", json!({ "frame": "not a wallet code" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Malformed payload"));
}

#[tokio::test]
async fn test_recombine_reports_missing_part() {
    let dir = TempDir::new().unwrap();
    let app = test_router(test_state(dir.path(), Arc::new(MockEngine::default())));

    let frames = split_frames(&app, 40).await;
    let mut chunks: Vec<Value> = frames
        .iter()
        .map(|f| serde_json::from_str(f).unwrap())
        .collect();

    let (status, envelope) = post(&app, "/api/transfer/recombine", json!({ "chunks": chunks })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(envelope["amount"], "1500");

    chunks.remove(1);
    let (status, body) = post(&app, "/api/transfer/recombine", json!({ "chunks": chunks })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("missing [2]"));
}

#[tokio::test]
async fn test_small_non_transaction_fits_one_code() {
    let dir = TempDir::new().unwrap();
    let app = test_router(test_state(dir.path(), Arc::new(MockEngine::default())));

    let (status, body) = post(
        &app,
        "/api/transfer/split",
        json!({
            "kind": "address",
            "payload": { "address": "mock:somewhere" },
            "maxChunkBytes": 10,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalParts"], 1);
}

#[tokio::test]
async fn test_split_requires_kind_fields() {
    let dir = TempDir::new().unwrap();
    let app = test_router(test_state(dir.path(), Arc::new(MockEngine::default())));

    let (status, body) = post(
        &app,
        "/api/transfer/split",
        json!({ "kind": "signed-transaction", "payload": { "transactionId": "x" } }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("fromAddress"));
}

#[tokio::test]
async fn test_export_then_import_document() {
    let dir = TempDir::new().unwrap();
    let app = test_router(test_state(dir.path(), Arc::new(MockEngine::default())));

    let envelope = json!({
        "kind": "address",
        "version": 1,
        "timestamp": "2026-01-02T03:04:05Z",
        "address": "mock:somewhere",
        "label": "cold storage",
    });

    let (status, exported) = post(&app, "/api/transfer/export", json!({ "envelope": envelope })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(exported["filename"], "bitcoin-address-data-20260102-030405.json");

    let document = exported["document"].as_str().unwrap();
    assert!(document.contains("\"type\": \"bitcoin-address-data\""));

    let (status, imported) = post(&app, "/api/transfer/import", json!({ "document": document })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(imported["kind"], "address");
    assert_eq!(imported["address"], "mock:somewhere");
    assert_eq!(imported["label"], "cold storage");
}

#[tokio::test]
async fn test_submit_marks_sender_used() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(MockEngine::default());
    let state = test_state(dir.path(), engine.clone());
    let esplora_url = state.config.esplora_url.clone();
    let app = test_router(state);

    post_empty(&app, "/api/addresses/next/receive").await;
    let sender = mock_address(AddressKind::Receive, 0);

    let (_, signed) = post(
        &app,
        "/api/transfer/split",
        json!({ "kind": "signed-transaction", "payload": signed_transaction(&sender) }),
    )
    .await;
    let frames: Vec<String> = serde_json::from_value(signed["frames"].clone()).unwrap();
    let chunks: Vec<Value> = frames.iter().map(|f| serde_json::from_str(f).unwrap()).collect();
    let (_, envelope) = post(&app, "/api/transfer/recombine", json!({ "chunks": chunks })).await;

    let (status, body) = post(&app, "/api/transactions/submit", json!({ "envelope": envelope })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["transactionId"], "tx-abc");
    assert_eq!(body["submitted"]["kind"], "submitted-transaction");
    assert_eq!(body["submitted"]["fromAddress"], sender.as_str());

    assert_eq!(engine.submitted(), vec![("tx-abc".to_string(), esplora_url)]);

    let (_, all) = get(&app, "/api/addresses").await;
    assert_eq!(all[0]["used"], true);
}

#[tokio::test]
async fn test_submit_uses_given_endpoint() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(MockEngine::default());
    let app = test_router(test_state(dir.path(), engine.clone()));

    let envelope = json!({
        "kind": "signed-transaction",
        "version": 1,
        "timestamp": "2026-01-02T03:04:05Z",
        "transactionId": "tx-abc",
        "fromAddress": "mock:stranger",
        "toAddress": "mock:elsewhere",
        "amount": "1500",
    });

    let (status, _) = post(
        &app,
        "/api/transactions/submit",
        json!({ "envelope": envelope, "rpcEndpoint": "http://node.local/api" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(engine.submitted()[0].1, "http://node.local/api");
}

#[tokio::test]
async fn test_submit_rejects_unsigned() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(MockEngine::default());
    let app = test_router(test_state(dir.path(), engine.clone()));

    let envelope = json!({
        "kind": "unsigned-transaction",
        "version": 1,
        "timestamp": "2026-01-02T03:04:05Z",
        "fromAddress": "mock:a",
        "toAddress": "mock:b",
        "amount": "1500",
    });

    let (status, _) = post(&app, "/api/transactions/submit", json!({ "envelope": envelope })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(engine.submitted().is_empty());
}
