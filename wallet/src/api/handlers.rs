use airgap_core::codec::document_type;
use airgap_core::transfer::recombine as recombine_chunks;
use airgap_core::{
    build_transfer_envelope, export_document, import_document, split, AddressGenerationAdvice,
    AddressKind, CancelToken, CryptoEngine, DerivedAddress, DiscoveryReport, PayloadKind,
    ScanProgress, ScanSignal, SplitOptions, TransactionHandle, TransferEnvelope,
};
use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::Arc;

use super::state::{AppState, RunningDiscovery};
use super::types::*;
use crate::error::ServiceError;

type ApiResult<T> = Result<Json<T>, ServiceError>;

// ============================================================================
// Addresses
// ============================================================================

pub async fn list_addresses_handler<E: CryptoEngine + 'static>(
    State(state): State<Arc<AppState<E>>>,
) -> Json<Vec<DerivedAddress>> {
    Json(state.ledger.get_all_addresses().await)
}

pub async fn derive_next_handler<E: CryptoEngine + 'static>(
    State(state): State<Arc<AppState<E>>>,
    Path(kind): Path<String>,
) -> ApiResult<DerivedAddress> {
    let kind = AddressKind::from_str(&kind)?;
    let entry = state.ledger.derive_next(kind).await?;
    state.persist().await?;
    Ok(Json(entry))
}

pub async fn mark_used_handler<E: CryptoEngine + 'static>(
    State(state): State<Arc<AppState<E>>>,
    Json(req): Json<MarkUsedRequest>,
) -> ApiResult<MarkUsedResponse> {
    let known = state.ledger.mark_used(&req.address).await;
    if known {
        state.persist().await?;
    }
    Ok(Json(MarkUsedResponse {
        address: req.address,
        known,
    }))
}

pub async fn fresh_address_handler<E: CryptoEngine + 'static>(
    State(state): State<Arc<AppState<E>>>,
) -> ApiResult<FreshAddressResponse> {
    let rotated = state.ledger.ensure_fresh_receive_address().await?;
    if rotated.is_some() {
        state.persist().await?;
    }
    let current = state
        .ledger
        .snapshot()
        .await
        .current(AddressKind::Receive)
        .cloned();

    Ok(Json(FreshAddressResponse {
        rotated: rotated.is_some(),
        current,
    }))
}

pub async fn discover_handler<E: CryptoEngine + 'static>(
    State(state): State<Arc<AppState<E>>>,
    Json(req): Json<DiscoverRequest>,
) -> ApiResult<DiscoveryReport> {
    let token = {
        let mut running = state.discovery.lock().await;
        if let Some(ref current) = *running {
            return Err(ServiceError::DiscoveryRunning(current.kind.to_string()));
        }
        let token = CancelToken::new();
        *running = Some(RunningDiscovery {
            kind: req.kind,
            token: token.clone(),
        });
        token
    };

    // The scan owns its own task so a dropped request still releases the slot
    let gap_limit = req.gap_limit.unwrap_or(state.config.wallet.gap_limit);
    let task_state = state.clone();
    let scan = tokio::spawn(async move {
        let result = task_state
            .ledger
            .discover_batched(
                req.kind,
                req.start_index,
                gap_limit,
                task_state.config.wallet.discovery_batch_size,
                &token,
            )
            .await;

        task_state.discovery.lock().await.take();
        // Batches committed before a failure are kept, so persist either way
        let persisted = task_state.persist().await;
        (result, persisted)
    });

    let (result, persisted) = match scan.await {
        Ok(outcome) => outcome,
        Err(e) => {
            state.discovery.lock().await.take();
            return Err(ServiceError::Internal(format!("discovery task failed: {}", e)));
        }
    };
    persisted?;
    Ok(Json(result?))
}

pub async fn cancel_discovery_handler<E: CryptoEngine + 'static>(
    State(state): State<Arc<AppState<E>>>,
) -> Json<CancelResponse> {
    let running = state.discovery.lock().await.clone();
    if let Some(ref running) = running {
        log::info!("Cancelling {} discovery", running.kind);
        running.token.cancel();
    }
    Json(CancelResponse {
        cancelled: running.is_some(),
    })
}

pub async fn account_xpub_handler<E: CryptoEngine + 'static>(
    State(state): State<Arc<AppState<E>>>,
) -> ApiResult<TransferEnvelope> {
    state
        .account_xpub
        .clone()
        .map(Json)
        .ok_or_else(|| ServiceError::Internal("no account key is loaded".to_string()))
}

// ============================================================================
// Balances
// ============================================================================

pub async fn refresh_handler<E: CryptoEngine + 'static>(
    State(state): State<Arc<AppState<E>>>,
) -> ApiResult<RefreshResponse> {
    let result = state.ledger.refresh_balances().await;
    state.persist().await?;
    let fresh_address = result?;

    Ok(Json(RefreshResponse {
        fresh_address,
        total_balance: state.aggregator.total_balance().await,
    }))
}

pub async fn balance_handler<E: CryptoEngine + 'static>(
    State(state): State<Arc<AppState<E>>>,
) -> Json<BalanceResponse> {
    Json(BalanceResponse {
        total_balance: state.aggregator.total_balance().await,
        utxos: state.aggregator.all_utxos().await,
    })
}

pub async fn advice_handler<E: CryptoEngine + 'static>(
    State(state): State<Arc<AppState<E>>>,
) -> Json<AddressGenerationAdvice> {
    Json(state.aggregator.address_generation_advice().await)
}

// ============================================================================
// Transfer
// ============================================================================

pub async fn split_handler<E: CryptoEngine + 'static>(
    State(state): State<Arc<AppState<E>>>,
    Json(req): Json<SplitRequest>,
) -> ApiResult<SplitResponse> {
    let envelope = build_transfer_envelope(req.payload, req.kind)?;

    let mut options = SplitOptions::from(&state.config.wallet);
    if let Some(max) = req.max_chunk_bytes {
        options.max_chunk_bytes = max;
    }

    let message = split(&envelope, &options)?;
    Ok(Json(SplitResponse {
        frames: message.frames()?,
        group_id: message.group_id,
        total_parts: message.total_parts,
    }))
}

pub async fn recombine_handler(Json(req): Json<RecombineRequest>) -> ApiResult<TransferEnvelope> {
    Ok(Json(recombine_chunks(&req.chunks)?))
}

pub async fn export_handler<E: CryptoEngine + 'static>(
    State(state): State<Arc<AppState<E>>>,
    Json(req): Json<ExportRequest>,
) -> ApiResult<ExportResponse> {
    req.envelope.validate()?;
    let domain = &state.config.wallet.domain;
    let document = export_document(&req.envelope, domain)?;
    let filename = format!(
        "{}-{}.json",
        document_type(domain, req.envelope.kind),
        req.envelope.timestamp.format("%Y%m%d-%H%M%S")
    );

    Ok(Json(ExportResponse { filename, document }))
}

pub async fn import_handler<E: CryptoEngine + 'static>(
    State(state): State<Arc<AppState<E>>>,
    Json(req): Json<ImportRequest>,
) -> ApiResult<TransferEnvelope> {
    let envelope = import_document(&req.document, &state.config.wallet.domain)?;
    log::info!("Imported {} document", envelope.kind);
    Ok(Json(envelope))
}

pub async fn submit_handler<E: CryptoEngine + 'static>(
    State(state): State<Arc<AppState<E>>>,
    Json(req): Json<SubmitRequest>,
) -> ApiResult<SubmitResponse> {
    if req.envelope.kind != PayloadKind::SignedTransaction {
        return Err(ServiceError::InvalidInput(format!(
            "only signed transactions can be submitted, got {}",
            req.envelope.kind
        )));
    }
    req.envelope.validate()?;

    let handle = TransactionHandle::from_envelope(req.envelope)?;
    let endpoint = req
        .rpc_endpoint
        .unwrap_or_else(|| state.config.esplora_url.clone());
    let transaction_id = state.engine.submit(&handle, &endpoint).await?;

    let tree = handle.to_transfer_tree();
    let from_address = tree.get("fromAddress").and_then(Value::as_str);
    if let Some(address) = from_address {
        if state.ledger.mark_used(address).await {
            state.persist().await?;
        }
    }

    let submitted = build_transfer_envelope(
        json!({
            "transactionId": transaction_id,
            "fromAddress": from_address,
            "toAddress": tree.get("toAddress"),
            "amount": tree.get("amount"),
        }),
        PayloadKind::SubmittedTransaction,
    )?;

    Ok(Json(SubmitResponse {
        transaction_id,
        submitted,
    }))
}

// ============================================================================
// Scan session
// ============================================================================

pub async fn scan_offer_handler<E: CryptoEngine + 'static>(
    State(state): State<Arc<AppState<E>>>,
    Json(req): Json<OfferRequest>,
) -> ApiResult<ScanSignal> {
    let signal = state.scan.lock().await.offer(&req.frame)?;
    Ok(Json(signal))
}

pub async fn scan_progress_handler<E: CryptoEngine + 'static>(
    State(state): State<Arc<AppState<E>>>,
) -> Json<ScanProgress> {
    Json(state.scan.lock().await.progress())
}

pub async fn scan_reset_handler<E: CryptoEngine + 'static>(
    State(state): State<Arc<AppState<E>>>,
) -> Json<ScanProgress> {
    let mut scan = state.scan.lock().await;
    scan.reset();
    Json(scan.progress())
}

pub async fn scan_recombine_handler<E: CryptoEngine + 'static>(
    State(state): State<Arc<AppState<E>>>,
) -> ApiResult<TransferEnvelope> {
    let envelope = state.scan.lock().await.recombine()?;
    Ok(Json(envelope))
}
