use airgap_core::{
    AddressKind, Amount, Chunk, DerivedAddress, PayloadKind, TransferEnvelope, UtxoEntry,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct MarkUsedRequest {
    pub address: String,
}

#[derive(Debug, Serialize)]
pub struct MarkUsedResponse {
    pub address: String,
    /// `false` when the address does not belong to this wallet
    pub known: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FreshAddressResponse {
    pub rotated: bool,
    pub current: Option<DerivedAddress>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverRequest {
    pub kind: AddressKind,
    #[serde(default)]
    pub start_index: u32,
    pub gap_limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub cancelled: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub fresh_address: Option<DerivedAddress>,
    pub total_balance: Amount,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub total_balance: Amount,
    pub utxos: Vec<UtxoEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitRequest {
    pub kind: PayloadKind,
    pub payload: Value,
    pub max_chunk_bytes: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitResponse {
    pub group_id: String,
    pub total_parts: u32,
    /// Text for each optical code, in part order
    pub frames: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecombineRequest {
    pub chunks: Vec<Chunk>,
}

#[derive(Debug, Deserialize)]
pub struct ExportRequest {
    pub envelope: TransferEnvelope,
}

#[derive(Debug, Serialize)]
pub struct ExportResponse {
    pub filename: String,
    pub document: String,
}

#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    pub document: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub envelope: TransferEnvelope,
    /// Broadcast endpoint; the configured Esplora URL when absent
    pub rpc_endpoint: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub transaction_id: String,
    pub submitted: TransferEnvelope,
}

#[derive(Debug, Deserialize)]
pub struct OfferRequest {
    pub frame: String,
}
