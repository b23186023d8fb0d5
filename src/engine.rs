//! Cryptographic engine interface
//!
//! The engine derives keys, resolves addresses, reports balances and submits
//! signed transactions. Everything about key material and address encoding
//! stays behind this trait.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::codec::{
    build_transfer_envelope, normalize_for_transfer, EngineValue, PayloadKind,
    StructuredExportable, TransferEnvelope,
};
use crate::error::AirgapError;
use crate::ledger::AddressBalance;

#[async_trait]
pub trait CryptoEngine: Send + Sync {
    /// Seed material handle (never leaves the engine in plain form)
    type Seed: Send + Sync;
    /// Derived private key handle
    type Key: Send + Sync;

    async fn derive_private_key_at(
        &self,
        seed: &Self::Seed,
        derivation_path: &str,
    ) -> Result<Self::Key, AirgapError>;

    async fn public_address_of(&self, key: &Self::Key, network: &str) -> Result<String, AirgapError>;

    async fn query_balance_and_utxos(
        &self,
        address: &str,
        network: &str,
    ) -> Result<AddressBalance, AirgapError>;

    /// Broadcast a signed transaction, returning its transaction id
    async fn submit(
        &self,
        transaction: &TransactionHandle,
        rpc_endpoint: &str,
    ) -> Result<String, AirgapError>;
}

/// A transaction regardless of how the wallet came to hold it
///
/// `Live` wraps an engine object created in this session; `Reconstructed`
/// carries one re-hydrated from an imported envelope. Both export the same
/// way, so transfer and submission code never branch on the origin.
#[derive(Clone)]
pub enum TransactionHandle {
    Live(Arc<dyn StructuredExportable>),
    Reconstructed(TransferEnvelope),
}

impl TransactionHandle {
    /// Re-hydrate a transaction from an imported envelope
    pub fn from_envelope(envelope: TransferEnvelope) -> Result<Self, AirgapError> {
        if !envelope.kind.is_transaction() {
            return Err(AirgapError::malformed(format!(
                "{} envelope does not hold a transaction",
                envelope.kind
            )));
        }
        Ok(Self::Reconstructed(envelope))
    }

    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live(_))
    }

    /// Normalized transfer tree of the transaction
    pub fn to_transfer_tree(&self) -> Value {
        match self {
            Self::Live(obj) => normalize_for_transfer(&EngineValue::Opaque(obj.clone())),
            Self::Reconstructed(envelope) => Value::Object(envelope.fields.clone()),
        }
    }

    pub fn transaction_id(&self) -> Option<String> {
        let tree = self.to_transfer_tree();
        ["transactionId", "id"]
            .iter()
            .find_map(|k| tree.get(*k).and_then(Value::as_str).map(str::to_string))
    }

    /// Wrap the transaction for transfer as the given kind
    pub fn to_envelope(&self, kind: PayloadKind) -> Result<TransferEnvelope, AirgapError> {
        match self {
            Self::Reconstructed(envelope) if envelope.kind == kind => Ok(envelope.clone()),
            _ => build_transfer_envelope(self.to_transfer_tree(), kind),
        }
    }
}

impl std::fmt::Debug for TransactionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Live(obj) => write!(f, "Live({})", obj.type_name()),
            Self::Reconstructed(envelope) => write!(f, "Reconstructed({})", envelope.kind),
        }
    }
}
