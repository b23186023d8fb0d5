//! Wallet-wide views over the address ledger
//!
//! Every call works on a fresh snapshot and never mutates the ledger, so
//! results are only as current as the last balance update.

use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

use crate::amount::Amount;
use crate::engine::CryptoEngine;
use crate::ledger::{AddressKind, AddressLedger, RotationReason, UtxoEntry};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KindAdvice {
    pub kind: AddressKind,
    pub generate_new: bool,
    pub reasons: Vec<RotationReason>,
    /// Human-readable form of `reasons`
    pub messages: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddressGenerationAdvice {
    pub receive: KindAdvice,
    pub change: KindAdvice,
}

impl AddressGenerationAdvice {
    pub fn for_kind(&self, kind: AddressKind) -> &KindAdvice {
        match kind {
            AddressKind::Receive => &self.receive,
            AddressKind::Change => &self.change,
        }
    }
}

pub struct UtxoAggregator<E: CryptoEngine> {
    ledger: Arc<AddressLedger<E>>,
}

impl<E: CryptoEngine> UtxoAggregator<E> {
    pub fn new(ledger: Arc<AddressLedger<E>>) -> Self {
        Self { ledger }
    }

    pub async fn total_balance(&self) -> Amount {
        self.ledger.get_total_balance().await
    }

    /// Every cached UTXO, receive addresses first, each in index order
    pub async fn all_utxos(&self) -> Vec<UtxoEntry> {
        let state = self.ledger.snapshot().await;
        state.all().flat_map(|a| a.utxos.iter().cloned()).collect()
    }

    pub async fn utxos_for_addresses(&self, addresses: &[String]) -> Vec<UtxoEntry> {
        let wanted: HashSet<&str> = addresses.iter().map(String::as_str).collect();
        self.all_utxos()
            .await
            .into_iter()
            .filter(|u| wanted.contains(u.owning_address.as_str()))
            .collect()
    }

    pub async fn address_generation_advice(&self) -> AddressGenerationAdvice {
        let state = self.ledger.snapshot().await;
        let advise = |kind: AddressKind| {
            let reasons = state.rotation_reasons(kind);
            KindAdvice {
                kind,
                generate_new: !reasons.is_empty(),
                messages: reasons.iter().map(ToString::to_string).collect(),
                reasons,
            }
        };

        AddressGenerationAdvice {
            receive: advise(AddressKind::Receive),
            change: advise(AddressKind::Change),
        }
    }
}
