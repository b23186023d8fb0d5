//! Per-wallet ledger state
//!
//! Plain data with the invariants enforced on every mutation; the async
//! locking lives in [`super::AddressLedger`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use super::types::{AddressKind, DerivedAddress, Outpoint, UtxoEntry};
use crate::amount::Amount;
use crate::error::AirgapError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressLedgerState {
    pub network: String,
    pub receive_index: u32,
    pub change_index: u32,
    pub receive: BTreeMap<u32, DerivedAddress>,
    pub change: BTreeMap<u32, DerivedAddress>,
}

/// Why the current address of a kind should no longer be handed out
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "camelCase")]
pub enum RotationReason {
    NoAddress { kind: AddressKind },
    Used { kind: AddressKind, index: u32, address: String },
    Funded { kind: AddressKind, index: u32, address: String, balance: Amount },
}

impl fmt::Display for RotationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoAddress { kind } => write!(f, "No {} address has been generated yet", kind),
            Self::Used { kind, index, .. } => write!(
                f,
                "Current {} address #{} has already been used in a transaction",
                kind, index
            ),
            Self::Funded { kind, index, balance, .. } => write!(
                f,
                "Current {} address #{} already holds a balance of {}",
                kind, index, balance
            ),
        }
    }
}

impl AddressLedgerState {
    pub fn new(network: impl Into<String>) -> Self {
        Self {
            network: network.into(),
            receive_index: 0,
            change_index: 0,
            receive: BTreeMap::new(),
            change: BTreeMap::new(),
        }
    }

    pub fn next_index(&self, kind: AddressKind) -> u32 {
        match kind {
            AddressKind::Receive => self.receive_index,
            AddressKind::Change => self.change_index,
        }
    }

    pub fn addresses(&self, kind: AddressKind) -> &BTreeMap<u32, DerivedAddress> {
        match kind {
            AddressKind::Receive => &self.receive,
            AddressKind::Change => &self.change,
        }
    }

    /// Highest-index entry of a kind
    pub fn current(&self, kind: AddressKind) -> Option<&DerivedAddress> {
        self.addresses(kind).values().next_back()
    }

    pub fn get(&self, kind: AddressKind, index: u32) -> Option<&DerivedAddress> {
        self.addresses(kind).get(&index)
    }

    /// All entries in insertion order: receive by index, then change by index
    pub fn all(&self) -> impl Iterator<Item = &DerivedAddress> {
        self.receive.values().chain(self.change.values())
    }

    pub fn find(&self, address: &str) -> Option<&DerivedAddress> {
        self.all().find(|a| a.address == address)
    }

    fn find_mut(&mut self, address: &str) -> Option<&mut DerivedAddress> {
        self.receive
            .values_mut()
            .chain(self.change.values_mut())
            .find(|a| a.address == address)
    }

    pub fn total_balance(&self) -> Amount {
        self.all().map(|a| a.balance).sum()
    }

    /// Append an entry at the next free index of its kind
    pub fn insert(&mut self, entry: DerivedAddress) -> Result<(), AirgapError> {
        let expected = self.next_index(entry.kind);
        if entry.index != expected {
            return Err(AirgapError::InvalidState(format!(
                "{} index {} inserted but next free index is {}",
                entry.kind, entry.index, expected
            )));
        }

        self.strip_outpoints(&entry.address, &entry.utxos);
        let kind = entry.kind;
        match kind {
            AddressKind::Receive => {
                self.receive.insert(expected, entry);
                self.receive_index += 1;
            }
            AddressKind::Change => {
                self.change.insert(expected, entry);
                self.change_index += 1;
            }
        }
        Ok(())
    }

    /// Returns `false` when the address is not in this ledger
    pub fn mark_used(&mut self, address: &str) -> bool {
        match self.find_mut(address) {
            Some(entry) => {
                entry.used = true;
                true
            }
            None => false,
        }
    }

    /// Replace balance and UTXOs; returns `false` when the address is unknown
    pub fn apply_balance(&mut self, address: &str, balance: Amount, utxos: Vec<UtxoEntry>) -> bool {
        if self.find(address).is_none() {
            return false;
        }

        self.strip_outpoints(address, &utxos);
        if let Some(entry) = self.find_mut(address) {
            entry.balance = balance;
            entry.utxos = utxos;
        }
        true
    }

    /// Remove outpoints now owned by `owner` from every other address
    fn strip_outpoints(&mut self, owner: &str, utxos: &[UtxoEntry]) {
        if utxos.is_empty() {
            return;
        }
        let claimed: HashSet<&Outpoint> = utxos.iter().map(|u| &u.outpoint).collect();

        for entry in self.receive.values_mut().chain(self.change.values_mut()) {
            if entry.address == owner {
                continue;
            }
            let before = entry.utxos.len();
            let mut released = Amount::ZERO;
            entry.utxos.retain(|u| {
                let keep = !claimed.contains(&u.outpoint);
                if !keep {
                    released = released + u.amount;
                }
                keep
            });
            if entry.utxos.len() != before {
                log::warn!(
                    "Moved {} outpoint(s) from {} to {}",
                    before - entry.utxos.len(),
                    entry.address,
                    owner
                );
                entry.balance = entry.balance.saturating_sub(released);
            }
        }
    }

    /// Reasons the current address of `kind` must be rotated; empty when it is fresh
    pub fn rotation_reasons(&self, kind: AddressKind) -> Vec<RotationReason> {
        let Some(current) = self.current(kind) else {
            return vec![RotationReason::NoAddress { kind }];
        };

        let mut reasons = Vec::new();
        if current.used {
            reasons.push(RotationReason::Used {
                kind,
                index: current.index,
                address: current.address.clone(),
            });
        }
        if current.is_funded() {
            reasons.push(RotationReason::Funded {
                kind,
                index: current.index,
                address: current.address.clone(),
                balance: current.balance,
            });
        }
        reasons
    }

    /// Check index contiguity, counters and that each address appears once
    pub fn validate(&self) -> Result<(), AirgapError> {
        let mut seen = HashSet::new();
        for kind in AddressKind::ALL {
            let map = self.addresses(kind);
            if map.len() as u64 != self.next_index(kind) as u64 {
                return Err(AirgapError::InvalidState(format!(
                    "{} index is {} but {} addresses are stored",
                    kind,
                    self.next_index(kind),
                    map.len()
                )));
            }
            for (expected, (key, entry)) in map.iter().enumerate() {
                if *key as usize != expected || entry.index != *key || entry.kind != kind {
                    return Err(AirgapError::InvalidState(format!(
                        "{} entry at slot {} is out of sequence (index {})",
                        kind, expected, entry.index
                    )));
                }
                if !seen.insert(entry.address.as_str()) {
                    return Err(AirgapError::InvalidState(format!(
                        "address {} stored twice",
                        entry.address
                    )));
                }
            }
        }
        Ok(())
    }
}
