//! Address and UTXO records kept by the ledger

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::amount::Amount;
use crate::error::AirgapError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressKind {
    Receive,
    Change,
}

impl AddressKind {
    pub const ALL: [AddressKind; 2] = [AddressKind::Receive, AddressKind::Change];

    /// BIP44 chain index: 0 external, 1 internal
    pub fn chain(&self) -> u32 {
        match self {
            Self::Receive => 0,
            Self::Change => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Receive => "receive",
            Self::Change => "change",
        }
    }
}

impl fmt::Display for AddressKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AddressKind {
    type Err = AirgapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "receive" | "external" => Ok(Self::Receive),
            "change" | "internal" => Ok(Self::Change),
            other => Err(AirgapError::malformed(format!("unknown address kind '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outpoint {
    pub transaction_id: String,
    pub output_index: u32,
}

impl fmt::Display for Outpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.transaction_id, self.output_index)
    }
}

/// An unspent output owned by one of the wallet's addresses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtxoEntry {
    pub outpoint: Outpoint,
    pub amount: Amount,
    pub script_public_key: String,
    pub block_daa_score: Amount,
    pub is_coinbase: bool,
    pub owning_address: String,
}

/// One leaf of the HD tree the wallet has generated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedAddress {
    pub address: String,
    pub index: u32,
    pub kind: AddressKind,
    pub derivation_path: String,
    pub used: bool,
    pub balance: Amount,
    pub utxos: Vec<UtxoEntry>,
}

impl DerivedAddress {
    pub fn new(address: String, index: u32, kind: AddressKind, derivation_path: String) -> Self {
        Self {
            address,
            index,
            kind,
            derivation_path,
            used: false,
            balance: Amount::ZERO,
            utxos: Vec::new(),
        }
    }

    /// Has a positive balance or any cached UTXO
    pub fn is_funded(&self) -> bool {
        !self.balance.is_zero() || !self.utxos.is_empty()
    }
}

/// Balance and UTXOs reported by the engine for one address
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressBalance {
    pub amount: Amount,
    pub utxos: Vec<UtxoEntry>,
}

impl AddressBalance {
    pub fn is_empty(&self) -> bool {
        self.amount.is_zero() && self.utxos.is_empty()
    }
}
