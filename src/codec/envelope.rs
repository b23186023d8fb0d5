//! Transfer envelopes
//!
//! An envelope is the unit that crosses the air gap: a normalized payload
//! tagged with its kind, format version and creation time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::AirgapError;

/// Current envelope format version
pub const TRANSFER_VERSION: u32 = 1;

/// Keys owned by the envelope itself; stripped from payload fields
const RESERVED_KEYS: [&str; 4] = ["kind", "version", "timestamp", "type"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PayloadKind {
    UnsignedTransaction,
    SignedTransaction,
    SubmittedTransaction,
    UtxoSet,
    Address,
    ExtendedPublicKey,
}

impl PayloadKind {
    pub const ALL: [PayloadKind; 6] = [
        PayloadKind::UnsignedTransaction,
        PayloadKind::SignedTransaction,
        PayloadKind::SubmittedTransaction,
        PayloadKind::UtxoSet,
        PayloadKind::Address,
        PayloadKind::ExtendedPublicKey,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnsignedTransaction => "unsigned-transaction",
            Self::SignedTransaction => "signed-transaction",
            Self::SubmittedTransaction => "submitted-transaction",
            Self::UtxoSet => "utxo-set",
            Self::Address => "address",
            Self::ExtendedPublicKey => "extended-public-key",
        }
    }

    /// Transaction kinds are always chunked, however small
    pub fn is_transaction(&self) -> bool {
        matches!(
            self,
            Self::UnsignedTransaction | Self::SignedTransaction | Self::SubmittedTransaction
        )
    }

    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            Self::UnsignedTransaction => &["fromAddress", "toAddress", "amount"],
            Self::SignedTransaction => &["transactionId", "fromAddress", "toAddress", "amount"],
            Self::SubmittedTransaction => &["transactionId"],
            Self::UtxoSet => &["utxos"],
            Self::Address => &["address"],
            Self::ExtendedPublicKey => &["xpub"],
        }
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PayloadKind {
    type Err = AirgapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| AirgapError::malformed(format!("unknown payload kind '{}'", s)))
    }
}

/// A normalized payload tagged with `{kind, version, timestamp}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferEnvelope {
    pub kind: PayloadKind,
    pub version: u32,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl TransferEnvelope {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Check that every field required by the kind is present and non-null
    pub fn validate(&self) -> Result<(), AirgapError> {
        let missing: Vec<&str> = self
            .kind
            .required_fields()
            .iter()
            .copied()
            .filter(|f| self.fields.get(*f).map_or(true, Value::is_null))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(AirgapError::malformed(format!(
                "{} payload is missing required fields: {}",
                self.kind,
                missing.join(", ")
            )))
        }
    }

    /// Serialize to compact JSON text
    pub fn to_json(&self) -> Result<String, AirgapError> {
        serde_json::to_string(self)
            .map_err(|e| AirgapError::malformed(format!("envelope serialization failed: {}", e)))
    }

    /// Parse and validate envelope JSON; unknown fields are kept as payload fields
    pub fn from_json(text: &str) -> Result<Self, AirgapError> {
        let envelope: TransferEnvelope = serde_json::from_str(text)
            .map_err(|e| AirgapError::malformed(format!("not a transfer envelope: {}", e)))?;
        envelope.validate()?;
        Ok(envelope)
    }
}

/// Wrap a normalized payload into an envelope of the given kind
///
/// Object payloads become the envelope fields. A bare array is accepted for
/// `utxo-set` and stored under `utxos`. Fails with `MalformedPayload` when
/// fields required by the kind are absent.
pub fn build_transfer_envelope(
    payload: Value,
    kind: PayloadKind,
) -> Result<TransferEnvelope, AirgapError> {
    let mut fields = match payload {
        Value::Object(map) => map,
        Value::Array(items) if kind == PayloadKind::UtxoSet => {
            let mut map = Map::new();
            map.insert("utxos".to_string(), Value::Array(items));
            map
        }
        other => {
            return Err(AirgapError::malformed(format!(
                "{} payload must be an object, got {}",
                kind,
                type_label(&other)
            )))
        }
    };

    for key in RESERVED_KEYS {
        if fields.remove(key).is_some() {
            log::warn!("Dropping reserved key '{}' from {} payload", key, kind);
        }
    }

    let envelope = TransferEnvelope {
        kind,
        version: TRANSFER_VERSION,
        timestamp: Utc::now(),
        fields,
    };
    envelope.validate()?;
    Ok(envelope)
}

fn type_label(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
