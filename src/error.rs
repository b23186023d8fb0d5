//! Error types for air-gap wallet operations
//!
//! Codec and transfer failures are always returned as typed results so the
//! UI layer can render a specific remediation message for each case.

use thiserror::Error;

/// Core error type for ledger, codec and transfer operations
#[derive(Error, Debug)]
pub enum AirgapError {
    /// The external cryptographic engine failed (derivation, balance query, submit)
    #[error("Engine failure: {0}")]
    EngineFailure(String),

    /// Text does not parse as a valid envelope, chunk or integer field
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Chunk count or part sequence does not match the declared group
    #[error("Missing parts for group {group_id}: expected {total_parts}, missing {missing:?}, extra {extra:?}")]
    MissingParts {
        group_id: String,
        total_parts: u32,
        missing: Vec<u32>,
        extra: Vec<u32>,
    },

    /// Reassembled text does not hash to the checksum carried by the chunks
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// A persisted ledger state violates the contiguous-index invariant
    #[error("Invalid ledger state: {0}")]
    InvalidState(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid vault key: {0}")]
    InvalidKey(String),
}

impl AirgapError {
    pub fn engine(msg: impl Into<String>) -> Self {
        Self::EngineFailure(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedPayload(msg.into())
    }

    /// Operator-facing instruction for recovering from this error
    pub fn remediation(&self) -> String {
        match self {
            Self::EngineFailure(msg) => format!("{}. Please try again.", msg),
            Self::MalformedPayload(_) => {
                "The scanned data is not a valid wallet payload. Re-scan or re-export it.".to_string()
            }
            Self::MissingParts { total_parts: 0, .. } => {
                "No parts have been scanned yet. Scan every code of the transfer.".to_string()
            }
            Self::MissingParts { missing, extra, .. } => {
                let mut parts = Vec::new();
                if !missing.is_empty() {
                    parts.push(format!("upload the missing parts {}", join_parts(missing)));
                }
                if !extra.is_empty() {
                    parts.push(format!("remove the extra parts {}", join_parts(extra)));
                }
                if parts.is_empty() {
                    "Chunks belong to different transfers. Re-scan a single set.".to_string()
                } else {
                    let mut msg = parts.join(" and ");
                    if let Some(first) = msg.get_mut(0..1) {
                        first.make_ascii_uppercase();
                    }
                    format!("{}.", msg)
                }
            }
            Self::ChecksumMismatch { .. } => {
                "Data corrupted during transfer. Re-scan all parts.".to_string()
            }
            Self::InvalidState(_) | Self::Storage(_) => {
                "Wallet state could not be loaded. Restore from backup or rescan addresses.".to_string()
            }
        }
    }
}

fn join_parts(parts: &[u32]) -> String {
    parts
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
