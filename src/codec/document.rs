//! Export/import file format
//!
//! The downloadable form of an envelope is a JSON document whose `type` is
//! `"<domain>-<kind>-data"`, e.g. `bitcoin-signed-transaction-data`.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use super::envelope::{PayloadKind, TransferEnvelope};
use crate::error::AirgapError;

pub fn document_type(domain: &str, kind: PayloadKind) -> String {
    format!("{}-{}-data", domain, kind)
}

/// Render an envelope as a pretty-printed export document
pub fn export_document(envelope: &TransferEnvelope, domain: &str) -> Result<String, AirgapError> {
    let mut doc = Map::new();
    doc.insert(
        "type".to_string(),
        Value::String(document_type(domain, envelope.kind)),
    );
    doc.insert("version".to_string(), Value::from(envelope.version));
    doc.insert(
        "timestamp".to_string(),
        Value::String(envelope.timestamp.to_rfc3339()),
    );
    for (k, v) in &envelope.fields {
        doc.insert(k.clone(), v.clone());
    }

    serde_json::to_string_pretty(&Value::Object(doc))
        .map_err(|e| AirgapError::malformed(format!("document serialization failed: {}", e)))
}

/// Parse an export document produced for `domain`
///
/// Unknown fields are carried along as payload fields rather than rejected,
/// so documents from newer versions still import.
pub fn import_document(text: &str, domain: &str) -> Result<TransferEnvelope, AirgapError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| AirgapError::malformed(format!("document is not JSON: {}", e)))?;
    let Value::Object(mut doc) = value else {
        return Err(AirgapError::malformed("document must be a JSON object"));
    };

    let doc_type = match doc.remove("type") {
        Some(Value::String(t)) => t,
        _ => return Err(AirgapError::malformed("document has no 'type'")),
    };
    let kind = parse_document_type(&doc_type, domain)?;

    let version = match doc.remove("version") {
        Some(v) => v
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| AirgapError::malformed(format!("invalid version {}", v)))?,
        None => return Err(AirgapError::malformed("document has no 'version'")),
    };

    let timestamp = match doc.remove("timestamp") {
        Some(Value::String(ts)) => DateTime::parse_from_rfc3339(&ts)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| AirgapError::malformed(format!("invalid timestamp '{}': {}", ts, e)))?,
        Some(other) => {
            return Err(AirgapError::malformed(format!("invalid timestamp {}", other)))
        }
        None => {
            log::debug!("Document has no timestamp, using import time");
            Utc::now()
        }
    };

    doc.remove("kind");

    let envelope = TransferEnvelope {
        kind,
        version,
        timestamp,
        fields: doc,
    };
    envelope.validate()?;
    Ok(envelope)
}

fn parse_document_type(doc_type: &str, domain: &str) -> Result<PayloadKind, AirgapError> {
    doc_type
        .strip_prefix(domain)
        .and_then(|rest| rest.strip_prefix('-'))
        .and_then(|rest| rest.strip_suffix("-data"))
        .ok_or_else(|| {
            AirgapError::malformed(format!(
                "document type '{}' is not a {} wallet document",
                doc_type, domain
            ))
        })?
        .parse()
}
