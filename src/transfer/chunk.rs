//! Splitting envelopes into optical-code-sized chunks and reassembling them

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::codec::TransferEnvelope;
use crate::config::WalletConfig;
use crate::error::AirgapError;

/// Bytes of the SHA-256 digest kept in a chunk checksum
const CHECKSUM_BYTES: usize = 8;

/// Upper bound on `totalParts`; chunks claiming more are malformed
pub const MAX_TOTAL_PARTS: u32 = 65_535;

/// One fragment of a split payload, as carried by a single optical code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    pub group_id: String,
    pub part: u32,
    pub total_parts: u32,
    pub checksum: String,
    pub data: String,
}

impl Chunk {
    /// Compact JSON text placed in the optical code
    pub fn to_frame_text(&self) -> Result<String, AirgapError> {
        serde_json::to_string(self)
            .map_err(|e| AirgapError::malformed(format!("chunk serialization failed: {}", e)))
    }
}

/// Result of splitting one payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkedMessage {
    pub group_id: String,
    pub total_parts: u32,
    pub chunks: Vec<Chunk>,
}

impl ChunkedMessage {
    pub fn frames(&self) -> Result<Vec<String>, AirgapError> {
        self.chunks.iter().map(Chunk::to_frame_text).collect()
    }
}

/// A decoded optical code: either one chunk or a whole unwrapped envelope
#[derive(Debug, Clone)]
pub enum Frame {
    Chunk(Chunk),
    Envelope(TransferEnvelope),
}

impl Frame {
    pub fn parse(text: &str) -> Result<Self, AirgapError> {
        let value: Value = serde_json::from_str(text.trim())
            .map_err(|e| AirgapError::malformed(format!("scanned text is not JSON: {}", e)))?;

        let is_chunk = value.get("groupId").is_some() && value.get("part").is_some();
        if is_chunk {
            let chunk: Chunk = serde_json::from_value(value)
                .map_err(|e| AirgapError::malformed(format!("invalid chunk: {}", e)))?;
            check_part_count(&chunk)?;
            if chunk.total_parts == 0 || chunk.part == 0 || chunk.part > chunk.total_parts {
                return Err(AirgapError::malformed(format!(
                    "chunk part {} of {} is out of range",
                    chunk.part, chunk.total_parts
                )));
            }
            Ok(Frame::Chunk(chunk))
        } else {
            let text = value.to_string();
            TransferEnvelope::from_json(&text).map(Frame::Envelope)
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SplitOptions {
    /// Payload bytes carried per chunk
    pub max_chunk_bytes: usize,
    /// Largest text that fits one optical code unchunked
    pub single_code_capacity: usize,
}

impl From<&WalletConfig> for SplitOptions {
    fn from(config: &WalletConfig) -> Self {
        Self {
            max_chunk_bytes: config.max_chunk_bytes,
            single_code_capacity: config.qr_safe_capacity,
        }
    }
}

/// Short digest of the full pre-split text
pub fn checksum(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    hex::encode(&digest[..CHECKSUM_BYTES])
}

/// Split an envelope for optical transport
///
/// Non-transaction payloads whose single frame fits one code are emitted as
/// a single part. Transactions are always chunked at `max_chunk_bytes`.
pub fn split(envelope: &TransferEnvelope, options: &SplitOptions) -> Result<ChunkedMessage, AirgapError> {
    if options.max_chunk_bytes == 0 {
        return Err(AirgapError::malformed("max chunk size must be at least 1 byte"));
    }

    let text = envelope.to_json()?;
    if !envelope.kind.is_transaction() && text.len() <= options.single_code_capacity {
        // The frame wraps and escapes the text, so measure the frame itself
        let single = split_text(&text, text.len().max(1))?;
        let frame_len = single.frames()?.iter().map(String::len).max().unwrap_or(0);
        if frame_len <= options.single_code_capacity {
            log::debug!("{} payload fits one code ({} bytes)", envelope.kind, frame_len);
            return Ok(single);
        }
        log::debug!(
            "{} frame of {} bytes exceeds one code, chunking",
            envelope.kind,
            frame_len
        );
    }

    let message = split_text(&text, options.max_chunk_bytes)?;
    log::info!(
        "Split {} payload of {} bytes into {} part(s), group {}",
        envelope.kind,
        text.len(),
        message.total_parts,
        message.group_id
    );
    Ok(message)
}

/// Split raw text into contiguous chunks of at most `max_chunk_bytes`
///
/// Boundaries snap back to UTF-8 character boundaries; a chunk always holds
/// at least one character, and no trailing empty chunk is emitted.
pub fn split_text(text: &str, max_chunk_bytes: usize) -> Result<ChunkedMessage, AirgapError> {
    if max_chunk_bytes == 0 {
        return Err(AirgapError::malformed("max chunk size must be at least 1 byte"));
    }

    let pieces = chunk_boundaries(text, max_chunk_bytes);
    let total_parts = u32::try_from(pieces.len())
        .ok()
        .filter(|n| *n <= MAX_TOTAL_PARTS)
        .ok_or_else(|| {
            AirgapError::malformed(format!(
                "payload needs {} parts, more than the {} allowed",
                pieces.len(),
                MAX_TOTAL_PARTS
            ))
        })?;
    let group_id = Uuid::new_v4().to_string();
    let checksum = checksum(text);

    let chunks = pieces
        .into_iter()
        .zip(1..)
        .map(|(data, part)| Chunk {
            group_id: group_id.clone(),
            part,
            total_parts,
            checksum: checksum.clone(),
            data: data.to_string(),
        })
        .collect();

    Ok(ChunkedMessage {
        group_id,
        total_parts,
        chunks,
    })
}

fn chunk_boundaries(text: &str, max_chunk_bytes: usize) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        let mut end = max_chunk_bytes.min(rest.len());
        while end > 0 && !rest.is_char_boundary(end) {
            end -= 1;
        }
        if end == 0 {
            end = rest.chars().next().map_or(rest.len(), char::len_utf8);
        }
        let (head, tail) = rest.split_at(end);
        pieces.push(head);
        rest = tail;
    }

    if pieces.is_empty() {
        pieces.push("");
    }
    pieces
}

/// Reassemble and parse a complete chunk set
pub fn recombine(chunks: &[Chunk]) -> Result<TransferEnvelope, AirgapError> {
    let text = recombine_text(chunks)?;
    TransferEnvelope::from_json(&text)
}

/// Reassemble a complete chunk set into the original text
///
/// Fails with `MissingParts` unless the set is exactly parts `1..=totalParts`
/// of one group, then with `ChecksumMismatch` if the joined text does not
/// hash to the group checksum. Input order does not matter.
pub fn recombine_text(chunks: &[Chunk]) -> Result<String, AirgapError> {
    let Some(first) = chunks.first() else {
        return Err(AirgapError::MissingParts {
            group_id: String::new(),
            total_parts: 0,
            missing: Vec::new(),
            extra: Vec::new(),
        });
    };
    for chunk in chunks {
        check_part_count(chunk)?;
    }
    let total = first.total_parts;

    let mut present = BTreeSet::new();
    let mut extra = BTreeSet::new();
    for chunk in chunks {
        let belongs = chunk.group_id == first.group_id && chunk.total_parts == total;
        let in_range = chunk.part >= 1 && chunk.part <= total;
        if !belongs || !in_range || !present.insert(chunk.part) {
            extra.insert(chunk.part);
        }
    }
    let missing: Vec<u32> = (1..=total).filter(|p| !present.contains(p)).collect();

    if chunks.len() != total as usize || !missing.is_empty() || !extra.is_empty() {
        return Err(AirgapError::MissingParts {
            group_id: first.group_id.clone(),
            total_parts: total,
            missing,
            extra: extra.into_iter().collect(),
        });
    }

    if let Some(stray) = chunks.iter().find(|c| c.checksum != first.checksum) {
        return Err(AirgapError::ChecksumMismatch {
            expected: first.checksum.clone(),
            actual: stray.checksum.clone(),
        });
    }

    let mut ordered: Vec<&Chunk> = chunks.iter().collect();
    ordered.sort_by_key(|c| c.part);
    let text: String = ordered.iter().map(|c| c.data.as_str()).collect();

    let actual = checksum(&text);
    if actual != first.checksum {
        log::warn!("Group {} failed checksum verification", first.group_id);
        return Err(AirgapError::ChecksumMismatch {
            expected: first.checksum.clone(),
            actual,
        });
    }

    Ok(text)
}

fn check_part_count(chunk: &Chunk) -> Result<(), AirgapError> {
    if chunk.total_parts > MAX_TOTAL_PARTS {
        return Err(AirgapError::malformed(format!(
            "chunk claims {} parts, more than the {} allowed",
            chunk.total_parts, MAX_TOTAL_PARTS
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_multiple_has_no_empty_tail() {
        let text = "x".repeat(800);
        let message = split_text(&text, 400).unwrap();
        assert_eq!(message.total_parts, 2);
        assert!(message.chunks.iter().all(|c| c.data.len() == 400));
    }

    #[test]
    fn test_boundaries_respect_utf8() {
        let text = "héllo wörld ✓✓";
        let message = split_text(text, 2).unwrap();
        for chunk in &message.chunks {
            assert!(!chunk.data.is_empty());
        }
        assert_eq!(recombine_text(&message.chunks).unwrap(), text);
    }

    #[test]
    fn test_checksum_is_shared_and_short() {
        let message = split_text(&"abc".repeat(50), 16).unwrap();
        let sum = &message.chunks[0].checksum;
        assert_eq!(sum.len(), CHECKSUM_BYTES * 2);
        assert!(message.chunks.iter().all(|c| &c.checksum == sum));
        assert_eq!(sum, &checksum(&"abc".repeat(50)));
    }

    #[test]
    fn test_duplicate_part_reported_as_extra() {
        let message = split_text(&"q".repeat(30), 10).unwrap();
        let chunks = vec![
            message.chunks[0].clone(),
            message.chunks[1].clone(),
            message.chunks[1].clone(),
        ];
        match recombine_text(&chunks) {
            Err(AirgapError::MissingParts { missing, extra, .. }) => {
                assert_eq!(missing, vec![3]);
                assert_eq!(extra, vec![2]);
            }
            other => panic!("expected MissingParts, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        assert!(split_text("abc", 0).is_err());
    }

    #[test]
    fn test_oversized_part_count_rejected() {
        let chunk = Chunk {
            group_id: "g".to_string(),
            part: 1,
            total_parts: u32::MAX,
            checksum: "00".to_string(),
            data: "x".to_string(),
        };
        assert!(matches!(
            recombine_text(&[chunk.clone()]),
            Err(AirgapError::MalformedPayload(_))
        ));
        assert!(matches!(
            Frame::parse(&chunk.to_frame_text().unwrap()),
            Err(AirgapError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_short_group_lists_missing_parts() {
        let chunk = Chunk {
            group_id: "g".to_string(),
            part: 1,
            total_parts: 3,
            checksum: "00".to_string(),
            data: "x".to_string(),
        };
        match recombine_text(&[chunk]) {
            Err(AirgapError::MissingParts { missing, .. }) => assert_eq!(missing, vec![2, 3]),
            other => panic!("expected MissingParts, got {:?}", other),
        }
    }

    #[test]
    fn test_frame_parse_rejects_out_of_range_part() {
        let text = r#"{"groupId":"g","part":4,"totalParts":3,"checksum":"00","data":"x"}"#;
        assert!(matches!(Frame::parse(text), Err(AirgapError::MalformedPayload(_))));
    }
}
