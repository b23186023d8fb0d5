//! Incremental scan session for a live capture feed
//!
//! Frames arrive one at a time and in any order. The session tracks a single
//! active group; completion is decided by count alone and correctness is
//! enforced later by the checksum in [`ScanSession::recombine`].

use serde::Serialize;
use std::collections::BTreeMap;

use super::chunk::{self, Chunk, Frame};
use crate::codec::TransferEnvelope;
use crate::error::AirgapError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum ScanState {
    Idle,
    #[serde(rename_all = "camelCase")]
    Accumulating { group_id: String },
    #[serde(rename_all = "camelCase")]
    Completed { group_id: String },
}

/// Outcome of offering one scanned frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "signal", rename_all = "camelCase")]
pub enum ScanSignal {
    #[serde(rename_all = "camelCase")]
    PartAccepted {
        group_id: String,
        part: u32,
        received: u32,
        total_parts: u32,
    },
    #[serde(rename_all = "camelCase")]
    Completed { group_id: String, total_parts: u32 },
    /// Part already stored; nothing changed
    #[serde(rename_all = "camelCase")]
    DuplicatePart { group_id: String, part: u32 },
    /// Frame from another transfer while one is active; it was not stored
    #[serde(rename_all = "camelCase")]
    ForeignGroup {
        group_id: String,
        active_group_id: String,
    },
}

impl ScanSignal {
    pub fn is_completed(&self) -> bool {
        matches!(self, ScanSignal::Completed { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanProgress {
    pub state: ScanState,
    pub total_parts: u32,
    pub received: Vec<u32>,
    pub missing: Vec<u32>,
}

#[derive(Debug)]
struct GroupProgress {
    group_id: String,
    total_parts: u32,
    checksum: String,
    parts: BTreeMap<u32, Chunk>,
}

impl GroupProgress {
    fn start(chunk: Chunk) -> Self {
        let mut group = Self {
            group_id: chunk.group_id.clone(),
            total_parts: chunk.total_parts,
            checksum: chunk.checksum.clone(),
            parts: BTreeMap::new(),
        };
        group.parts.insert(chunk.part, chunk);
        group
    }

    fn received(&self) -> u32 {
        self.parts.len() as u32
    }

    fn is_complete(&self) -> bool {
        self.received() == self.total_parts
    }

    fn missing(&self) -> Vec<u32> {
        (1..=self.total_parts)
            .filter(|p| !self.parts.contains_key(p))
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct ScanSession {
    active: Option<GroupProgress>,
}

impl ScanSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ScanState {
        match &self.active {
            None => ScanState::Idle,
            Some(g) if g.is_complete() => ScanState::Completed {
                group_id: g.group_id.clone(),
            },
            Some(g) => ScanState::Accumulating {
                group_id: g.group_id.clone(),
            },
        }
    }

    pub fn completed_group_id(&self) -> Option<&str> {
        self.active
            .as_ref()
            .filter(|g| g.is_complete())
            .map(|g| g.group_id.as_str())
    }

    /// Feed one decoded frame into the session
    ///
    /// Accepts chunk frames and bare envelopes; a bare envelope is treated as
    /// a complete single-part group. Unparseable text, and chunks that claim
    /// the active group but disagree with its part count or checksum, fail
    /// with `MalformedPayload` and leave the session untouched.
    pub fn offer(&mut self, raw: &str) -> Result<ScanSignal, AirgapError> {
        let chunk = match Frame::parse(raw)? {
            Frame::Chunk(chunk) => chunk,
            Frame::Envelope(envelope) => single_part(&envelope)?,
        };

        let Some(group) = self.active.as_mut() else {
            let group = GroupProgress::start(chunk);
            log::debug!(
                "Scan started for group {} ({} part(s))",
                group.group_id,
                group.total_parts
            );
            let signal = progress_signal(&group, 1);
            self.active = Some(group);
            return Ok(signal);
        };

        if chunk.group_id != group.group_id {
            log::warn!(
                "Ignoring part from group {} while scanning {}",
                chunk.group_id,
                group.group_id
            );
            return Ok(ScanSignal::ForeignGroup {
                group_id: chunk.group_id,
                active_group_id: group.group_id.clone(),
            });
        }

        if chunk.total_parts != group.total_parts || chunk.checksum != group.checksum {
            return Err(AirgapError::malformed(format!(
                "part {} of group {} disagrees with the parts already scanned",
                chunk.part, group.group_id
            )));
        }

        if group.parts.contains_key(&chunk.part) {
            log::debug!("Duplicate part {} of group {}", chunk.part, group.group_id);
            return Ok(ScanSignal::DuplicatePart {
                group_id: chunk.group_id,
                part: chunk.part,
            });
        }

        let part = chunk.part;
        group.parts.insert(part, chunk);
        Ok(progress_signal(group, part))
    }

    pub fn progress(&self) -> ScanProgress {
        match &self.active {
            None => ScanProgress {
                state: ScanState::Idle,
                total_parts: 0,
                received: Vec::new(),
                missing: Vec::new(),
            },
            Some(group) => ScanProgress {
                state: self.state(),
                total_parts: group.total_parts,
                received: group.parts.keys().copied().collect(),
                missing: group.missing(),
            },
        }
    }

    /// Discard all accumulated parts; always safe to call
    pub fn reset(&mut self) {
        if let Some(group) = self.active.take() {
            log::info!(
                "Scan of group {} reset with {}/{} part(s)",
                group.group_id,
                group.received(),
                group.total_parts
            );
        }
    }

    /// Reassemble the completed group and return the session to idle
    ///
    /// On failure the accumulated parts are kept so the operator can decide
    /// whether to reset.
    pub fn recombine(&mut self) -> Result<TransferEnvelope, AirgapError> {
        let Some(group) = self.active.as_ref() else {
            return Err(AirgapError::MissingParts {
                group_id: String::new(),
                total_parts: 0,
                missing: Vec::new(),
                extra: Vec::new(),
            });
        };

        if !group.is_complete() {
            return Err(AirgapError::MissingParts {
                group_id: group.group_id.clone(),
                total_parts: group.total_parts,
                missing: group.missing(),
                extra: Vec::new(),
            });
        }

        let chunks: Vec<Chunk> = group.parts.values().cloned().collect();
        let envelope = chunk::recombine(&chunks)?;
        log::info!("Recombined {} payload from group {}", envelope.kind, group.group_id);
        self.active = None;
        Ok(envelope)
    }
}

fn single_part(envelope: &TransferEnvelope) -> Result<Chunk, AirgapError> {
    let text = envelope.to_json()?;
    let message = chunk::split_text(&text, text.len().max(1))?;
    message
        .chunks
        .into_iter()
        .next()
        .ok_or_else(|| AirgapError::malformed("empty envelope"))
}

fn progress_signal(group: &GroupProgress, part: u32) -> ScanSignal {
    if group.is_complete() {
        log::info!(
            "All {} part(s) of group {} scanned",
            group.total_parts,
            group.group_id
        );
        ScanSignal::Completed {
            group_id: group.group_id.clone(),
            total_parts: group.total_parts,
        }
    } else {
        ScanSignal::PartAccepted {
            group_id: group.group_id.clone(),
            part,
            received: group.received(),
            total_parts: group.total_parts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{build_transfer_envelope, PayloadKind};
    use crate::transfer::chunk::split_text;
    use serde_json::json;

    fn frames(text: &str, size: usize) -> Vec<String> {
        split_text(text, size).unwrap().frames().unwrap()
    }

    #[test]
    fn test_single_part_completes_immediately() {
        let mut session = ScanSession::new();
        let signal = session.offer(&frames("{}", 10)[0]).unwrap();
        assert!(signal.is_completed());
        assert!(session.completed_group_id().is_some());
    }

    #[test]
    fn test_bare_envelope_is_single_part() {
        let envelope =
            build_transfer_envelope(json!({"address": "tb1qbare"}), PayloadKind::Address).unwrap();
        let mut session = ScanSession::new();
        let signal = session.offer(&envelope.to_json().unwrap()).unwrap();
        assert!(signal.is_completed());
        let restored = session.recombine().unwrap();
        assert_eq!(restored.field("address"), Some(&json!("tb1qbare")));
        assert_eq!(session.state(), ScanState::Idle);
    }

    #[test]
    fn test_inconsistent_part_is_rejected() {
        let mut session = ScanSession::new();
        let message = split_text(&"z".repeat(30), 10).unwrap();
        session.offer(&message.chunks[0].to_frame_text().unwrap()).unwrap();

        let mut forged = message.chunks[1].clone();
        forged.checksum = "0000000000000000".to_string();
        let err = session.offer(&forged.to_frame_text().unwrap()).unwrap_err();
        assert!(matches!(err, AirgapError::MalformedPayload(_)));
        assert_eq!(session.progress().received, vec![1]);
    }

    #[test]
    fn test_recombine_while_accumulating_names_missing() {
        let mut session = ScanSession::new();
        let all = frames(&"m".repeat(40), 10);
        session.offer(&all[2]).unwrap();
        match session.recombine() {
            Err(AirgapError::MissingParts { missing, .. }) => assert_eq!(missing, vec![1, 2, 4]),
            other => panic!("expected MissingParts, got {:?}", other),
        }
    }

    #[test]
    fn test_garbage_leaves_state_unchanged() {
        let mut session = ScanSession::new();
        assert!(session.offer("%%not a frame%%").is_err());
        assert_eq!(session.state(), ScanState::Idle);
    }
}
