//! Optical code I/O
//!
//! Image encoding and decoding are delegated to an injected [`OpticalIo`]
//! device. The device has an explicit `open`/`close` lifecycle; the helpers
//! here never keep one open past their own call.

use async_trait::async_trait;
use std::time::Duration;

use crate::cancel::CancelToken;
use crate::codec::TransferEnvelope;
use crate::error::AirgapError;
use crate::transfer::{ChunkedMessage, ScanSession, ScanSignal};

/// Raw image as produced by a camera or consumed by a display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpticalImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

#[async_trait]
pub trait OpticalIo: Send {
    async fn open(&mut self) -> Result<(), AirgapError>;

    async fn close(&mut self) -> Result<(), AirgapError>;

    /// `None` when the image holds no readable code
    async fn decode_image_to_text(&mut self, image: &OpticalImage) -> Result<Option<String>, AirgapError>;

    async fn encode_text_to_image(&mut self, text: &str) -> Result<OpticalImage, AirgapError>;

    /// Next frame of the live feed, `None` once the feed has ended
    async fn next_frame(&mut self) -> Result<Option<OpticalImage>, AirgapError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveScanOutcome {
    Completed(String),
    Cancelled,
    FeedEnded,
}

/// Encode every chunk of a split message as one image, in part order
pub async fn render_chunks<I: OpticalIo>(
    io: &mut I,
    message: &ChunkedMessage,
) -> Result<Vec<OpticalImage>, AirgapError> {
    io.open().await?;
    let result = encode_all(io, message).await;
    io.close().await?;
    result
}

async fn encode_all<I: OpticalIo>(
    io: &mut I,
    message: &ChunkedMessage,
) -> Result<Vec<OpticalImage>, AirgapError> {
    let mut images = Vec::with_capacity(message.chunks.len());
    for frame in message.frames()? {
        images.push(io.encode_text_to_image(&frame).await?);
    }
    log::debug!("Rendered {} code(s) for group {}", images.len(), message.group_id);
    Ok(images)
}

/// Decode a batch of uploaded images and recombine them
///
/// Images without a readable code are skipped; if that leaves parts
/// uncovered the result is `MissingParts` naming them.
pub async fn import_images<I: OpticalIo>(
    io: &mut I,
    images: &[OpticalImage],
) -> Result<TransferEnvelope, AirgapError> {
    io.open().await?;
    let mut session = ScanSession::new();
    let result = decode_all(io, images, &mut session).await;
    io.close().await?;
    result?;
    session.recombine()
}

async fn decode_all<I: OpticalIo>(
    io: &mut I,
    images: &[OpticalImage],
    session: &mut ScanSession,
) -> Result<(), AirgapError> {
    for (i, image) in images.iter().enumerate() {
        match io.decode_image_to_text(image).await? {
            Some(text) => {
                if let ScanSignal::ForeignGroup { group_id, .. } = session.offer(&text)? {
                    log::warn!("Image {} belongs to another transfer ({})", i + 1, group_id);
                }
            }
            None => log::warn!("Image {} has no readable code", i + 1),
        }
    }
    Ok(())
}

/// Poll a live feed until the session completes, the feed ends or `cancel` fires
///
/// Frames are pulled at most once per `interval`. Unreadable frames and
/// frames that fail to parse are skipped. The device is closed on every exit
/// path; the session keeps whatever was accumulated.
pub async fn run_live_scan<I: OpticalIo>(
    io: &mut I,
    session: &mut ScanSession,
    interval: Duration,
    cancel: &CancelToken,
) -> Result<LiveScanOutcome, AirgapError> {
    io.open().await?;
    let result = poll_feed(io, session, interval, cancel).await;
    io.close().await?;
    result
}

async fn poll_feed<I: OpticalIo>(
    io: &mut I,
    session: &mut ScanSession,
    interval: Duration,
    cancel: &CancelToken,
) -> Result<LiveScanOutcome, AirgapError> {
    if let Some(group_id) = session.completed_group_id() {
        return Ok(LiveScanOutcome::Completed(group_id.to_string()));
    }

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                log::info!("Live scan cancelled");
                return Ok(LiveScanOutcome::Cancelled);
            }
            _ = ticker.tick() => {}
        }

        let Some(image) = io.next_frame().await? else {
            log::info!("Capture feed ended");
            return Ok(LiveScanOutcome::FeedEnded);
        };
        let Some(text) = io.decode_image_to_text(&image).await? else {
            continue;
        };

        match session.offer(&text) {
            Ok(ScanSignal::Completed { group_id, .. }) => {
                return Ok(LiveScanOutcome::Completed(group_id));
            }
            Ok(ScanSignal::PartAccepted { part, received, total_parts, .. }) => {
                log::debug!("Scanned part {} ({}/{})", part, received, total_parts);
            }
            Ok(_) => {}
            Err(e) => log::warn!("Skipping unreadable frame: {}", e),
        }
    }
}
