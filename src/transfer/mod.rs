//! Chunked transfer protocol
//!
//! - `chunk.rs` - Splitting, checksums and batch recombination
//! - `session.rs` - Incremental scan session for live capture

mod chunk;
mod session;

pub use chunk::{
    checksum, recombine, recombine_text, split, split_text, Chunk, ChunkedMessage, Frame,
    SplitOptions, MAX_TOTAL_PARTS,
};
pub use session::{ScanProgress, ScanSession, ScanSignal, ScanState};
