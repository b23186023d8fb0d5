//! Airgap Core: air-gapped HD wallet data layer
//!
//! This crate moves transactions, addresses and UTXO sets between an online
//! device and an offline signer using optical codes, and keeps the HD address
//! ledger that decides which addresses may be handed out.
//!
//! # Architecture
//!
//! - **Payload Codec**: Normalizes engine values into plain transfer trees and wraps them in envelopes
//! - **Address Ledger**: Contiguous receive/change allocation, privacy rotation and gap-limit discovery
//! - **UTXO Aggregator**: Wallet-wide balance, UTXO and rotation-advice views
//! - **Chunked Transfer Protocol**: Splits envelopes into checksummed chunks and reassembles them
//!
//! Key derivation, balance lookup and broadcasting are delegated to an
//! injected [`CryptoEngine`]; camera and display access to an [`OpticalIo`].
//!
//! # Example
//!
//! ```ignore
//! use airgap_core::{build_transfer_envelope, split, recombine, PayloadKind, SplitOptions, WalletConfig};
//!
//! let config = WalletConfig::from_env();
//! let envelope = build_transfer_envelope(payload, PayloadKind::SignedTransaction)?;
//!
//! // Render one optical code per chunk
//! let message = split(&envelope, &SplitOptions::from(&config))?;
//!
//! // On the other side, in any order
//! let restored = recombine(&message.chunks)?;
//! ```

// Public modules
pub mod aggregator;
pub mod amount;
pub mod cancel;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod optical;
pub mod storage;
pub mod transfer;

// Re-exports for convenience
pub use aggregator::{AddressGenerationAdvice, KindAdvice, UtxoAggregator};
pub use amount::Amount;
pub use cancel::CancelToken;
pub use codec::{
    build_transfer_envelope, denormalize_for_engine, export_document, import_document,
    normalize_for_transfer, EngineValue, PayloadKind, StructuredExportable, TransferEnvelope,
};
pub use config::WalletConfig;
pub use engine::{CryptoEngine, TransactionHandle};
pub use error::{AirgapError, StorageError};
pub use ledger::{
    AddressBalance, AddressKind, AddressLedger, AddressLedgerState, DerivedAddress,
    DiscoveryReport, Outpoint, RotationReason, UtxoEntry,
};
pub use optical::{import_images, render_chunks, run_live_scan, LiveScanOutcome, OpticalImage, OpticalIo};
pub use storage::{load_ledger_state, save_ledger_state, FileVault, MemoryVault, Vault};
pub use transfer::{
    recombine, split, Chunk, ChunkedMessage, ScanProgress, ScanSession, ScanSignal, ScanState,
    SplitOptions,
};

/// Result type alias for air-gap wallet operations
pub type Result<T> = std::result::Result<T, AirgapError>;
