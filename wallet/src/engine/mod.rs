//! Cryptographic engine adapters
//!
//! - `esplora.rs` - BIP84 derivation with Esplora REST lookups and broadcast

mod esplora;

pub use esplora::{EsploraEngine, WalletSeed};
