//! Air-gap wallet service
//!
//! Serves the address ledger, UTXO views and chunked optical transfer over
//! HTTP, backed by BIP84 key derivation and an Esplora indexer.

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod storage;
