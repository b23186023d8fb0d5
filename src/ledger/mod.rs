//! Address ledger
//!
//! - `types.rs` - Address and UTXO records
//! - `state.rs` - Serializable ledger state and its invariants
//! - `manager.rs` - Allocation, usage tracking and privacy rotation
//! - `discovery.rs` - Gap-limited recovery scans

mod discovery;
mod manager;
mod state;
mod types;

pub use discovery::DiscoveryReport;
pub use manager::AddressLedger;
pub use state::{AddressLedgerState, RotationReason};
pub use types::{AddressBalance, AddressKind, DerivedAddress, Outpoint, UtxoEntry};
