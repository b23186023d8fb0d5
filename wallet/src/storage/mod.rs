//! Storage and persistence layer
//!
//! - Vault-backed wallet directory
//! - Key management

mod file_system;
mod keys;

pub use file_system::{Metadata, Storage};
pub use keys::{KeyManager, WalletKeys};
