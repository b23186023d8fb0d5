//! HTTP surface of the wallet service

pub mod handlers;
pub mod server;
pub mod state;
pub mod types;

pub use server::{build_router, start_server};
pub use state::{AppState, RunningDiscovery};
